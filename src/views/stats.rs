//! Per-postal-code counts of linked vs. pure-business establishments.
use std::collections::BTreeMap;

use tracing::info;

use crate::models::{EstablishmentRecord, IdentifierMapping, StatsEntry};

/// One entry per postal code, sorted by postal code.
///
/// An establishment counts as an association as soon as it has one mapping
/// row, however many it has. Establishments without a postal code are grouped
/// under the empty postal code.
pub fn aggregate_stats(
    establishments: &[EstablishmentRecord],
    mapping: &IdentifierMapping,
) -> Vec<StatsEntry> {
    let matched = mapping.matched_sirets();

    let mut groups: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for est in establishments {
        let key = est.postal_code.as_deref().unwrap_or_default();
        let (total, associations) = groups.entry(key).or_default();
        *total += 1;
        if matched.contains(est.siret.as_str()) {
            *associations += 1;
        }
    }

    let entries: Vec<StatsEntry> = groups
        .into_iter()
        .map(|(postal_code, (total, associations))| StatsEntry {
            postal_code: postal_code.to_string(),
            total_entites: total,
            associations,
            entreprises_pures: total - associations,
        })
        .collect();

    info!("Aggregated stats for {} postal codes", entries.len());
    entries
}
