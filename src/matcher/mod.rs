//! Cross-registry matching.
//!
//! Two strategies feed one mapping:
//!
//! 1. **exact**: cleaned names byte-equal inside a department block;
//! 2. **approximate**: cleaned names differ but Jaro-Winkler similarity
//!    reaches the threshold inside a postal-code block.
//!
//! The mapping is the duplicate-free union of both. Which strategy produced a
//! pair is not kept in the mapping; [`MatchSummary`] reports the per-strategy
//! counts instead.
pub mod blocking;
pub mod clean;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, Result};
use crate::models::{AssociationRecord, EstablishmentRecord, IdentifierMapping, MappingPair};
use blocking::{Candidate, block_by};

fn default_exact_min_len() -> usize {
    3
}

fn default_fuzzy_min_len() -> usize {
    4
}

fn default_fuzzy_threshold() -> f64 {
    0.85
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MatchConfig {
    /// Exact matches need an establishment `name_clean` strictly longer than this.
    #[serde(default = "default_exact_min_len")]
    pub exact_min_len: usize,

    /// Approximate matches need both `name_clean` strictly longer than this.
    #[serde(default = "default_fuzzy_min_len")]
    pub fuzzy_min_len: usize,

    /// Minimum Jaro-Winkler similarity for an approximate match.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            exact_min_len: default_exact_min_len(),
            fuzzy_min_len: default_fuzzy_min_len(),
            fuzzy_threshold: default_fuzzy_threshold(),
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(format!(
                "matching.fuzzy_threshold must be within [0, 1], got {}",
                self.fuzzy_threshold
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MatchSummary {
    pub establishment_candidates: usize,
    pub association_candidates: usize,
    pub department_blocks: usize,
    pub postal_blocks: usize,
    pub exact_pairs: usize,
    pub fuzzy_pairs: usize,
    /// Size of the union; less than the sum when both strategies agree on a pair.
    pub total_pairs: usize,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub mapping: IdentifierMapping,
    pub summary: MatchSummary,
}

/// Establishments with both a display name and a postal code.
pub fn establishment_candidates(records: &[EstablishmentRecord]) -> Vec<Candidate<'_>> {
    records
        .iter()
        .filter_map(|r| match (&r.display_name, &r.postal_code) {
            (Some(name), Some(postal_code)) => Some(Candidate::new(&r.siret, name, postal_code)),
            _ => None,
        })
        .collect()
}

/// Associations with a title (the postal code is guaranteed by normalization).
pub fn association_candidates(records: &[AssociationRecord]) -> Vec<Candidate<'_>> {
    records
        .iter()
        .filter_map(|r| {
            r.display_name
                .as_deref()
                .map(|name| Candidate::new(&r.id_rna, name, &r.postal_code))
        })
        .collect()
}

/// Strategy 1: equal department and byte-equal `name_clean`.
pub fn exact_pairs<'a>(
    establishments: &[Candidate<'a>],
    associations: &[Candidate<'a>],
    min_len: usize,
) -> Vec<(&'a str, &'a str)> {
    let index = block_by(associations, |c| (c.department, c.name_clean.as_str()));

    let mut pairs = Vec::new();
    for est in establishments.iter().filter(|c| c.name_len > min_len) {
        if let Some(block) = index.get(&(est.department, est.name_clean.as_str())) {
            pairs.extend(block.iter().map(|assoc| (est.id, assoc.id)));
        }
    }
    pairs
}

/// Strategy 2: equal postal code, differing `name_clean`, both longer than
/// `min_len`, and similarity at least `threshold`.
pub fn fuzzy_pairs<'a>(
    establishments: &[Candidate<'a>],
    associations: &[Candidate<'a>],
    min_len: usize,
    threshold: f64,
) -> Vec<(&'a str, &'a str)> {
    let eligible: Vec<Candidate<'a>> = associations
        .iter()
        .filter(|c| c.name_len > min_len)
        .cloned()
        .collect();
    let blocks = block_by(&eligible, |c| c.postal_code);

    let mut pairs = Vec::new();
    for est in establishments.iter().filter(|c| c.name_len > min_len) {
        let Some(block) = blocks.get(est.postal_code) else {
            continue;
        };
        for assoc in block {
            if assoc.name_clean != est.name_clean
                && strsim::jaro_winkler(&est.name_clean, &assoc.name_clean) >= threshold
            {
                pairs.push((est.id, assoc.id));
            }
        }
    }
    pairs
}

/// Build the identifier mapping between the two normalized registries.
pub fn match_registries(
    establishments: &[EstablishmentRecord],
    associations: &[AssociationRecord],
    config: &MatchConfig,
) -> Result<MatchOutcome> {
    config
        .validate()
        .map_err(|reason| EngineError::computation("match", reason))?;

    let est = establishment_candidates(establishments);
    let assoc = association_candidates(associations);

    let mut summary = MatchSummary {
        establishment_candidates: est.len(),
        association_candidates: assoc.len(),
        department_blocks: block_by(&assoc, |c| c.department).len(),
        postal_blocks: block_by(&assoc, |c| c.postal_code).len(),
        ..MatchSummary::default()
    };

    let exact = exact_pairs(&est, &assoc, config.exact_min_len);
    let fuzzy = fuzzy_pairs(&est, &assoc, config.fuzzy_min_len, config.fuzzy_threshold);
    summary.exact_pairs = exact.len();
    summary.fuzzy_pairs = fuzzy.len();

    let mapping: IdentifierMapping = exact
        .into_iter()
        .chain(fuzzy)
        .map(|(siret, id_rna)| MappingPair {
            siret: siret.to_string(),
            id_rna: id_rna.to_string(),
        })
        .collect();
    summary.total_pairs = mapping.len();

    info!(
        "Matched {} pairs ({} exact, {} approximate) from {} establishments x {} associations",
        summary.total_pairs,
        summary.exact_pairs,
        summary.fuzzy_pairs,
        summary.establishment_candidates,
        summary.association_candidates
    );

    Ok(MatchOutcome { mapping, summary })
}
