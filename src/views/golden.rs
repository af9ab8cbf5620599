//! Golden record: every establishment left-joined to one RNA id and one
//! representative address point.
use std::collections::HashMap;

use tracing::info;

use super::tiebreak::TieBreak;
use crate::models::{AddressRecord, EstablishmentRecord, GoldenRecord, IdentifierMapping};

/// One RNA id per mapped SIRET.
pub fn collapse_mapping<'m, B: TieBreak>(
    mapping: &'m IdentifierMapping,
    tie: &B,
) -> HashMap<&'m str, &'m str> {
    mapping
        .by_siret()
        .into_iter()
        .filter_map(|(siret, ids)| {
            tie.choose(&ids, |a, b| a.cmp(b))
                .map(|i| (siret, ids[i]))
        })
        .collect()
}

/// One `(latitude, longitude)` per postal code, drawn from rows carrying both.
pub fn collapse_addresses<'r, B: TieBreak>(
    addresses: &'r [AddressRecord],
    tie: &B,
) -> HashMap<&'r str, (f64, f64)> {
    let mut points: HashMap<&str, Vec<(f64, f64)>> = HashMap::new();
    for address in addresses {
        if let Some(point) = address.point() {
            points
                .entry(address.postal_code.as_str())
                .or_default()
                .push(point);
        }
    }

    points
        .into_iter()
        .filter_map(|(postal_code, candidates)| {
            tie.choose(&candidates, |a, b| {
                a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
            })
            .map(|i| (postal_code, candidates[i]))
        })
        .collect()
}

/// Exactly one golden record per establishment, in establishment order.
pub fn build_golden_records<B: TieBreak>(
    establishments: &[EstablishmentRecord],
    mapping: &IdentifierMapping,
    addresses: &[AddressRecord],
    tie: &B,
) -> Vec<GoldenRecord> {
    let rna_by_siret = collapse_mapping(mapping, tie);
    let point_by_postal = collapse_addresses(addresses, tie);

    let records: Vec<GoldenRecord> = establishments
        .iter()
        .map(|est| {
            let point = est
                .postal_code
                .as_deref()
                .and_then(|pc| point_by_postal.get(pc).copied());
            GoldenRecord {
                siret: est.siret.clone(),
                status: est.status.clone(),
                name: est.display_name.clone(),
                postal_code: est.postal_code.clone(),
                city: est.city.clone(),
                id_rna: rna_by_siret.get(est.siret.as_str()).map(|id| (*id).to_string()),
                latitude: point.map(|(lat, _)| lat),
                longitude: point.map(|(_, lon)| lon),
                is_ban_validated: point.is_some(),
            }
        })
        .collect();

    let validated = records.iter().filter(|r| r.is_ban_validated).count();
    let linked = records.iter().filter(|r| r.id_rna.is_some()).count();
    info!(
        "Built {} golden records ({linked} linked to an association, {validated} geolocated)",
        records.len()
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MappingPair;
    use crate::views::tiebreak::{AnyValue, Lowest};

    fn est(siret: &str, postal_code: Option<&str>) -> EstablishmentRecord {
        EstablishmentRecord {
            siret: siret.to_string(),
            siren: None,
            status: Some("A".to_string()),
            display_name: Some(format!("NAME {siret}")),
            postal_code: postal_code.map(str::to_string),
            city: Some("CITY".to_string()),
        }
    }

    fn addr(postal_code: &str, lat: Option<f64>, lon: Option<f64>) -> AddressRecord {
        AddressRecord {
            number: None,
            street: None,
            postal_code: postal_code.to_string(),
            city: "CITY".to_string(),
            latitude: lat,
            longitude: lon,
        }
    }

    fn mapping(pairs: &[(&str, &str)]) -> IdentifierMapping {
        pairs
            .iter()
            .map(|(s, r)| MappingPair {
                siret: s.to_string(),
                id_rna: r.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_left_join_keeps_every_establishment() {
        let establishments = vec![
            est("1", Some("75001")),
            est("2", Some("99999")),
            est("3", None),
            est("1", Some("75001")),
        ];
        let map = mapping(&[("1", "W1"), ("9", "W9")]);
        let addresses = vec![addr("75001", Some(48.86), Some(2.34))];

        let golden = build_golden_records(&establishments, &map, &addresses, &AnyValue);
        assert_eq!(golden.len(), establishments.len());

        assert_eq!(golden[0].id_rna.as_deref(), Some("W1"));
        assert!(golden[0].is_ban_validated);
        assert_eq!(golden[0].latitude, Some(48.86));

        assert_eq!(golden[1].id_rna, None);
        assert!(!golden[1].is_ban_validated);
        assert_eq!(golden[1].longitude, None);

        assert_eq!(golden[2].postal_code, None);
        assert!(!golden[2].is_ban_validated);
        assert_eq!(golden[3], golden[0]);
    }

    #[test]
    fn test_validated_iff_both_coordinates() {
        let establishments = vec![est("1", Some("06000")), est("2", Some("13001"))];
        let addresses = vec![
            addr("06000", Some(43.7), None),
            addr("13001", None, Some(5.37)),
        ];
        let golden =
            build_golden_records(&establishments, &IdentifierMapping::new(), &addresses, &AnyValue);

        for record in &golden {
            assert_eq!(
                record.is_ban_validated,
                record.latitude.is_some() && record.longitude.is_some()
            );
            assert!(!record.is_ban_validated);
        }
    }

    #[test]
    fn test_point_is_never_mixed_across_rows() {
        let addresses = vec![
            addr("06000", Some(43.7), None),
            addr("06000", Some(43.6), Some(7.2)),
            addr("06000", None, Some(7.3)),
        ];
        let points = collapse_addresses(&addresses, &AnyValue);
        assert_eq!(points["06000"], (43.6, 7.2));
    }

    #[test]
    fn test_ambiguous_mapping_picks_a_candidate() {
        let map = mapping(&[("1", "W2"), ("1", "W3"), ("1", "W1")]);
        let golden = build_golden_records(&[est("1", None)], &map, &[], &AnyValue);
        let chosen = golden[0].id_rna.as_deref().unwrap();
        assert!(["W1", "W2", "W3"].contains(&chosen));

        let golden = build_golden_records(&[est("1", None)], &map, &[], &Lowest);
        assert_eq!(golden[0].id_rna.as_deref(), Some("W1"));
    }

    #[test]
    fn test_lowest_address_point_is_deterministic() {
        let forward = vec![
            addr("75001", Some(48.87), Some(2.33)),
            addr("75001", Some(48.86), Some(2.35)),
        ];
        let backward: Vec<AddressRecord> = forward.iter().rev().cloned().collect();
        assert_eq!(
            collapse_addresses(&forward, &Lowest)["75001"],
            collapse_addresses(&backward, &Lowest)["75001"]
        );
    }
}
