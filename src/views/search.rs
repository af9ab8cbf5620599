use crate::models::{EstablishmentRecord, IdentifierMapping, SearchEntry};

/// Search entries for every establishment with a display name.
///
/// The matched flag comes from the raw mapping: any mapping row counts.
pub fn index_entries(
    establishments: &[EstablishmentRecord],
    mapping: &IdentifierMapping,
) -> Vec<SearchEntry> {
    let matched = mapping.matched_sirets();
    establishments
        .iter()
        .filter_map(|est| {
            est.display_name.as_ref().map(|name| SearchEntry {
                siret: est.siret.clone(),
                name: name.clone(),
                postal_code: est.postal_code.clone(),
                city: est.city.clone(),
                is_association: matched.contains(est.siret.as_str()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MappingPair;

    fn est(siret: &str, name: Option<&str>) -> EstablishmentRecord {
        EstablishmentRecord {
            siret: siret.to_string(),
            siren: None,
            status: None,
            display_name: name.map(str::to_string),
            postal_code: Some("75001".to_string()),
            city: Some("PARIS".to_string()),
        }
    }

    #[test]
    fn test_entries_skip_unnamed_and_flag_matches() {
        let establishments = vec![est("1", Some("AMIS DU PARC")), est("2", None), est("3", Some("CAFE"))];
        let mapping: IdentifierMapping = vec![
            MappingPair {
                siret: "1".to_string(),
                id_rna: "W1".to_string(),
            },
            MappingPair {
                siret: "1".to_string(),
                id_rna: "W2".to_string(),
            },
        ]
        .into_iter()
        .collect();

        let entries = index_entries(&establishments, &mapping);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].siret, "1");
        assert!(entries[0].is_association);
        assert_eq!(entries[1].siret, "3");
        assert!(!entries[1].is_association);
    }
}
