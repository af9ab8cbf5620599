use rusqlite::{OptionalExtension, params};

use super::{Artifact, Catalog};
use crate::error::Result;
use crate::models::{GoldenRecord, StatsEntry};

/// A SIRET is exactly 14 ASCII digits.
pub fn is_valid_siret(siret: &str) -> bool {
    siret.len() == 14 && siret.bytes().all(|b| b.is_ascii_digit())
}

fn map_golden_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GoldenRecord> {
    Ok(GoldenRecord {
        siret: row.get(0)?,
        status: row.get(1)?,
        name: row.get(2)?,
        postal_code: row.get(3)?,
        city: row.get(4)?,
        id_rna: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        is_ban_validated: row.get(8)?,
    })
}

impl Catalog {
    pub fn replace_golden_records(&mut self, version: &str, records: &[GoldenRecord]) -> Result<usize> {
        self.replace_artifact(Artifact::GoldenRecord, version, |tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO golden_record (siret, status, name, postal_code, city, id_rna, latitude, longitude, is_ban_validated) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for r in records {
                stmt.execute(params![
                    r.siret,
                    r.status,
                    r.name,
                    r.postal_code,
                    r.city,
                    r.id_rna,
                    r.latitude,
                    r.longitude,
                    r.is_ban_validated,
                ])?;
            }
            Ok(records.len())
        })
    }

    /// Golden record for a SIRET. Duplicate SIRETs in the registry yield the first stored row.
    pub fn golden_record(&self, siret: &str) -> Result<Option<GoldenRecord>> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT siret, status, name, postal_code, city, id_rna, latitude, longitude, is_ban_validated
                FROM golden_record
                WHERE siret = ?
                ORDER BY rowid
                LIMIT 1
                "#,
                params![siret],
                map_golden_row,
            )
            .optional()?;
        Ok(record)
    }

    pub fn replace_stats(&mut self, version: &str, entries: &[StatsEntry]) -> Result<usize> {
        self.replace_artifact(Artifact::Stats, version, |tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO stats_view (postal_code, total_entites, associations, entreprises_pures) VALUES (?, ?, ?, ?)",
            )?;
            for e in entries {
                stmt.execute(params![
                    e.postal_code,
                    e.total_entites as i64,
                    e.associations as i64,
                    e.entreprises_pures as i64,
                ])?;
            }
            Ok(entries.len())
        })
    }

    pub fn stats(&self, postal_code: &str) -> Result<Option<StatsEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT postal_code, total_entites, associations, entreprises_pures FROM stats_view WHERE postal_code = ?",
                params![postal_code],
                |row| {
                    Ok(StatsEntry {
                        postal_code: row.get(0)?,
                        total_entites: row.get::<_, i64>(1)? as u64,
                        associations: row.get::<_, i64>(2)? as u64,
                        entreprises_pures: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn golden(siret: &str, id_rna: Option<&str>, point: Option<(f64, f64)>) -> GoldenRecord {
        GoldenRecord {
            siret: siret.to_string(),
            status: Some("A".to_string()),
            name: Some("AMIS DU PARC".to_string()),
            postal_code: Some("75001".to_string()),
            city: Some("PARIS".to_string()),
            id_rna: id_rna.map(str::to_string),
            latitude: point.map(|p| p.0),
            longitude: point.map(|p| p.1),
            is_ban_validated: point.is_some(),
        }
    }

    #[test]
    fn test_is_valid_siret() {
        assert!(is_valid_siret("12345678901234"));
        assert!(!is_valid_siret("1234567890123"));
        assert!(!is_valid_siret("1234567890123A"));
        assert!(!is_valid_siret("１２345678901234"));
    }

    #[test]
    fn test_golden_roundtrip_through_catalog() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let records = vec![
            golden("12345678901234", Some("W123"), Some((48.86, 2.34))),
            golden("98765432109876", None, None),
        ];
        let written = catalog.replace_golden_records("v1", &records).unwrap();
        assert_eq!(written, 2);

        let found = catalog.golden_record("12345678901234").unwrap().unwrap();
        assert_eq!(found, records[0]);
        let found = catalog.golden_record("98765432109876").unwrap().unwrap();
        assert_eq!(found.id_rna, None);
        assert!(!found.is_ban_validated);

        assert!(catalog.golden_record("00000000000000").unwrap().is_none());
    }

    #[test]
    fn test_replace_drops_previous_rows() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        catalog
            .replace_golden_records("v1", &[golden("1", None, None), golden("2", None, None)])
            .unwrap();
        catalog.replace_golden_records("v2", &[golden("3", None, None)]).unwrap();

        assert!(catalog.golden_record("1").unwrap().is_none());
        assert!(catalog.golden_record("3").unwrap().is_some());
        let info = catalog.artifact_info(Artifact::GoldenRecord).unwrap().unwrap();
        assert_eq!(info.version, "v2");
        assert_eq!(info.row_count, 1);
    }

    #[test]
    fn test_stats_lookup() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        let entries = vec![StatsEntry {
            postal_code: "75001".to_string(),
            total_entites: 10,
            associations: 3,
            entreprises_pures: 7,
        }];
        catalog.replace_stats("v1", &entries).unwrap();

        assert_eq!(catalog.stats("75001").unwrap(), Some(entries[0].clone()));
        assert_eq!(catalog.stats("13001").unwrap(), None);
    }
}
