//! File artifacts: normalized snapshots, the identifier mapping and CSV exports.
//!
//! Writes go to a sibling `.tmp` file which is renamed over the destination,
//! so a reader never observes a half-written artifact.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{EngineError, Result};

/// Identifier stamped on every artifact produced by one run.
pub fn run_version() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A fully written `.tmp` file waiting to be renamed over its destination.
///
/// Dropping it without [`StagedCsv::commit`] removes the temporary file and
/// leaves the destination untouched.
#[must_use = "a staged artifact is discarded unless committed"]
pub struct StagedCsv {
    tmp: PathBuf,
    path: PathBuf,
    rows: usize,
    committed: bool,
}

impl StagedCsv {
    /// Rename the staged file over the destination.
    pub fn commit(mut self) -> Result<usize> {
        fs::rename(&self.tmp, &self.path)?;
        self.committed = true;
        info!("Wrote {} rows to {}", self.rows, self.path.display());
        Ok(self.rows)
    }
}

impl Drop for StagedCsv {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Serialize `rows` next to `path` without touching `path` itself.
pub fn stage_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<StagedCsv> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staged = StagedCsv {
        tmp: temp_path(path),
        path: path.to_path_buf(),
        rows: rows.len(),
        committed: false,
    };

    let mut writer = csv::Writer::from_path(&staged.tmp)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(staged)
}

/// Serialize `rows` to `path`, replacing any previous file in one rename.
pub fn write_csv_atomic<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize> {
    stage_csv(path, rows)?.commit()
}

/// Read back an artifact written by [`write_csv_atomic`].
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(EngineError::MissingArtifact(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{EstablishmentRecord, MappingPair};
    use tempfile::tempdir;

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("silver").join("sirene.csv");
        let rows = vec![
            EstablishmentRecord {
                siret: "12345678901234".to_string(),
                siren: Some("123456789".to_string()),
                status: Some("A".to_string()),
                display_name: Some("CAFE, BAR \"LE ZINC\"".to_string()),
                postal_code: Some("75001".to_string()),
                city: None,
            },
            EstablishmentRecord {
                siret: "98765432109876".to_string(),
                siren: None,
                status: None,
                display_name: None,
                postal_code: None,
                city: Some("LYON".to_string()),
            },
        ];

        assert_eq!(write_csv_atomic(&path, &rows).unwrap(), 2);
        assert!(!temp_path(&path).exists());

        let back: Vec<EstablishmentRecord> = read_csv(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_rewrite_replaces_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        let pair = |s: &str, r: &str| MappingPair {
            siret: s.to_string(),
            id_rna: r.to_string(),
        };

        write_csv_atomic(&path, &[pair("1", "W1"), pair("2", "W2")]).unwrap();
        write_csv_atomic(&path, &[pair("3", "W3")]).unwrap();

        let back: Vec<MappingPair> = read_csv(&path).unwrap();
        assert_eq!(back, vec![pair("3", "W3")]);
    }

    #[test]
    fn test_dropped_stage_keeps_destination() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats_view.csv");
        let pair = |s: &str| MappingPair {
            siret: s.to_string(),
            id_rna: "W1".to_string(),
        };
        write_csv_atomic(&path, &[pair("1")]).unwrap();

        let staged = stage_csv(&path, &[pair("2"), pair("3")]).unwrap();
        assert!(temp_path(&path).exists());
        drop(staged);

        assert!(!temp_path(&path).exists());
        let back: Vec<MappingPair> = read_csv(&path).unwrap();
        assert_eq!(back, vec![pair("1")]);

        let staged = stage_csv(&path, &[pair("2")]).unwrap();
        assert_eq!(staged.commit().unwrap(), 1);
        let back: Vec<MappingPair> = read_csv(&path).unwrap();
        assert_eq!(back, vec![pair("2")]);
    }

    #[test]
    fn test_read_missing_artifact() {
        let dir = tempdir().unwrap();
        let err = read_csv::<MappingPair>(&dir.path().join("mapping.csv")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInput);
    }

    #[test]
    fn test_run_version_is_sortable_timestamp() {
        let v = run_version();
        assert_eq!(v.len(), "20260101T000000.000Z".len());
        assert!(v.ends_with('Z'));
    }
}
