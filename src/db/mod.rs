//! Catalog database: golden records, stats and the full-text search index.
//!
//! Each artifact lives in its own table and is replaced wholesale inside one
//! transaction, together with its `catalog_meta` row. Readers on another
//! connection see either the previous complete table or the new one.
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, params};
use std::path::Path;
use tracing::info;

use crate::error::{EngineError, Result};

pub mod golden;
pub mod search;

const META_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_meta (
    artifact TEXT PRIMARY KEY,
    version TEXT NOT NULL,
    built_at DATETIME NOT NULL,
    row_count INTEGER NOT NULL
);
"#;

const GOLDEN_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS golden_record (
    siret TEXT NOT NULL,
    status TEXT,
    name TEXT,
    postal_code TEXT,
    city TEXT,
    id_rna TEXT,
    latitude REAL,
    longitude REAL,
    is_ban_validated INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_golden_siret ON golden_record(siret);
"#;

const STATS_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS stats_view (
    postal_code TEXT PRIMARY KEY,
    total_entites INTEGER NOT NULL,
    associations INTEGER NOT NULL,
    entreprises_pures INTEGER NOT NULL
);
"#;

const SEARCH_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS search_view USING fts5(
    siret UNINDEXED,
    name,
    postal_code UNINDEXED,
    city UNINDEXED,
    is_association UNINDEXED
);
"#;

/// Artifacts materialized in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    GoldenRecord,
    Stats,
    SearchIndex,
}

impl Artifact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::GoldenRecord => "golden_record",
            Artifact::Stats => "stats_view",
            Artifact::SearchIndex => "search_view",
        }
    }

    fn create_sql(&self) -> &'static str {
        match self {
            Artifact::GoldenRecord => GOLDEN_SQL,
            Artifact::Stats => STATS_SQL,
            Artifact::SearchIndex => SEARCH_SQL,
        }
    }
}

/// Version stamp of the table currently published for an artifact.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub version: String,
    pub built_at: DateTime<Utc>,
    pub row_count: usize,
}

pub struct Catalog {
    pub(crate) conn: Connection,
}

impl Catalog {
    /// Open (or create) the catalog for writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening catalog: {}", path.display());

        let conn = Connection::open(path)?;
        // WAL lets the serving layer keep reading the previous version while a run writes
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        info!("Catalog journal mode: {mode}");

        Self::init(conn)
    }

    /// Open an existing catalog for lookups only.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::MissingArtifact(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(META_SQL)?;
        for artifact in [Artifact::GoldenRecord, Artifact::Stats, Artifact::SearchIndex] {
            conn.execute_batch(artifact.create_sql())?;
        }
        Ok(Self { conn })
    }

    /// Drop and rebuild one artifact table in a single transaction.
    ///
    /// `fill` returns the number of rows written; on any error the
    /// transaction rolls back and the previous table stays published.
    pub(crate) fn replace_artifact<F>(&mut self, artifact: Artifact, version: &str, fill: F) -> Result<usize>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<usize>,
    {
        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {};\n{}",
            artifact.as_str(),
            artifact.create_sql()
        ))?;

        let rows = fill(&tx)?;

        tx.execute(
            r#"
            INSERT INTO catalog_meta (artifact, version, built_at, row_count)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(artifact) DO UPDATE SET
                version = excluded.version,
                built_at = excluded.built_at,
                row_count = excluded.row_count
            "#,
            params![artifact.as_str(), version, Utc::now(), rows as i64],
        )?;
        tx.commit()?;

        info!("Published {} version {version} ({rows} rows)", artifact.as_str());
        Ok(rows)
    }

    pub fn artifact_info(&self, artifact: Artifact) -> Result<Option<ArtifactInfo>> {
        let info = self
            .conn
            .query_row(
                "SELECT version, built_at, row_count FROM catalog_meta WHERE artifact = ?",
                params![artifact.as_str()],
                |row| {
                    Ok(ArtifactInfo {
                        version: row.get(0)?,
                        built_at: row.get(1)?,
                        row_count: row.get::<_, i64>(2)? as usize,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }
}
