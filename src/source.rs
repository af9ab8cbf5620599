/// Upstream registry snapshots.
///
/// A snapshot is one or more delimited text files matched by a glob pattern
/// (the association registry ships as ~100 departmental files). Only column
/// presence is checked here; value validation is left to later stages.
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::config::SourceConfig;
use crate::error::{EngineError, Result};
use crate::models::Registry;

const PROGRESS_STEP: usize = 10_000;

/// Positions of the requested columns in one file's header row.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    indices: HashMap<String, usize>,
}

impl ColumnMap {
    /// Resolve `wanted` against `headers`. Returns the first missing column name on failure.
    pub fn resolve(headers: &StringRecord, wanted: &[&str]) -> std::result::Result<Self, String> {
        let positions: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').trim(), i))
            .collect();

        let mut indices = HashMap::with_capacity(wanted.len());
        for column in wanted {
            match positions.get(column) {
                Some(&i) => {
                    indices.insert((*column).to_string(), i);
                }
                None => return Err((*column).to_string()),
            }
        }
        Ok(Self { indices })
    }
}

/// A raw row viewed through its file's [`ColumnMap`].
#[derive(Clone, Copy)]
pub struct RawRow<'a> {
    record: &'a StringRecord,
    columns: &'a ColumnMap,
}

impl<'a> RawRow<'a> {
    pub fn new(record: &'a StringRecord, columns: &'a ColumnMap) -> Self {
        Self { record, columns }
    }

    /// Trimmed value of `column`; empty fields read as missing.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = *self.columns.indices.get(column)?;
        let value = self.record.get(index)?.trim();
        if value.is_empty() { None } else { Some(value) }
    }
}

/// List the files of a snapshot, sorted by path.
pub fn resolve_files(registry: Registry, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = glob::glob(pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(EngineError::MissingSnapshot {
            registry,
            pattern: pattern.to_string(),
        });
    }
    Ok(files)
}

fn open_file(
    registry: Registry,
    path: &Path,
    delimiter: u8,
    columns: &[&str],
) -> Result<(csv::Reader<File>, ColumnMap)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let map = ColumnMap::resolve(&headers, columns).map_err(|column| EngineError::MissingColumn {
        registry,
        path: path.to_path_buf(),
        column,
    })?;
    Ok((reader, map))
}

/// Stream every row of a snapshot through `visit`, returning the row count.
///
/// All file headers are checked before the first row is delivered, so a
/// missing column never yields a partially read snapshot.
pub fn for_each_row<F>(
    registry: Registry,
    source: &SourceConfig,
    columns: &[&str],
    mut visit: F,
) -> Result<usize>
where
    F: FnMut(RawRow<'_>),
{
    let delimiter = u8::try_from(source.delimiter).map_err(|_| {
        EngineError::computation(
            "read",
            format!("delimiter {:?} is not a single byte", source.delimiter),
        )
    })?;

    let files = resolve_files(registry, &source.pattern)?;
    info!("Reading {registry} snapshot: {} file(s)", files.len());

    // Header check pass; each reader is closed before the next file opens
    for path in &files {
        open_file(registry, path, delimiter, columns)?;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg} {human_pos} rows")
            .expect("valid template"),
    );
    pb.set_message(registry.as_str());

    let mut total = 0usize;
    let mut record = StringRecord::new();
    for path in &files {
        let (mut reader, map) = open_file(registry, path, delimiter, columns)?;
        while reader.read_record(&mut record)? {
            visit(RawRow::new(&record, &map));
            total += 1;
            if total % PROGRESS_STEP == 0 {
                pb.set_position(total as u64);
            }
        }
    }
    pb.finish_and_clear();

    info!("Read {total} {registry} rows");
    Ok(total)
}
