//! Stage orchestration.
//!
//! A run normalizes the three registries, matches establishments against
//! associations, then builds the golden record, the stats view and the search
//! index. A stage whose input is missing is skipped and a stage that errors
//! is reported as failed; stages downstream of it do not run, while
//! independent stages still do. Published artifacts of a stage that did not
//! complete keep their previous version.
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::db::Catalog;
use crate::error::{EngineError, ErrorKind, Result};
use crate::matcher::{MatchSummary, match_registries};
use crate::models::{
    AddressRecord, AssociationRecord, EstablishmentRecord, IdentifierMapping, MappingPair,
};
use crate::normalize::{normalize_addresses, normalize_associations, normalize_establishments};
use crate::publish::{read_csv, run_version, stage_csv, write_csv_atomic};
use crate::views::golden::build_golden_records;
use crate::views::search::index_entries;
use crate::views::stats::aggregate_stats;

pub const SIRENE_SNAPSHOT: &str = "sirene.csv";
pub const RNA_SNAPSHOT: &str = "rna.csv";
pub const BAN_SNAPSHOT: &str = "ban.csv";
pub const MAPPING_FILE: &str = "mapping.csv";
pub const GOLDEN_EXPORT: &str = "golden_record.csv";
pub const STATS_EXPORT: &str = "stats_view.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NormalizeSirene,
    NormalizeRna,
    NormalizeBan,
    Match,
    Golden,
    Stats,
    SearchIndex,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NormalizeSirene => "normalize_sirene",
            Stage::NormalizeRna => "normalize_rna",
            Stage::NormalizeBan => "normalize_ban",
            Stage::Match => "match",
            Stage::Golden => "golden_record",
            Stage::Stats => "stats_view",
            Stage::SearchIndex => "search_index",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Completed { rows: usize, elapsed: Duration },
    Skipped { reason: String },
    Failed { error: String, elapsed: Duration },
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// Version stamped on every artifact this run published.
    pub version: String,
    pub stages: Vec<(Stage, StageStatus)>,
    pub match_summary: Option<MatchSummary>,
}

impl RunReport {
    fn new(version: String) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, status)| status)
    }

    pub fn completed(&self) -> usize {
        self.count(|s| matches!(s, StageStatus::Completed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, StageStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, StageStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&StageStatus) -> bool) -> usize {
        self.stages.iter().filter(|(_, s)| pred(s)).count()
    }

    /// Process exit code: 3 on any failure, 2 when a stage was skipped, else 0.
    pub fn exit_code(&self) -> u8 {
        if self.failed() > 0 {
            3
        } else if self.skipped() > 0 {
            2
        } else {
            0
        }
    }
}

/// Why a value is unavailable to the stages that consume it.
#[derive(Debug, Clone)]
struct Blocked {
    reason: String,
    kind: ErrorKind,
}

impl From<&EngineError> for Blocked {
    fn from(e: &EngineError) -> Self {
        Self {
            reason: e.to_string(),
            kind: e.kind(),
        }
    }
}

type Input<T> = std::result::Result<T, Blocked>;

fn first_blocked<'a>(inputs: &[Option<&'a Blocked>]) -> Option<&'a Blocked> {
    inputs.iter().flatten().next().copied()
}

struct Snapshots {
    establishments: Input<Vec<EstablishmentRecord>>,
    associations: Input<Vec<AssociationRecord>>,
    addresses: Input<Vec<AddressRecord>>,
}

pub struct Pipeline {
    config: Config,
    version: String,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            version: run_version(),
        }
    }

    /// Normalize, match and build every view from the raw snapshots.
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::new(self.version.clone());
        info!("Starting run {}", self.version);

        let snapshots = self.normalize_stages(&mut report);
        let mapping = self.match_stage(&mut report, &snapshots.establishments, &snapshots.associations);
        self.view_stages(&mut report, &snapshots.establishments, &snapshots.addresses, &mapping);

        self.log_report(&report);
        report
    }

    /// Rebuild the normalized snapshots only.
    pub fn normalize(&self) -> RunReport {
        let mut report = RunReport::new(self.version.clone());
        self.normalize_stages(&mut report);
        self.log_report(&report);
        report
    }

    /// Rebuild the identifier mapping from the published normalized snapshots.
    pub fn rematch(&self) -> RunReport {
        let mut report = RunReport::new(self.version.clone());
        let establishments = self.load_silver(SIRENE_SNAPSHOT);
        let associations = self.load_silver(RNA_SNAPSHOT);
        let _ = self.match_stage(&mut report, &establishments, &associations);
        self.log_report(&report);
        report
    }

    /// Rebuild the views from the published snapshots and mapping.
    pub fn rebuild_views(&self) -> RunReport {
        let mut report = RunReport::new(self.version.clone());
        let establishments = self.load_silver(SIRENE_SNAPSHOT);
        let addresses = self.load_silver(BAN_SNAPSHOT);
        let mapping = self
            .load_silver::<MappingPair>(MAPPING_FILE)
            .map(|pairs| pairs.into_iter().collect::<IdentifierMapping>());
        self.view_stages(&mut report, &establishments, &addresses, &mapping);
        self.log_report(&report);
        report
    }

    fn normalize_stages(&self, report: &mut RunReport) -> Snapshots {
        let sources = &self.config.sources;
        let establishments = self.run_stage(report, Stage::NormalizeSirene, || {
            let records = normalize_establishments(&sources.sirene)?;
            self.publish_silver(SIRENE_SNAPSHOT, records)
        });
        let associations = self.run_stage(report, Stage::NormalizeRna, || {
            let records = normalize_associations(&sources.rna)?;
            self.publish_silver(RNA_SNAPSHOT, records)
        });
        let addresses = self.run_stage(report, Stage::NormalizeBan, || {
            let records = normalize_addresses(&sources.ban)?;
            self.publish_silver(BAN_SNAPSHOT, records)
        });
        Snapshots {
            establishments,
            associations,
            addresses,
        }
    }

    fn match_stage(
        &self,
        report: &mut RunReport,
        establishments: &Input<Vec<EstablishmentRecord>>,
        associations: &Input<Vec<AssociationRecord>>,
    ) -> Input<IdentifierMapping> {
        let (Ok(est), Ok(assoc)) = (establishments, associations) else {
            let blocked = first_blocked(&[establishments.as_ref().err(), associations.as_ref().err()]);
            return Err(self.block_stage(report, Stage::Match, blocked));
        };

        let mut summary = None;
        let mapping = self.run_stage(report, Stage::Match, || {
            let outcome = match_registries(est, assoc, &self.config.matching)?;
            write_csv_atomic(&self.config.silver_path(MAPPING_FILE), outcome.mapping.pairs())?;
            let rows = outcome.mapping.len();
            summary = Some(outcome.summary);
            Ok((outcome.mapping, rows))
        });
        report.match_summary = summary;
        mapping
    }

    fn view_stages(
        &self,
        report: &mut RunReport,
        establishments: &Input<Vec<EstablishmentRecord>>,
        addresses: &Input<Vec<AddressRecord>>,
        mapping: &Input<IdentifierMapping>,
    ) {
        match (establishments, mapping, addresses) {
            (Ok(est), Ok(mapping), Ok(ban)) => {
                let _ = self.run_stage(report, Stage::Golden, || {
                    let records = build_golden_records(est, mapping, ban, &self.config.tie_break);
                    // Renamed into place only once the catalog commit succeeds
                    let export = stage_csv(&self.config.gold_path(GOLDEN_EXPORT), &records)?;
                    self.open_catalog()?
                        .replace_golden_records(&self.version, &records)?;
                    let rows = export.commit()?;
                    Ok(((), rows))
                });
            }
            _ => {
                let blocked = first_blocked(&[
                    establishments.as_ref().err(),
                    mapping.as_ref().err(),
                    addresses.as_ref().err(),
                ]);
                self.block_stage(report, Stage::Golden, blocked);
            }
        }

        let (Ok(est), Ok(mapping)) = (establishments, mapping) else {
            let blocked = first_blocked(&[establishments.as_ref().err(), mapping.as_ref().err()]);
            self.block_stage(report, Stage::Stats, blocked);
            self.block_stage(report, Stage::SearchIndex, blocked);
            return;
        };

        let _ = self.run_stage(report, Stage::Stats, || {
            let entries = aggregate_stats(est, mapping);
            let export = stage_csv(&self.config.gold_path(STATS_EXPORT), &entries)?;
            self.open_catalog()?.replace_stats(&self.version, &entries)?;
            let rows = export.commit()?;
            Ok(((), rows))
        });

        let _ = self.run_stage(report, Stage::SearchIndex, || {
            let entries = index_entries(est, mapping);
            let rows = self
                .open_catalog()?
                .replace_search_index(&self.version, &entries)?;
            Ok(((), rows))
        });
    }

    /// Run one stage, timing it and recording its outcome.
    fn run_stage<T, F>(&self, report: &mut RunReport, stage: Stage, f: F) -> Input<T>
    where
        F: FnOnce() -> Result<(T, usize)>,
    {
        info!("▶ {stage}");
        let start = Instant::now();

        match f() {
            Ok((value, rows)) => {
                let elapsed = start.elapsed();
                info!("✓ {stage}: {rows} rows in {:.2}s", elapsed.as_secs_f64());
                report
                    .stages
                    .push((stage, StageStatus::Completed { rows, elapsed }));
                Ok(value)
            }
            Err(e) => {
                let elapsed = start.elapsed();
                let blocked = Blocked::from(&e);
                match blocked.kind {
                    ErrorKind::MissingInput => {
                        warn!("⏭ {stage} skipped: {e}");
                        report.stages.push((
                            stage,
                            StageStatus::Skipped {
                                reason: e.to_string(),
                            },
                        ));
                    }
                    ErrorKind::ComputationFailure => {
                        error!("✗ {stage} failed after {:.2}s: {e}", elapsed.as_secs_f64());
                        report.stages.push((
                            stage,
                            StageStatus::Failed {
                                error: e.to_string(),
                                elapsed,
                            },
                        ));
                    }
                }
                Err(blocked)
            }
        }
    }

    /// Record a stage that cannot run because an input is unavailable.
    ///
    /// The stage inherits the classification of the upstream problem: skipped
    /// behind a missing input, failed behind a failure.
    fn block_stage(&self, report: &mut RunReport, stage: Stage, blocked: Option<&Blocked>) -> Blocked {
        let (cause, kind) = blocked.map_or(("input unavailable", ErrorKind::MissingInput), |b| {
            (b.reason.as_str(), b.kind)
        });
        let reason = format!("upstream input unavailable: {cause}");
        let status = match kind {
            ErrorKind::MissingInput => {
                warn!("⏭ {stage} skipped: {reason}");
                StageStatus::Skipped {
                    reason: reason.clone(),
                }
            }
            ErrorKind::ComputationFailure => {
                error!("✗ {stage} not run: {reason}");
                StageStatus::Failed {
                    error: reason.clone(),
                    elapsed: Duration::ZERO,
                }
            }
        };
        report.stages.push((stage, status));
        Blocked { reason, kind }
    }

    fn publish_silver<T: Serialize>(&self, file: &str, records: Vec<T>) -> Result<(Vec<T>, usize)> {
        let rows = write_csv_atomic(&self.config.silver_path(file), &records)?;
        Ok((records, rows))
    }

    /// Read a published silver artifact; a corrupt file blocks dependents as a failure.
    fn load_silver<T: DeserializeOwned>(&self, file: &str) -> Input<Vec<T>> {
        read_csv(&self.config.silver_path(file)).map_err(|e| {
            if e.kind() == ErrorKind::ComputationFailure {
                error!("Failed to load {file}: {e}");
            }
            Blocked::from(&e)
        })
    }

    fn open_catalog(&self) -> Result<Catalog> {
        let path = Path::new(&self.config.catalog_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Catalog::open(path)
    }

    fn log_report(&self, report: &RunReport) {
        info!(
            "Run {} finished: {} completed, {} skipped, {} failed",
            report.version,
            report.completed(),
            report.skipped(),
            report.failed()
        );
    }
}
