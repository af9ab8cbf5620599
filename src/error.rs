//! Error taxonomy for the linking engine.
//!
//! Every stage returns [`EngineError`]. [`EngineError::kind`] collapses the
//! variants into the two classes the pipeline acts on: missing inputs (the
//! dependent stages are skipped) and computation failures (the stage aborts
//! and the previously published artifacts stay in place).

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Registry;

/// Coarse classification used for stage skipping and process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingInput,
    ComputationFailure,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no {registry} snapshot matches {pattern}")]
    MissingSnapshot { registry: Registry, pattern: String },

    #[error("{registry} snapshot {path} has no column '{column}'")]
    MissingColumn {
        registry: Registry,
        path: PathBuf,
        column: String,
    },

    #[error("artifact not found: {0}")]
    MissingArtifact(PathBuf),

    #[error("invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("catalog error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{stage} failed: {reason}")]
    Computation { stage: &'static str, reason: String },
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingSnapshot { .. } | Self::MissingColumn { .. } | Self::MissingArtifact(_) => {
                ErrorKind::MissingInput
            }
            _ => ErrorKind::ComputationFailure,
        }
    }

    pub fn computation(stage: &'static str, reason: impl Into<String>) -> Self {
        Self::Computation {
            stage,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
