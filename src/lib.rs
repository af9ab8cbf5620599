//! # registry-linker — SIRENE ↔ RNA entity resolution
//!
//! Links business establishments (SIRENE) with nonprofit associations (RNA),
//! enriches them with geocoded addresses (BAN), and publishes a golden record,
//! per-postal-code stats and a full-text search index.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, and defaults
//! - **[`source`]** — Delimited snapshot reading with column checks
//! - **[`normalize`]** — Per-registry cleaning into typed records
//! - **[`matcher`]** — Blocking, name cleaning, exact and approximate matching
//! - **[`views`]** — Golden record, stats aggregation, search entries, tie-break policies
//! - **[`db`]** — SQLite catalog (golden record, stats, FTS5 search, lookups)
//! - **[`publish`]** — Atomic CSV artifacts
//! - **[`pipeline`]** — Stage orchestration and run reports
//! - **[`error`]** — Error taxonomy

pub mod config;
pub mod db;
pub mod error;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod views;
