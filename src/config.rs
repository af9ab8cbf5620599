/// Configuration module for the registry linker.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::matcher::MatchConfig;
use crate::models::Registry;
use crate::views::tiebreak::TieBreakPolicy;

// ── Default value functions ──────────────────────────────────────────

fn default_sirene_source() -> SourceConfig {
    SourceConfig {
        pattern: "data/raw/sirene/StockEtablissement_utf8.csv".to_string(),
        delimiter: ',',
    }
}

fn default_rna_source() -> SourceConfig {
    SourceConfig {
        pattern: "data/raw/rna/rna_waldec_*.csv".to_string(),
        delimiter: ';',
    }
}

fn default_ban_source() -> SourceConfig {
    SourceConfig {
        pattern: "data/raw/ban/adresses-france.csv".to_string(),
        delimiter: ';',
    }
}

fn default_silver_dir() -> String {
    "./data/silver".to_string()
}

fn default_gold_dir() -> String {
    "./data/gold".to_string()
}

fn default_catalog_path() -> String {
    "./data/catalog.db".to_string()
}

fn default_delimiter() -> char {
    ','
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Normalized per-registry snapshots and the identifier mapping.
    #[serde(default = "default_silver_dir")]
    pub silver_dir: String,

    /// CSV exports of the golden record and the stats view.
    #[serde(default = "default_gold_dir")]
    pub gold_dir: String,

    /// SQLite catalog read by the serving layer.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    #[serde(default)]
    pub matching: MatchConfig,

    #[serde(default)]
    pub tie_break: TieBreakPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_sirene_source")]
    pub sirene: SourceConfig,

    #[serde(default = "default_rna_source")]
    pub rna: SourceConfig,

    #[serde(default = "default_ban_source")]
    pub ban: SourceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SourceConfig {
    /// Glob pattern; every matching file is part of the snapshot.
    pub pattern: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            silver_dir: default_silver_dir(),
            gold_dir: default_gold_dir(),
            catalog_path: default_catalog_path(),
            matching: MatchConfig::default(),
            tie_break: TieBreakPolicy::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            sirene: default_sirene_source(),
            rna: default_rna_source(),
            ban: default_ban_source(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl SourcesConfig {
    pub fn get(&self, registry: Registry) -> &SourceConfig {
        match registry {
            Registry::Sirene => &self.sirene,
            Registry::Rna => &self.rna,
            Registry::Ban => &self.ban,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the binary's working dir.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        for registry in [Registry::Sirene, Registry::Rna, Registry::Ban] {
            let source = self.sources.get(registry);
            anyhow::ensure!(
                !source.pattern.trim().is_empty(),
                "sources.{registry}.pattern must not be empty"
            );
            anyhow::ensure!(
                source.delimiter.is_ascii() && !source.delimiter.is_ascii_alphanumeric(),
                "sources.{registry}.delimiter must be an ASCII punctuation or whitespace character"
            );
        }
        anyhow::ensure!(!self.silver_dir.is_empty(), "silver_dir must not be empty");
        anyhow::ensure!(!self.gold_dir.is_empty(), "gold_dir must not be empty");
        anyhow::ensure!(!self.catalog_path.is_empty(), "catalog_path must not be empty");
        self.matching.validate().map_err(anyhow::Error::msg)?;
        Ok(())
    }

    #[must_use]
    pub fn silver_path(&self, file: &str) -> PathBuf {
        Path::new(&self.silver_dir).join(file)
    }

    #[must_use]
    pub fn gold_path(&self, file: &str) -> PathBuf {
        Path::new(&self.gold_dir).join(file)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sources.sirene.delimiter, ',');
        assert_eq!(config.sources.rna.delimiter, ';');
        assert!(config.sources.rna.pattern.contains('*'));
        assert_eq!(config.matching.exact_min_len, 3);
        assert_eq!(config.matching.fuzzy_min_len, 4);
        assert!((config.matching.fuzzy_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.tie_break, TieBreakPolicy::AnyValue);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{
            "catalog_path": "./test.db",
            "sources": { "ban": { "pattern": "ban/*.csv" } },
            "matching": { "fuzzy_threshold": 0.9 },
            "tie_break": "lowest"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.catalog_path, "./test.db");
        assert_eq!(config.sources.ban.pattern, "ban/*.csv");
        assert_eq!(config.sources.ban.delimiter, ',');
        // Untouched sections keep their defaults
        assert_eq!(config.sources.rna, default_rna_source());
        assert_eq!(config.matching.exact_min_len, 3);
        assert!((config.matching.fuzzy_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.tie_break, TieBreakPolicy::Lowest);
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_threshold() {
        let mut config = Config::default();
        config.matching.fuzzy_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_delimiter() {
        let mut config = Config::default();
        config.sources.ban.delimiter = 'é';
        assert!(config.validate().is_err());
        config.sources.ban.delimiter = 'x';
        assert!(config.validate().is_err());
        config.sources.ban.delimiter = '\t';
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.catalog_path, default_catalog_path());
        assert!(!path.exists(), "templates are only generated for the default path");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.catalog_path, config.catalog_path);
        assert_eq!(parsed.sources.rna, config.sources.rna);
        assert_eq!(parsed.tie_break, config.tie_break);
    }
}
