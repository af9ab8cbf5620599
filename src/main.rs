use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use registry_linker::config::Config;
use registry_linker::db::Catalog;
use registry_linker::db::golden::is_valid_siret;
use registry_linker::db::search::SearchFilter;
use registry_linker::error::{EngineError, ErrorKind};
use registry_linker::pipeline::{Pipeline, RunReport, StageStatus};

const EXIT_USAGE: u8 = 1;
const EXIT_MISSING_INPUT: u8 = 2;
const EXIT_FAILURE: u8 = 3;
const EXIT_NOT_FOUND: u8 = 4;

#[derive(Parser)]
#[command(name = "registry-linker", version, about = "SIRENE / RNA entity resolution and golden records")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize, match and rebuild every view
    Run,
    /// Rebuild the normalized snapshots only
    Normalize,
    /// Rebuild the identifier mapping from the normalized snapshots
    Match,
    /// Rebuild golden record, stats and search index from published inputs
    Views,
    /// Golden record of one establishment
    Lookup { siret: String },
    /// Stats of one postal code
    Stats { postal_code: String },
    /// Full-text search on establishment names
    Search {
        term: String,
        /// Department (postal-code prefix); wins over --postal-code
        #[arg(long)]
        dept: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let code = match cli.command {
        Command::Run => report_exit(Pipeline::new(config).run()),
        Command::Normalize => report_exit(Pipeline::new(config).normalize()),
        Command::Match => report_exit(Pipeline::new(config).rematch()),
        Command::Views => report_exit(Pipeline::new(config).rebuild_views()),
        Command::Lookup { siret } => lookup(&config, &siret),
        Command::Stats { postal_code } => stats(&config, &postal_code),
        Command::Search {
            term,
            dept,
            postal_code,
            limit,
        } => search(&config, &term, dept.as_deref(), postal_code.as_deref(), limit),
    };
    ExitCode::from(code)
}

fn load_config(path: &str) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn report_exit(report: RunReport) -> u8 {
    for (stage, status) in &report.stages {
        match status {
            StageStatus::Completed { rows, elapsed } => {
                println!("  ✓ {stage:<18} {rows:>10} rows  {:>8.2}s", elapsed.as_secs_f64());
            }
            StageStatus::Skipped { reason } => println!("  ⏭ {stage:<18} skipped: {reason}"),
            StageStatus::Failed { error, elapsed } => {
                println!("  ✗ {stage:<18} failed after {:.2}s: {error}", elapsed.as_secs_f64());
            }
        }
    }
    if let Some(summary) = &report.match_summary {
        println!(
            "  mapping: {} pairs ({} exact, {} approximate)",
            summary.total_pairs, summary.exact_pairs, summary.fuzzy_pairs
        );
    }
    report.exit_code()
}

fn engine_exit(e: &EngineError) -> u8 {
    error!("{e}");
    match e.kind() {
        ErrorKind::MissingInput => EXIT_MISSING_INPUT,
        ErrorKind::ComputationFailure => EXIT_FAILURE,
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => error!("Failed to render response: {e}"),
    }
}

fn lookup(config: &Config, siret: &str) -> u8 {
    if !is_valid_siret(siret) {
        print_json(&json!({
            "error": "INVALID FORMAT",
            "message": "SIRET must be exactly 14 digits.",
        }));
        return EXIT_USAGE;
    }

    let record = Catalog::open_read_only(&config.catalog_path).and_then(|c| c.golden_record(siret));
    match record {
        Ok(Some(r)) => {
            print_json(&json!({
                "identity": {
                    "siret": r.siret,
                    "nom_raison_sociale": r.name,
                    "enseigne": null,
                    "status": r.status,
                },
                "asso_id": { "id_rna": r.id_rna },
                "location": {
                    "code_postal": r.postal_code,
                    "commune": r.city,
                    "latitude": r.latitude,
                    "longitude": r.longitude,
                    "is_ban_validated": r.is_ban_validated,
                },
            }));
            0
        }
        Ok(None) => {
            print_json(&json!({
                "error": "SIRET NOT FOUND",
                "message": format!("Unknown SIRET {siret}."),
                "input": siret,
            }));
            EXIT_NOT_FOUND
        }
        Err(e) => engine_exit(&e),
    }
}

fn stats(config: &Config, postal_code: &str) -> u8 {
    let entry = Catalog::open_read_only(&config.catalog_path).and_then(|c| c.stats(postal_code));
    match entry {
        Ok(Some(s)) => {
            print_json(&json!({
                "zone": s.postal_code,
                "total_entites": s.total_entites,
                "repartition": {
                    "associations": s.associations,
                    "entreprises_pures": s.entreprises_pures,
                },
            }));
            0
        }
        Ok(None) => {
            print_json(&json!({
                "error": "Not Found",
                "message": format!("No data for postal code {postal_code}."),
            }));
            EXIT_NOT_FOUND
        }
        Err(e) => engine_exit(&e),
    }
}

fn search(
    config: &Config,
    term: &str,
    dept: Option<&str>,
    postal_code: Option<&str>,
    limit: usize,
) -> u8 {
    let filter = SearchFilter {
        department: dept,
        postal_code,
    };
    let hits = Catalog::open_read_only(&config.catalog_path)
        .and_then(|c| c.search_with_filter(term, Some(limit), Some(&filter)));
    match hits {
        Ok(results) => {
            info!("Search '{term}': {} results", results.len());
            print_json(&json!({
                "query": term,
                "count": results.len(),
                "results": results,
            }));
            0
        }
        Err(e) => engine_exit(&e),
    }
}
