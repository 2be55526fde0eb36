//! metaprobe - identify a file's format and print its metadata as JSON.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metaprobe::{report_path, Config, ExtractError, TagCatalog};

fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return report_error("config", &e);
    }

    let catalog = match TagCatalog::from_path(&config.catalog) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(path = %config.catalog.display(), "Failed to load catalog: {}", e);
            return report_error("catalog", &e.to_string());
        }
    };
    debug!(tables = catalog.table_count(), "catalog loaded");

    if config.list_tables {
        list_tables(&catalog);
        return ExitCode::SUCCESS;
    }

    // validate() guarantees a file unless --list-tables was given
    let Some(file) = config.file.as_deref() else {
        return report_error("config", "no input file");
    };
    run_probe(&config, &catalog, file)
}

// =============================================================================
// Commands
// =============================================================================

fn run_probe(config: &Config, catalog: &TagCatalog, file: &Path) -> ExitCode {
    match report_path(catalog, file, &config.extract_options(), config.pretty) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(file = %file.display(), "Extraction failed: {}", e);
            let kind = match e {
                ExtractError::Render(_) => "render",
                _ => "extract",
            };
            report_error(kind, &e.to_string())
        }
    }
}

/// Print every catalog table with its tag count, sorted by name.
fn list_tables(catalog: &TagCatalog) {
    let mut tables: Vec<(&str, usize)> = catalog.tables().map(|t| (t.name(), t.len())).collect();
    tables.sort_unstable();

    for (name, count) in &tables {
        println!("{:<48} {:>6}", name, count);
    }
    println!();
    println!("Total: {} table(s)", tables.len());
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Write a `{"error", "message"}` object to stderr and return failure.
fn report_error(kind: &str, message: &str) -> ExitCode {
    let body = serde_json::json!({
        "error": kind,
        "message": message,
    });
    eprintln!("{}", body);
    ExitCode::FAILURE
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "metaprobe=debug"
    } else {
        "metaprobe=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
