//! Core library entry for the `schemalink` CLI.
//!
//! Keeps warehouse metadata consistent with the documents that describe it:
//! sync jobs pull schemas out of source documents, compare them with the live
//! warehouse, write descriptions back, and record provenance in a lineage graph.

pub mod adapters;
pub mod blocking;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod drift;
pub mod error;
pub mod extract;
pub mod lineage;
pub mod ports;
pub mod quality;
pub mod schema;
pub mod sync;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Installs the stderr log subscriber. `RUST_LOG` wins over `default_level`.
///
/// Does nothing if a subscriber is already installed.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init();
}

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails, configuration cannot
/// be loaded, or command execution fails. `--help` and `--version` print
/// their text and return `Ok`.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = match cli::Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.to_string()),
    };
    let config = AppConfig::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    init_logging(&config.logging.level);
    commands::dispatch(&cli.command, &config)
}
