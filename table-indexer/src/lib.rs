//! # Table Indexer
//!
//! Main library for the table indexer.
//!
//! This crate provides the command line options, the dependency wiring and
//! the entry point for running an indexing job.

pub mod config;

pub use config::{Dependencies, IndexingOptions};

use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use table_indexer_pipeline::orchestrator::exit_code;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] table_indexer_pipeline::PipelineError),

    /// The run was interrupted before it completed.
    #[error("Interrupted")]
    Interrupted,
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the default level. Logs go to stderr so
/// that dry-run documents on stdout stay machine readable.
pub fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run one indexing job as described by the command line options.
///
/// Returns the process exit code of a successful run.
pub async fn run(options: IndexingOptions) -> Result<i32, IndexingError> {
    let run_options = options.run_options()?;
    let mut dependencies = Dependencies::new(&options, &run_options).await?;

    info!(
        indexer = %run_options.specification.indexer_name,
        table = %run_options.specification.table_name,
        mode = %run_options.mode,
        "Starting table indexer"
    );

    tokio::select! {
        result = dependencies.orchestrator.run(&run_options) => {
            let code = exit_code(&result);
            result?;
            Ok(code)
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal");
            Err(IndexingError::Interrupted)
        }
    }
}
