//! Error types for the table indexer pipeline.

use std::path::PathBuf;

use table_indexer_repository::SearchIndexError;
use thiserror::Error;

/// Errors that can occur in the table indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Required configuration or connection parameters are missing or invalid.
    /// Raised before any row is processed.
    #[error("Setup error: {0}")]
    SetupError(String),

    /// The sink could not transmit a batch. Fatal to the owning unit.
    #[error("Transmission error: {0}")]
    TransmissionError(String),

    /// The indexer configuration could not be read.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The output location already exists and overwriting was not requested.
    #[error("Output directory '{}' already exists. Run with --overwrite-output-dir to overwrite it, or remove it manually", .0.display())]
    OutputConflict(PathBuf),

    /// A filesystem operation on the output location failed.
    #[error("Filesystem error on '{}': {source}", path.display())]
    FileSystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table scan failed.
    #[error("Scan error: {0}")]
    ScanError(String),

    /// The compute job failed.
    #[error("Job failed: {0}")]
    JobError(String),

    /// The external shard build/merge stage failed.
    #[error("Shard build error: {0}")]
    ShardBuildError(String),

    /// Error from the index cluster.
    #[error("Search error: {0}")]
    SearchError(#[from] SearchIndexError),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a setup error.
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::SetupError(msg.into())
    }

    /// Create a transmission error.
    pub fn transmission(msg: impl Into<String>) -> Self {
        Self::TransmissionError(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a filesystem error for the given path.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystemError {
            path: path.into(),
            source,
        }
    }

    /// Create a scan error.
    pub fn scan(msg: impl Into<String>) -> Self {
        Self::ScanError(msg.into())
    }

    /// Create a job error.
    pub fn job(msg: impl Into<String>) -> Self {
        Self::JobError(msg.into())
    }

    /// Create a shard build error.
    pub fn shard_build(msg: impl Into<String>) -> Self {
        Self::ShardBuildError(msg.into())
    }

    /// Whether this is a setup error.
    #[cfg(test)]
    pub(crate) fn is_setup(&self) -> bool {
        matches!(self, Self::SetupError(_))
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }
}
