//! The external shard build/merge stage.
//!
//! In distributed-output mode the job only writes documents to an output
//! directory. Turning that directory into index shards is done by a separate
//! tool; this module only knows how to invoke it.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, instrument};

use crate::errors::PipelineError;

/// Parameters handed to the shard build/merge stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardBuildParams {
    /// Directory holding the job's emitted documents.
    pub input_dir: PathBuf,
    /// Root output directory of the run.
    pub output_dir: PathBuf,
    /// Number of reduce-style units building shards.
    pub reducers: usize,
    /// Number of output shards.
    pub shards: usize,
    /// Maximum number of shards merged in one step.
    pub fanout: usize,
    /// Maximum number of segments per output shard.
    pub max_segments: usize,
}

/// Runs the shard build/merge stage.
#[async_trait]
pub trait ShardBuilder: Send + Sync {
    async fn build(&self, params: &ShardBuildParams) -> Result<(), PipelineError>;

    /// Whether a successful build has taken everything it needs from the
    /// output directory. A generated directory is only removed when it has.
    fn consumes_output(&self) -> bool {
        true
    }
}

/// Shard builder that launches an external program.
///
/// The program receives `--input-dir`, `--output-dir`, `--reducers`,
/// `--shards`, `--fanout` and `--max-segments`, followed by any extra
/// arguments. A zero exit status means success.
#[derive(Debug, Clone)]
pub struct CommandShardBuilder {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl CommandShardBuilder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    fn arguments(&self, params: &ShardBuildParams) -> Vec<String> {
        let mut args = vec![
            "--input-dir".to_string(),
            params.input_dir.display().to_string(),
            "--output-dir".to_string(),
            params.output_dir.display().to_string(),
            "--reducers".to_string(),
            params.reducers.to_string(),
            "--shards".to_string(),
            params.shards.to_string(),
            "--fanout".to_string(),
            params.fanout.to_string(),
            "--max-segments".to_string(),
            params.max_segments.to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[async_trait]
impl ShardBuilder for CommandShardBuilder {
    #[instrument(skip(self, params), fields(program = %self.program.display()))]
    async fn build(&self, params: &ShardBuildParams) -> Result<(), PipelineError> {
        let args = self.arguments(params);
        info!(args = ?args, "Launching shard build/merge stage");

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .await
            .map_err(|e| {
                PipelineError::shard_build(format!(
                    "failed to launch {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !status.success() {
            return Err(PipelineError::shard_build(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }

        Ok(())
    }
}

/// Shard builder used when no external stage is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopShardBuilder;

#[async_trait]
impl ShardBuilder for NoopShardBuilder {
    async fn build(&self, params: &ShardBuildParams) -> Result<(), PipelineError> {
        info!(
            input_dir = %params.input_dir.display(),
            "No shard builder configured; leaving emitted documents in place"
        );
        Ok(())
    }

    fn consumes_output(&self) -> bool {
        false
    }
}
