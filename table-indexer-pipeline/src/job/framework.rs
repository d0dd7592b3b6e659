//! The compute framework seam.
//!
//! The orchestrator only ever talks to the framework through
//! [`ComputeFramework`]; the scheduler behind it (task placement, retries,
//! output commit) is not part of the indexer.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::PipelineError;
use crate::job::{CounterSnapshot, JobConfiguration};

/// Where the job's output stage writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    /// No file output; units write elsewhere.
    Null,
    /// Emitted key/value pairs are written below this directory.
    Directory(PathBuf),
}

/// A job ready for submission.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Human-readable job name.
    pub name: String,
    /// Table to scan; one unit runs per partition.
    pub table_name: String,
    /// Configuration distributed to every unit.
    pub configuration: JobConfiguration,
    /// Output stage of the job.
    pub output: JobOutput,
    /// Number of reduce-style aggregation units. Zero for map-only jobs.
    pub reducers: usize,
}

/// Final state of a completed job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Whether every unit completed.
    pub succeeded: bool,
    /// Counters aggregated across all units.
    pub counters: CounterSnapshot,
    /// Units that failed after exhausting their attempts.
    pub failed_units: Vec<String>,
    /// When the job started running.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the job.
    pub elapsed: Duration,
}

/// A batch compute framework able to run an indexing job.
#[async_trait]
pub trait ComputeFramework: Send + Sync {
    /// Number of worker slots the cluster reports. Informational only.
    async fn cluster_slots(&self) -> Result<usize, PipelineError>;

    /// Submit the job and wait for it to complete.
    ///
    /// Unit failures are reported through [`JobOutcome::succeeded`]; an `Err`
    /// means the job could not be run at all.
    async fn run_job(&self, job: JobSpec) -> Result<JobOutcome, PipelineError>;
}
