//! In-process compute framework.
//!
//! Runs one tokio task per table partition, bounded by a semaphore of worker
//! slots. Each task hosts one [`IndexingUnit`]. When the job has a directory
//! output, the records a unit emits are written to `part-m-NNNNN.jsonl`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::PipelineError;
use crate::job::{
    ComputeFramework, Counters, JobConfiguration, JobOutcome, JobOutput, JobSpec, OutputCollector,
    OutputRecord, Partition, TableScanner, TaskContext,
};
use crate::unit::{IndexingUnit, UnitEnvironment};

/// Configuration for the local framework.
#[derive(Debug, Clone)]
pub struct LocalFrameworkConfig {
    /// Units allowed to run at the same time.
    pub slots: usize,
    /// Attempts per unit before the unit, and the job, fails.
    pub max_attempts: usize,
    /// Records buffered between a unit and its output file.
    pub output_buffer: usize,
}

impl Default for LocalFrameworkConfig {
    fn default() -> Self {
        Self {
            slots: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            max_attempts: 1,
            output_buffer: 1000,
        }
    }
}

/// Compute framework running every unit inside this process.
pub struct LocalComputeFramework {
    scanner: Arc<dyn TableScanner>,
    environment: Arc<UnitEnvironment>,
    config: LocalFrameworkConfig,
}

impl LocalComputeFramework {
    pub fn new(scanner: Arc<dyn TableScanner>, environment: Arc<UnitEnvironment>) -> Self {
        Self::with_config(scanner, environment, LocalFrameworkConfig::default())
    }

    pub fn with_config(
        scanner: Arc<dyn TableScanner>,
        environment: Arc<UnitEnvironment>,
        config: LocalFrameworkConfig,
    ) -> Self {
        Self {
            scanner,
            environment,
            config,
        }
    }
}

/// Name of the output file of one unit.
pub fn part_file_name(index: usize) -> String {
    format!("part-m-{:05}.jsonl", index)
}

/// One unit of a job, with everything its task needs.
struct UnitTask {
    index: usize,
    partition: Partition,
    scanner: Arc<dyn TableScanner>,
    environment: Arc<UnitEnvironment>,
    configuration: Arc<JobConfiguration>,
    output_dir: Option<PathBuf>,
    max_attempts: usize,
    output_buffer: usize,
}

impl UnitTask {
    fn name(&self) -> String {
        format!("unit_{:05}", self.index)
    }

    /// Run attempts until one succeeds. Counters of failed attempts are discarded.
    async fn run(self) -> Result<Counters, PipelineError> {
        let attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.attempt(attempt).await {
                Ok(counters) => return Ok(counters),
                Err(e) => {
                    warn!(
                        unit = %self.name(),
                        attempt = attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Unit attempt failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PipelineError::job("unit never ran")))
    }

    #[instrument(skip(self), fields(unit = %self.name(), partition = %self.partition.id))]
    async fn attempt(&self, attempt: usize) -> Result<Counters, PipelineError> {
        let counters = Counters::new();
        let task_id = format!("{}_{}", self.name(), attempt);

        let (collector, writer) = match &self.output_dir {
            Some(dir) => {
                let (tx, rx) = mpsc::channel(self.output_buffer.max(1));
                let staging = dir.join(format!(".{}.attempt_{}", part_file_name(self.index), attempt));
                let handle = tokio::spawn(write_records(staging.clone(), rx));
                (OutputCollector::Channel(tx), Some((staging, handle)))
            }
            None => (OutputCollector::Discard, None),
        };

        let context = TaskContext::new(task_id, self.configuration.clone(), counters.clone(), collector);
        let result = IndexingUnit::run(self.scanner.as_ref(), &self.partition, context, &self.environment).await;

        let Some((staging, handle)) = writer else {
            return result.map(|_| counters);
        };

        let written = match handle.await {
            Ok(written) => written,
            Err(e) => Err(PipelineError::job(format!("output writer task failed: {}", e))),
        };

        match (result, written) {
            (Ok(rows), Ok(records)) => {
                let dir = self.output_dir.as_deref().unwrap_or(Path::new("."));
                let target = dir.join(part_file_name(self.index));
                tokio::fs::rename(&staging, &target)
                    .await
                    .map_err(|e| PipelineError::file_system(&target, e))?;
                debug!(rows = rows, records = records, path = %target.display(), "Committed unit output");
                Ok(counters)
            }
            (result, written) => {
                if let Err(e) = tokio::fs::remove_file(&staging).await {
                    debug!(error = %e, path = %staging.display(), "Could not remove staging output");
                }
                result?;
                written?;
                Err(PipelineError::job("unit output was not committed"))
            }
        }
    }
}

/// Write every received record as one JSON line. Returns the record count.
async fn write_records(path: PathBuf, mut rx: mpsc::Receiver<OutputRecord>) -> Result<u64, PipelineError> {
    let file = File::create(&path)
        .await
        .map_err(|e| PipelineError::file_system(&path, e))?;
    let mut out = BufWriter::new(file);
    let mut count = 0u64;

    while let Some(record) = rx.recv().await {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        out.write_all(&line)
            .await
            .map_err(|e| PipelineError::file_system(&path, e))?;
        count += 1;
    }

    out.flush().await.map_err(|e| PipelineError::file_system(&path, e))?;
    Ok(count)
}

#[async_trait]
impl ComputeFramework for LocalComputeFramework {
    async fn cluster_slots(&self) -> Result<usize, PipelineError> {
        Ok(self.config.slots)
    }

    #[instrument(skip(self, job), fields(job = %job.name, table = %job.table_name))]
    async fn run_job(&self, job: JobSpec) -> Result<JobOutcome, PipelineError> {
        let started_at = Utc::now();
        let started = Instant::now();
        let partitions = self.scanner.partitions(&job.table_name).await?;

        let output_dir = match job.output {
            JobOutput::Directory(dir) => {
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|e| PipelineError::file_system(&dir, e))?;
                Some(dir)
            }
            JobOutput::Null => None,
        };

        info!(
            units = partitions.len(),
            slots = self.config.slots,
            reducers = job.reducers,
            "Running job"
        );

        let configuration = Arc::new(job.configuration);
        let semaphore = Arc::new(Semaphore::new(self.config.slots.max(1)));
        let mut units: Vec<(String, JoinHandle<Result<Counters, PipelineError>>)> = Vec::new();

        for (index, partition) in partitions.into_iter().enumerate() {
            let task = UnitTask {
                index,
                partition,
                scanner: self.scanner.clone(),
                environment: self.environment.clone(),
                configuration: configuration.clone(),
                output_dir: output_dir.clone(),
                max_attempts: self.config.max_attempts,
                output_buffer: self.config.output_buffer,
            };
            let name = task.name();
            let semaphore = semaphore.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| PipelineError::job(format!("worker slots closed: {}", e)))?;
                task.run().await
            });
            units.push((name, handle));
        }

        let (names, handles): (Vec<_>, Vec<_>) = units.into_iter().unzip();
        let results = join_all(handles).await;

        let counters = Counters::new();
        let mut failed_units = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(Ok(unit_counters)) => counters.merge(&unit_counters),
                Ok(Err(e)) => {
                    error!(unit = %name, error = %e, "Unit failed");
                    failed_units.push(name);
                }
                Err(e) => {
                    error!(unit = %name, error = %e, "Unit task panicked or was cancelled");
                    failed_units.push(name);
                }
            }
        }

        Ok(JobOutcome {
            succeeded: failed_units.is_empty(),
            counters: counters.snapshot(),
            failed_units,
            started_at,
            elapsed: started.elapsed(),
        })
    }
}
