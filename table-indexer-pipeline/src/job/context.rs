//! Per-unit view of the running job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::PipelineError;
use crate::job::{Counters, JobConfiguration};
use table_indexer_shared::Document;

/// A key/value pair emitted into the framework's output stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Stable document identifier.
    pub key: String,
    /// The wrapped document.
    pub document: Document,
}

/// Handle to the framework's output channel for one unit.
#[derive(Debug, Clone)]
pub enum OutputCollector {
    /// The job has no file output; anything emitted is dropped.
    Discard,
    /// Records are forwarded to the framework's output writer.
    Channel(mpsc::Sender<OutputRecord>),
}

impl OutputCollector {
    /// Emit one record. Waits while the framework's output writer is behind.
    pub async fn emit(&self, record: OutputRecord) -> Result<(), PipelineError> {
        match self {
            Self::Discard => Ok(()),
            Self::Channel(tx) => tx
                .send(record)
                .await
                .map_err(|e| PipelineError::channel(format!("output stage closed: {}", e))),
        }
    }
}

/// Everything a unit may touch of the job that hosts it.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: String,
    configuration: Arc<JobConfiguration>,
    counters: Counters,
    heartbeats: Arc<AtomicU64>,
    output: OutputCollector,
}

impl TaskContext {
    pub fn new(
        task_id: impl Into<String>,
        configuration: Arc<JobConfiguration>,
        counters: Counters,
        output: OutputCollector,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            configuration,
            counters,
            heartbeats: Arc::new(AtomicU64::new(0)),
            output,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn configuration(&self) -> &JobConfiguration {
        &self.configuration
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn output(&self) -> &OutputCollector {
        &self.output
    }

    /// Tell the framework the unit is alive.
    pub fn progress(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of progress signals so far.
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }
}
