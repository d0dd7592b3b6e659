//! Document sinks.
//!
//! A sink is the destination of the batches flushed by the
//! [`BufferedDocumentWriter`](crate::writer::BufferedDocumentWriter). Exactly
//! one sink is selected per unit at setup time:
//!
//! - [`DirectWriteSink`] sends each batch to a live index cluster
//! - [`DistributedOutputSink`] emits documents into the framework's output stage
//! - [`DryRunSink`] prints documents and writes nowhere

mod direct;
mod dry_run;
mod output;

pub use direct::{ClusterClientFactory, DirectWriteSink, OpenSearchClientFactory};
pub use dry_run::{DryRunOutput, DryRunSink};
pub use output::DistributedOutputSink;

use async_trait::async_trait;

use crate::errors::PipelineError;
use table_indexer_shared::Document;

/// Outcome of one accepted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Documents the destination accepted.
    pub accepted: usize,
    /// Documents the destination refused individually.
    pub refused: usize,
}

impl BatchReceipt {
    /// Receipt for a batch accepted in full.
    pub fn accepted(count: usize) -> Self {
        Self {
            accepted: count,
            refused: 0,
        }
    }
}

/// Destination of document batches.
#[async_trait]
pub trait DocumentSink: Send {
    /// Transmit one batch.
    ///
    /// An `Err` is a transmission error and is fatal to the unit.
    async fn add_batch(&mut self, documents: Vec<Document>) -> Result<BatchReceipt, PipelineError>;

    /// Release the resources held by the sink. Called exactly once.
    async fn close(&mut self) -> Result<(), PipelineError>;
}
