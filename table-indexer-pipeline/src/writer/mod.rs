//! Buffered document writer.
//!
//! Accumulates documents into a batch and hands each full batch to the
//! unit's [`DocumentSink`] in one call. The remaining partial batch is flushed
//! on [`BufferedDocumentWriter::close`], which also releases the sink.

use std::mem;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, instrument, warn};

use crate::errors::PipelineError;
use crate::job::{Counters, IndexerCounter};
use crate::metrics::MetricsRegistry;
use crate::sink::DocumentSink;
use table_indexer_shared::Document;

const FLUSH_TIMER: &str = "writer.batch-flush";
const TRANSMITTED_METER: &str = "writer.documents-transmitted";

/// Batching writer in front of a [`DocumentSink`].
///
/// Not shared between units. A failed flush is not retried: the batch counts
/// as attempted and is discarded.
pub struct BufferedDocumentWriter {
    sink: Box<dyn DocumentSink>,
    capacity: usize,
    batch: Vec<Document>,
    counters: Counters,
    metrics: Arc<MetricsRegistry>,
}

impl BufferedDocumentWriter {
    /// Create a writer flushing every `capacity` documents.
    pub fn new(
        sink: Box<dyn DocumentSink>,
        capacity: usize,
        counters: Counters,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self, PipelineError> {
        if capacity == 0 {
            return Err(PipelineError::setup("writer batch size must be a positive integer"));
        }

        Ok(Self {
            sink,
            capacity,
            batch: Vec::with_capacity(capacity),
            counters,
            metrics,
        })
    }

    /// Number of documents waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Append a document, flushing when the batch is full.
    pub async fn add(&mut self, document: Document) -> Result<(), PipelineError> {
        self.batch.push(document);
        if self.batch.len() >= self.capacity {
            self.flush().await?;
        }
        Ok(())
    }

    /// Transmit the current batch, if any.
    #[instrument(skip(self), fields(count = self.batch.len()))]
    async fn flush(&mut self) -> Result<(), PipelineError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        let documents = mem::replace(&mut self.batch, Vec::with_capacity(self.capacity));
        let count = documents.len();
        let started = Instant::now();

        let receipt = self.sink.add_batch(documents).await.map_err(|e| {
            error!(error = %e, count = count, "Failed to transmit batch");
            e
        })?;

        self.counters.increment(IndexerCounter::OutputIndexDocumentBatches, 1);
        self.counters
            .increment(IndexerCounter::OutputIndexDocuments, count as u64);
        if receipt.refused > 0 {
            warn!(refused = receipt.refused, count = count, "Documents refused in batch");
            self.counters
                .increment(IndexerCounter::DocumentErrors, receipt.refused as u64);
        }

        self.metrics.record_timer(FLUSH_TIMER, started.elapsed());
        self.metrics.mark_meter(TRANSMITTED_METER, count as u64);

        debug!(count = count, accepted = receipt.accepted, "Flushed batch");
        Ok(())
    }

    /// Flush the remaining batch and release the sink.
    ///
    /// The sink is released even if the final flush fails; the flush error
    /// takes precedence.
    #[instrument(skip(self), fields(pending = self.batch.len()))]
    pub async fn close(mut self) -> Result<(), PipelineError> {
        let flushed = self.flush().await;
        let closed = self.sink.close().await;
        if let Err(e) = &closed {
            warn!(error = %e, "Failed to release document sink");
        }
        flushed.and(closed)
    }
}
