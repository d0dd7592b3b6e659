//! Row processor implementation.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::errors::PipelineError;
use crate::job::{IndexerCounter, TaskContext};
use crate::mapping::RowMapper;
use crate::metrics::MetricsRegistry;
use crate::writer::BufferedDocumentWriter;
use table_indexer_shared::Row;

const DOCUMENTS_PER_ROW_HISTOGRAM: &str = "processor.documents-per-row";
const ROW_TIMER: &str = "processor.row";

/// Per-unit processor converting each row into zero or more documents.
///
/// Mapping errors are counted and never abort the unit. A writer error means
/// the destination rejected a batch and is returned to the caller.
pub struct RowProcessor {
    mapper: Arc<dyn RowMapper>,
    writer: BufferedDocumentWriter,
    context: TaskContext,
    metrics: Arc<MetricsRegistry>,
}

impl RowProcessor {
    pub fn new(
        mapper: Arc<dyn RowMapper>,
        writer: BufferedDocumentWriter,
        context: TaskContext,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            mapper,
            writer,
            context,
            metrics,
        }
    }

    /// Process one row.
    #[instrument(skip(self, row), fields(task = %self.context.task_id(), key = %row.key))]
    pub async fn process(&mut self, row: Row) -> Result<(), PipelineError> {
        let started = Instant::now();
        self.context.progress();
        self.context.counters().increment(IndexerCounter::InputRows, 1);

        let outcome = self.mapper.map(&row);

        for e in &outcome.errors {
            warn!(field = %e.field, error = %e.message, "Dropping document with invalid field");
        }
        if outcome.dropped > 0 {
            self.context
                .counters()
                .increment(IndexerCounter::MappingErrors, outcome.dropped as u64);
        }

        let count = outcome.documents.len();
        for document in outcome.documents {
            self.writer.add(document).await?;
        }

        self.metrics.update_histogram(DOCUMENTS_PER_ROW_HISTOGRAM, count as u64);
        self.metrics.record_timer(ROW_TIMER, started.elapsed());
        debug!(documents = count, "Processed row");
        Ok(())
    }

    /// Give up the processor, returning its writer for closing.
    pub fn into_writer(self) -> BufferedDocumentWriter {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Counters, JobConfiguration, OutputCollector};
    use crate::mapping::{MappingError, MappingOutcome};
    use crate::sink::{BatchReceipt, DocumentSink};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use table_indexer_shared::Document;

    /// Mapper producing one document per `doc:N` column and one error per
    /// `bad:N` column. A row with any `bad:N` column counts one dropped document.
    struct ColumnMapper;

    impl RowMapper for ColumnMapper {
        fn map(&self, row: &Row) -> MappingOutcome {
            let mut outcome = MappingOutcome::default();
            for column in row.columns.keys() {
                if column.starts_with("doc:") {
                    outcome.documents.push(Document::new(format!("{}/{}", row.key, column)));
                } else if column.starts_with("bad:") {
                    outcome.errors.push(MappingError {
                        row_key: row.key.clone(),
                        field: column.clone(),
                        message: "invalid".to_string(),
                    });
                }
            }
            if !outcome.errors.is_empty() {
                outcome.dropped = 1;
            }
            outcome
        }
    }

    struct CountingSink {
        transmitted: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl DocumentSink for CountingSink {
        async fn add_batch(&mut self, documents: Vec<Document>) -> Result<BatchReceipt, PipelineError> {
            if self.fail {
                return Err(PipelineError::transmission("connection refused"));
            }
            self.transmitted.fetch_add(documents.len(), Ordering::SeqCst);
            Ok(BatchReceipt::accepted(documents.len()))
        }

        async fn close(&mut self) -> Result<(), PipelineError> {
            Ok(())
        }
    }

    fn new_processor(fail: bool) -> (RowProcessor, TaskContext, Arc<AtomicUsize>) {
        let transmitted = Arc::new(AtomicUsize::new(0));
        let context = TaskContext::new(
            "unit_00000_0",
            Arc::new(JobConfiguration::new()),
            Counters::new(),
            OutputCollector::Discard,
        );
        let metrics = Arc::new(MetricsRegistry::new());
        let writer = BufferedDocumentWriter::new(
            Box::new(CountingSink {
                transmitted: transmitted.clone(),
                fail,
            }),
            1,
            context.counters().clone(),
            metrics.clone(),
        )
        .unwrap();
        let processor = RowProcessor::new(Arc::new(ColumnMapper), writer, context.clone(), metrics);
        (processor, context, transmitted)
    }

    #[tokio::test]
    async fn test_input_rows_counted_regardless_of_documents() {
        let (mut processor, context, transmitted) = new_processor(false);

        processor.process(Row::new("r1")).await.unwrap();
        processor
            .process(Row::new("r2").with_column("doc:a", "1").with_column("doc:b", "2"))
            .await
            .unwrap();
        processor.process(Row::new("r3").with_column("doc:a", "1")).await.unwrap();

        let counters = context.counters();
        assert_eq!(counters.get(IndexerCounter::InputRows), 3);
        assert_eq!(counters.get(IndexerCounter::OutputIndexDocuments), 3);
        assert_eq!(transmitted.load(Ordering::SeqCst), 3);
        assert_eq!(context.heartbeats(), 3);
    }

    #[tokio::test]
    async fn test_mapping_errors_are_counted_not_fatal() {
        let (mut processor, context, transmitted) = new_processor(false);

        processor
            .process(Row::new("r1").with_column("bad:x", "?").with_column("doc:a", "1"))
            .await
            .unwrap();

        assert_eq!(context.counters().get(IndexerCounter::MappingErrors), 1);
        assert_eq!(transmitted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mapping_errors_count_dropped_documents_not_fields() {
        let (mut processor, context, _) = new_processor(false);

        processor
            .process(
                Row::new("r1")
                    .with_column("bad:x", "?")
                    .with_column("bad:y", "?")
                    .with_column("bad:z", "?"),
            )
            .await
            .unwrap();

        assert_eq!(context.counters().get(IndexerCounter::MappingErrors), 1);
    }

    #[tokio::test]
    async fn test_documents_per_row_histogram_records_values() {
        let (mut processor, _, _) = new_processor(false);
        let metrics = processor.metrics.clone();

        processor.process(Row::new("r1")).await.unwrap();
        processor
            .process(Row::new("r2").with_column("doc:a", "1").with_column("doc:b", "2"))
            .await
            .unwrap();

        let histogram = metrics.histograms()[DOCUMENTS_PER_ROW_HISTOGRAM];
        assert_eq!(histogram.count, 2);
        assert_eq!(histogram.sum, 2);
        assert_eq!(histogram.min, 0);
        assert_eq!(histogram.max, 2);
    }

    #[tokio::test]
    async fn test_transmission_error_is_fatal() {
        let (mut processor, context, _) = new_processor(true);

        let err = processor
            .process(Row::new("r1").with_column("doc:a", "1"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::TransmissionError(_)));
        assert_eq!(context.counters().get(IndexerCounter::InputRows), 1);
        assert_eq!(context.heartbeats(), 1);
    }
}
