use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::job::{OutputCollector, OutputRecord};
use crate::sink::{BatchReceipt, DocumentSink};
use table_indexer_shared::Document;

/// Sink handing documents to the compute framework's output stage.
///
/// Each document becomes one key/value record keyed by its identifier. The
/// framework buffers externally and builds shards out of band.
pub struct DistributedOutputSink {
    output: OutputCollector,
}

impl DistributedOutputSink {
    pub fn new(output: OutputCollector) -> Self {
        Self { output }
    }
}

#[async_trait]
impl DocumentSink for DistributedOutputSink {
    async fn add_batch(&mut self, documents: Vec<Document>) -> Result<BatchReceipt, PipelineError> {
        let count = documents.len();
        for document in documents {
            let record = OutputRecord {
                key: document.id.clone(),
                document,
            };
            self.output
                .emit(record)
                .await
                .map_err(|e| PipelineError::transmission(e.to_string()))?;
        }
        Ok(BatchReceipt::accepted(count))
    }

    async fn close(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }
}
