use std::fmt;
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::errors::PipelineError;
use crate::sink::{BatchReceipt, DocumentSink};
use table_indexer_shared::Document;

/// Shared writer receiving dry-run documents, one JSON object per line.
#[derive(Clone)]
pub struct DryRunOutput {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl DryRunOutput {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    fn write_document(&self, document: &Document) -> Result<(), PipelineError> {
        let line = serde_json::to_string(document)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{}", line)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), PipelineError> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

impl fmt::Debug for DryRunOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DryRunOutput").finish_non_exhaustive()
    }
}

/// Sink printing documents instead of writing them anywhere.
pub struct DryRunSink {
    output: DryRunOutput,
}

impl DryRunSink {
    pub fn new(output: DryRunOutput) -> Self {
        Self { output }
    }
}

#[async_trait]
impl DocumentSink for DryRunSink {
    async fn add_batch(&mut self, documents: Vec<Document>) -> Result<BatchReceipt, PipelineError> {
        for document in &documents {
            self.output.write_document(document)?;
        }
        Ok(BatchReceipt::accepted(documents.len()))
    }

    async fn close(&mut self) -> Result<(), PipelineError> {
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_prints_one_line_per_document() {
        let buffer = SharedBuffer::default();
        let mut sink = DryRunSink::new(DryRunOutput::new(buffer.clone()));

        sink.add_batch(vec![Document::new("a").with_field("n", 1), Document::new("b")])
            .await
            .unwrap();
        sink.close().await.unwrap();

        let printed = String::from_utf8(buffer.0.lock().clone()).unwrap();
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Document = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.id, "a");
    }
}
