//! Table scanning.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::errors::PipelineError;
use table_indexer_shared::Row;

/// Stream of rows from one partition.
pub type RowStream = BoxStream<'static, Result<Row, PipelineError>>;

/// One independently scannable slice of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Table the partition belongs to.
    pub table: String,
    /// Partition identifier, unique within the table.
    pub id: String,
}

/// Source of table rows.
#[async_trait]
pub trait TableScanner: Send + Sync {
    /// List the partitions of a table. Each becomes one distributed unit.
    async fn partitions(&self, table: &str) -> Result<Vec<Partition>, PipelineError>;

    /// Scan every row of a partition.
    async fn scan(&self, partition: &Partition) -> Result<RowStream, PipelineError>;
}

/// Scanner over tables stored as directories of JSON-lines files.
///
/// A table `users` lives in `<root>/users/`; every `*.jsonl` file in it is one
/// partition and every non-empty line one [`Row`].
#[derive(Debug, Clone)]
pub struct JsonLinesTableScanner {
    root: PathBuf,
}

const PARTITION_EXTENSION: &str = "jsonl";

impl JsonLinesTableScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }

    fn partition_path(&self, partition: &Partition) -> PathBuf {
        self.table_dir(&partition.table)
            .join(format!("{}.{}", partition.id, PARTITION_EXTENSION))
    }
}

fn is_partition_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(PARTITION_EXTENSION)
}

#[async_trait]
impl TableScanner for JsonLinesTableScanner {
    async fn partitions(&self, table: &str) -> Result<Vec<Partition>, PipelineError> {
        let dir = self.table_dir(table);
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| PipelineError::scan(format!("table '{}' not found at {}: {}", table, dir.display(), e)))?;

        let mut partitions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::file_system(&dir, e))?
        {
            let path = entry.path();
            if !is_partition_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                partitions.push(Partition {
                    table: table.to_string(),
                    id: stem.to_string(),
                });
            }
        }
        partitions.sort_by(|a, b| a.id.cmp(&b.id));

        debug!(table = %table, count = partitions.len(), "Listed table partitions");
        Ok(partitions)
    }

    async fn scan(&self, partition: &Partition) -> Result<RowStream, PipelineError> {
        let path = self.partition_path(partition);
        let file = File::open(&path)
            .await
            .map_err(|e| PipelineError::file_system(&path, e))?;
        let lines = BufReader::new(file).lines();
        let source = path.display().to_string();

        let rows = stream::unfold(Some((lines, 0usize)), move |state| {
            let source = source.clone();
            async move {
                let (mut lines, mut line_no) = state?;
                loop {
                    line_no += 1;
                    match lines.next_line().await {
                        Ok(Some(line)) if line.trim().is_empty() => continue,
                        Ok(Some(line)) => {
                            let row = serde_json::from_str::<Row>(&line).map_err(|e| {
                                PipelineError::scan(format!("{}:{}: {}", source, line_no, e))
                            });
                            return Some((row, Some((lines, line_no))));
                        }
                        Ok(None) => return None,
                        Err(e) => return Some((Err(PipelineError::from(e)), None)),
                    }
                }
            }
        });

        Ok(rows.boxed())
    }
}
