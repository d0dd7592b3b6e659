//! Request and response types for index cluster operations.

/// Result of a single document within a bulk request.
#[derive(Debug, Clone)]
pub struct BulkItemResult {
    /// The document identifier.
    pub id: String,
    /// Whether the document was accepted.
    pub success: bool,
    /// Error reason reported by the cluster if it was not.
    pub error: Option<String>,
}

/// Summary of a bulk request containing aggregate statistics and individual results.
///
/// A summary is only produced when the request itself succeeded. Documents the
/// cluster refused are listed here and never surface as an error.
#[derive(Debug, Clone, Default)]
pub struct BulkSummary {
    /// Total number of documents in the request.
    pub total: usize,
    /// Number of accepted documents.
    pub succeeded: usize,
    /// Number of refused documents.
    pub failed: usize,
    /// Individual results for each document.
    pub results: Vec<BulkItemResult>,
}

impl BulkSummary {
    /// Summary for a request where every document was accepted.
    pub fn all_succeeded(ids: impl IntoIterator<Item = String>) -> Self {
        let results: Vec<BulkItemResult> = ids
            .into_iter()
            .map(|id| BulkItemResult {
                id,
                success: true,
                error: None,
            })
            .collect();
        Self {
            total: results.len(),
            succeeded: results.len(),
            failed: 0,
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Options for the final commit against the cluster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Also flush segments to durable storage.
    pub flush: bool,
}
