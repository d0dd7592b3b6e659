//! Index cluster client trait definition.

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::{BulkSummary, CommitOptions};
use table_indexer_shared::Document;

/// Abstract interface for a live search cluster.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// A returned `Err` means the request as a whole failed: the cluster is
/// unreachable or rejected the batch. Failures of individual documents inside
/// an accepted request are reported in the [`BulkSummary`] instead.
#[async_trait]
pub trait IndexClusterClient: Send + Sync {
    /// Send a batch of documents as a single request.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkSummary)` - The request was accepted; per-document outcomes inside
    /// * `Err(SearchIndexError)` - The request failed as a whole
    async fn add_documents(&self, documents: &[Document]) -> Result<BulkSummary, SearchIndexError>;

    /// Make everything written so far visible to searches.
    async fn commit(&self, options: CommitOptions) -> Result<(), SearchIndexError>;

    /// Check if the cluster is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the cluster is healthy
    /// * `Ok(false)` - If the cluster is unhealthy
    /// * `Err(SearchIndexError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, SearchIndexError>;

    /// Release the connection. The client must not be used afterwards.
    async fn shutdown(&self) -> Result<(), SearchIndexError>;
}
