use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::errors::PipelineError;
use crate::sink::{BatchReceipt, DocumentSink};
use table_indexer_repository::{ConnectionParams, IndexClusterClient, OpenSearchClient, SearchIndexError};
use table_indexer_shared::Document;

/// Opens connections to the index cluster.
#[async_trait]
pub trait ClusterClientFactory: Send + Sync {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn IndexClusterClient>, SearchIndexError>;
}

/// Factory for [`OpenSearchClient`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenSearchClientFactory;

#[async_trait]
impl ClusterClientFactory for OpenSearchClientFactory {
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn IndexClusterClient>, SearchIndexError> {
        let client = OpenSearchClient::new(params)?;
        Ok(Arc::new(client))
    }
}

/// Sink sending every batch to a live index cluster as a single request.
pub struct DirectWriteSink {
    client: Arc<dyn IndexClusterClient>,
    collection: String,
}

impl DirectWriteSink {
    pub fn new(client: Arc<dyn IndexClusterClient>, params: &ConnectionParams) -> Self {
        Self {
            client,
            collection: params.collection.clone(),
        }
    }

    /// Connect to the cluster described by `params`.
    pub async fn connect(factory: &dyn ClusterClientFactory, params: &ConnectionParams) -> Result<Self, PipelineError> {
        let client = factory.connect(params).await.map_err(|e| {
            PipelineError::setup(format!("cannot connect to index cluster at {}: {}", params.endpoint, e))
        })?;
        info!(endpoint = %params.endpoint, collection = %params.collection, "Connected to index cluster");
        Ok(Self::new(client, params))
    }
}

#[async_trait]
impl DocumentSink for DirectWriteSink {
    #[instrument(skip(self, documents), fields(collection = %self.collection, count = documents.len()))]
    async fn add_batch(&mut self, documents: Vec<Document>) -> Result<BatchReceipt, PipelineError> {
        let summary = self
            .client
            .add_documents(&documents)
            .await
            .map_err(|e| PipelineError::transmission(e.to_string()))?;

        for item in summary.results.iter().filter(|r| !r.success) {
            warn!(
                id = %item.id,
                error = item.error.as_deref().unwrap_or("unknown"),
                "Document refused by index cluster"
            );
        }

        debug!(succeeded = summary.succeeded, failed = summary.failed, "Batch transmitted");
        Ok(BatchReceipt {
            accepted: summary.succeeded,
            refused: summary.failed,
        })
    }

    async fn close(&mut self) -> Result<(), PipelineError> {
        self.client.shutdown().await?;
        debug!(collection = %self.collection, "Closed index cluster connection");
        Ok(())
    }
}
