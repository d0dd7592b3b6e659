//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `IndexClusterClient`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesFlushParts, IndicesRefreshParts},
    BulkOperation, BulkParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::ConnectionParams;
use crate::errors::SearchIndexError;
use crate::interfaces::IndexClusterClient;
use crate::types::{BulkItemResult, BulkSummary, CommitOptions};
use table_indexer_shared::Document;

/// OpenSearch client bound to a single collection.
///
/// # Example
///
/// ```ignore
/// let params = ConnectionParams::new("http://localhost:9200", "users");
/// let client = OpenSearchClient::new(&params)?;
/// let summary = client.add_documents(&docs).await?;
/// client.commit(CommitOptions::default()).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    params: ConnectionParams,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client for the given connection parameters.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If the endpoint is invalid or transport setup fails
    pub fn new(params: &ConnectionParams) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(&params.endpoint).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            endpoint = %params.endpoint,
            collection = %params.collection,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            params: params.clone(),
        })
    }

    /// Turn a bulk response body into a per-document summary.
    ///
    /// Items are matched to `ids` by position; the bulk API answers in
    /// request order.
    fn summarize_bulk_response(body: &Value, ids: &[String]) -> Result<BulkSummary, SearchIndexError> {
        if body["errors"].as_bool() == Some(false) {
            return Ok(BulkSummary::all_succeeded(ids.iter().cloned()));
        }

        let items = body["items"]
            .as_array()
            .ok_or_else(|| SearchIndexError::parse("bulk response has no items"))?;

        let mut summary = BulkSummary {
            total: ids.len(),
            ..BulkSummary::default()
        };

        for (position, id) in ids.iter().enumerate() {
            let item = items.get(position).map(|item| &item["index"]);
            let reason = match item {
                Some(item) if item["error"].is_null() => None,
                Some(item) => Some(
                    item["error"]["reason"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| item["error"].to_string()),
                ),
                None => Some("missing from bulk response".to_string()),
            };

            match reason {
                None => {
                    summary.succeeded += 1;
                    summary.results.push(BulkItemResult {
                        id: id.clone(),
                        success: true,
                        error: None,
                    });
                }
                Some(reason) => {
                    summary.failed += 1;
                    summary.results.push(BulkItemResult {
                        id: id.clone(),
                        success: false,
                        error: Some(reason),
                    });
                }
            }
        }

        Ok(summary)
    }
}

#[async_trait]
impl IndexClusterClient for OpenSearchClient {
    #[instrument(skip(self, documents), fields(count = documents.len(), collection = %self.params.collection))]
    async fn add_documents(&self, documents: &[Document]) -> Result<BulkSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BulkSummary::default());
        }

        let ids: Vec<String> = documents.iter().map(|doc| doc.id.clone()).collect();
        let operations: Vec<BulkOperation<Value>> = documents
            .iter()
            .map(|doc| {
                BulkOperation::index(doc.to_source(&self.params.id_field))
                    .id(doc.id.as_str())
                    .into()
            })
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(&self.params.collection))
            .body(operations)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_operation(format!(
                "Bulk request failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = Self::summarize_bulk_response(&body, &ids)?;
        if summary.has_failures() {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Cluster refused some documents"
            );
        } else {
            debug!(count = summary.total, "Bulk request accepted");
        }

        Ok(summary)
    }

    #[instrument(skip(self), fields(collection = %self.params.collection))]
    async fn commit(&self, options: CommitOptions) -> Result<(), SearchIndexError> {
        let indices = [self.params.collection.as_str()];

        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&indices))
            .send()
            .await
            .map_err(|e| SearchIndexError::commit(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::commit(format!(
                "Refresh failed with status {}: {}",
                status, error_body
            )));
        }

        if options.flush {
            let response = self
                .client
                .indices()
                .flush(IndicesFlushParts::Index(&indices))
                .send()
                .await
                .map_err(|e| SearchIndexError::commit(e.to_string()))?;

            let status = response.status_code();
            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                return Err(SearchIndexError::commit(format!(
                    "Flush failed with status {}: {}",
                    status, error_body
                )));
            }
        }

        info!(flush = options.flush, "Committed collection");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(matches!(body["status"].as_str(), Some("green") | Some("yellow")))
    }

    async fn shutdown(&self) -> Result<(), SearchIndexError> {
        // The transport holds no server-side session; dropping it is enough.
        debug!(collection = %self.params.collection, "Closed OpenSearch client");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_summary_without_errors() {
        let body = json!({ "took": 3, "errors": false, "items": [] });

        let summary = OpenSearchClient::summarize_bulk_response(&body, &ids(&["a", "b"])).unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_summary_with_refused_document() {
        let body = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "a", "status": 201 } },
                { "index": { "_id": "b", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [age]"
                } } }
            ]
        });

        let summary = OpenSearchClient::summarize_bulk_response(&body, &ids(&["a", "b"])).unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[1].id, "b");
        assert_eq!(
            summary.results[1].error.as_deref(),
            Some("failed to parse field [age]")
        );
    }

    #[test]
    fn test_summary_without_items_is_parse_error() {
        let body = json!({ "errors": true });

        let err = OpenSearchClient::summarize_bulk_response(&body, &ids(&["a"])).unwrap_err();
        assert!(matches!(err, SearchIndexError::ParseError(_)));
    }

    #[test]
    fn test_invalid_endpoint() {
        let params = ConnectionParams::new("not a url", "users");
        assert!(matches!(
            OpenSearchClient::new(&params),
            Err(SearchIndexError::ConnectionError(_))
        ));
    }
}
