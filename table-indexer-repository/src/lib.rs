//! # Table Indexer Repository
//!
//! This crate provides the interface to the live search cluster that the
//! direct-write path sends document batches to. It includes the connection
//! parameters, error types, the `IndexClusterClient` trait and a concrete
//! implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod types;

pub use config::ConnectionParams;
pub use errors::SearchIndexError;
pub use interfaces::IndexClusterClient;
pub use opensearch::OpenSearchClient;
pub use types::{BulkItemResult, BulkSummary, CommitOptions};
