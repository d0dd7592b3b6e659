//! OpenSearch implementation of the index cluster client.

mod client;

pub use client::OpenSearchClient;
