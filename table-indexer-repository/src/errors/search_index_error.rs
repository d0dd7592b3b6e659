//! Search index error types.
//!
//! This module defines the error types that can occur while talking to the
//! index cluster.

use thiserror::Error;

/// Errors that can occur during index cluster operations.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// A required connection parameter is absent.
    #[error("{message} ({key})")]
    MissingParameter { key: String, message: String },

    /// Failed to establish connection to the cluster.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The cluster rejected or failed a bulk request as a whole.
    #[error("Bulk operation error: {0}")]
    BulkOperationError(String),

    /// Commit (refresh/flush) failed.
    #[error("Commit error: {0}")]
    CommitError(String),

    /// Failed to parse a response from the cluster.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl SearchIndexError {
    /// Create a missing parameter error.
    pub fn missing_parameter(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MissingParameter {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a bulk operation error.
    pub fn bulk_operation(msg: impl Into<String>) -> Self {
        Self::BulkOperationError(msg.into())
    }

    /// Create a commit error.
    pub fn commit(msg: impl Into<String>) -> Self {
        Self::CommitError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}
