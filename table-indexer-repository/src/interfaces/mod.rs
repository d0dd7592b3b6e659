//! Interface definitions for the index cluster client.
//!
//! This module defines the abstract `IndexClusterClient` trait that allows
//! for dependency injection and swappable cluster implementations.

mod index_cluster_client;

pub use index_cluster_client::IndexClusterClient;
