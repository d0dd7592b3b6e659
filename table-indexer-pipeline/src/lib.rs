//! # Table Indexer Pipeline
//!
//! This crate provides the pipeline that turns scanned table rows into search
//! documents and delivers them to a search index through a batch compute
//! framework.
//!
//! ## Architecture
//!
//! Every distributed unit hosts one indexing unit:
//!
//! 1. **Processor**: maps each row into documents and counts it
//! 2. **Writer**: batches documents and flushes them to the selected sink
//! 3. **Sink**: direct write to the cluster, the framework's output stage, or a dry run
//! 4. **Metrics**: republished as job counters when the unit is cleaned up
//!
//! The **Orchestrator** picks the execution strategy, submits the job and
//! finalizes it (final commit, or the external shard build).

pub mod errors;
pub mod job;
pub mod mapping;
pub mod metrics;
pub mod orchestrator;
pub mod processor;
pub mod sink;
pub mod unit;
pub mod writer;

pub use errors::PipelineError;
