//! Processor module for the table indexer pipeline.
//!
//! Turns scanned rows into documents and pushes them to the unit's writer.

mod row_processor;

pub use row_processor::RowProcessor;
