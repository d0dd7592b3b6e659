//! # Table Indexer Shared
//!
//! Plain data types passed between the table indexer crates: scanned rows,
//! search documents, the execution mode and the resolved indexing
//! specification for a run.

mod document;
mod mode;
mod row;
mod specification;

pub use document::Document;
pub use mode::ExecutionMode;
pub use row::Row;
pub use specification::IndexingSpecification;
