//! Configuration for the table indexer binary.

mod dependencies;
mod options;

pub use dependencies::Dependencies;
pub use options::IndexingOptions;
