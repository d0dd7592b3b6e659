//! Row-to-document mapping.
//!
//! The indexer configuration is an XML document naming the table, the unique
//! key field and one `<field>` per indexed column. [`FieldMapper`] is the
//! default [`RowMapper`] built from it.

mod conf;
mod field_mapper;

pub use conf::{FieldDefinition, FieldType, IndexerConf, RowReadMode};
pub use field_mapper::{FieldMapper, MappingError, MappingOutcome, RowMapper};
