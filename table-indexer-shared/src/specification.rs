//! The resolved configuration of one indexing run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Everything a run needs to know about what to index and where.
///
/// Built once before job submission and read-only afterwards. Distributed
/// units receive it through the job configuration, not by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingSpecification {
    /// Name of the indexer (used for logging and as the index name).
    pub indexer_name: String,
    /// Name of the source table.
    pub table_name: String,
    /// Serialized XML indexer configuration.
    pub index_config_xml: String,
    /// Free-form index connection parameters.
    pub connection_params: BTreeMap<String, String>,
}

impl IndexingSpecification {
    pub fn new(
        indexer_name: impl Into<String>,
        table_name: impl Into<String>,
        index_config_xml: impl Into<String>,
    ) -> Self {
        Self {
            indexer_name: indexer_name.into(),
            table_name: table_name.into(),
            index_config_xml: index_config_xml.into(),
            connection_params: BTreeMap::new(),
        }
    }

    /// Add a connection parameter.
    pub fn with_connection_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.connection_params.insert(key.into(), value.into());
        self
    }
}
