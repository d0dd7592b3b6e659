//! Connection parameters for the index cluster.

use std::collections::BTreeMap;

use crate::errors::SearchIndexError;

/// Connection parameter naming the cluster coordination endpoint.
pub const ENDPOINT_PARAM: &str = "cluster.endpoint";

/// Connection parameter naming the target collection.
pub const COLLECTION_PARAM: &str = "cluster.collection";

/// Optional connection parameter naming the document id field.
pub const ID_FIELD_PARAM: &str = "cluster.idfield";

/// Id field used when none is configured.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Resolved parameters for a live cluster connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Coordination endpoint of the cluster (e.g. "http://localhost:9200").
    pub endpoint: String,
    /// Collection (index) that documents are written to.
    pub collection: String,
    /// Source field the document id is copied into.
    pub id_field: String,
}

impl ConnectionParams {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }

    /// Resolve connection parameters from a free-form parameter map.
    ///
    /// Both the endpoint and the collection are required; an empty value
    /// counts as missing.
    pub fn from_map(params: &BTreeMap<String, String>) -> Result<Self, SearchIndexError> {
        let endpoint = required(params, ENDPOINT_PARAM, "No index cluster endpoint defined")?;
        let collection = required(params, COLLECTION_PARAM, "No collection name defined")?;

        let id_field = params
            .get(ID_FIELD_PARAM)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string());

        Ok(Self {
            endpoint,
            collection,
            id_field,
        })
    }
}

fn required(
    params: &BTreeMap<String, String>,
    key: &str,
    message: &str,
) -> Result<String, SearchIndexError> {
    match params.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(SearchIndexError::missing_parameter(key, message)),
    }
}
