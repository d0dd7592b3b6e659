//! Job configuration store.
//!
//! The configuration is the only channel through which the orchestrator hands
//! run parameters to distributed units. Values are plain strings, as they would
//! be in any framework-side configuration file.

use std::collections::BTreeMap;

use tracing::warn;

/// Configuration key for the name of the indexer.
pub const INDEX_NAME_CONF_KEY: &str = "table.indexer.indexname";

/// Configuration key for the contents of the indexer configuration.
pub const INDEX_CONFIGURATION_CONF_KEY: &str = "table.indexer.configuration";

/// Configuration key for the free-form index connection parameters.
pub const INDEX_CONNECTION_PARAMS_CONF_KEY: &str = "table.indexer.index.connectionparams";

/// Configuration key for the direct write flag.
pub const INDEX_DIRECT_WRITE_CONF_KEY: &str = "table.indexer.directwrite";

/// Configuration key for the dry run flag.
pub const DRY_RUN_CONF_KEY: &str = "table.indexer.dryrun";

/// Configuration key for the source table name.
pub const TABLE_NAME_CONF_KEY: &str = "table.indexer.table.name";

/// Configuration key for the buffered writer capacity.
pub const WRITER_BATCH_SIZE_CONF_KEY: &str = "table.indexer.writer.batchsize";

/// Prefix of keys forwarded to the row mapper as global parameters.
pub const MAPPING_PARAM_PREFIX: &str = "table.indexer.mapping.";

/// Writer capacity used when none is configured.
pub const DEFAULT_WRITER_BATCH_SIZE: usize = 100;

const CONF_KEYVALUE_SEPARATOR: char = '=';
const CONF_VALUE_SEPARATOR: char = ';';

/// String key/value configuration distributed to every unit of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobConfiguration {
    values: BTreeMap<String, String>,
}

impl JobConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn set_bool(&mut self, key: impl Into<String>, value: bool) {
        self.set(key, value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Boolean value; anything other than a case-insensitive "true" is false.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }

    /// Unsigned value, or `None` if present but not a number.
    pub fn get_usize(&self, key: &str, default: usize) -> Option<usize> {
        match self.get(key) {
            Some(v) => v.trim().parse().ok(),
            None => Some(default),
        }
    }

    /// All entries whose key starts with `prefix`, with the prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        self.values
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}

/// Add the given index connection parameters to a configuration.
pub fn configure_index_connection_params(
    conf: &mut JobConfiguration,
    connection_params: &BTreeMap<String, String>,
) {
    let value = connection_params
        .iter()
        .map(|(k, v)| format!("{}{}{}", k, CONF_KEYVALUE_SEPARATOR, v))
        .collect::<Vec<_>>()
        .join(&CONF_VALUE_SEPARATOR.to_string());

    conf.set(INDEX_CONNECTION_PARAMS_CONF_KEY, value);
}

/// Retrieve index connection parameters from a configuration.
///
/// Entries without a key/value separator are skipped.
pub fn index_connection_params(conf: &JobConfiguration) -> BTreeMap<String, String> {
    let Some(value) = conf.get(INDEX_CONNECTION_PARAMS_CONF_KEY) else {
        warn!("No connection parameters found in configuration");
        return BTreeMap::new();
    };

    value
        .split(CONF_VALUE_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (k, v) = entry.split_once(CONF_KEYVALUE_SEPARATOR)?;
            Some((k.to_string(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_params_round_trip() {
        let mut params = BTreeMap::new();
        params.insert("cluster.endpoint".to_string(), "http://localhost:9200".to_string());
        params.insert("cluster.collection".to_string(), "users".to_string());

        let mut conf = JobConfiguration::new();
        configure_index_connection_params(&mut conf, &params);

        assert_eq!(
            conf.get(INDEX_CONNECTION_PARAMS_CONF_KEY),
            Some("cluster.collection=users;cluster.endpoint=http://localhost:9200")
        );
        assert_eq!(index_connection_params(&conf), params);
    }

    #[test]
    fn test_missing_connection_params_are_empty() {
        let conf = JobConfiguration::new();
        assert!(index_connection_params(&conf).is_empty());
    }

    #[test]
    fn test_typed_getters() {
        let mut conf = JobConfiguration::new();
        conf.set_bool(INDEX_DIRECT_WRITE_CONF_KEY, true);
        conf.set(WRITER_BATCH_SIZE_CONF_KEY, "25");
        conf.set("bad.number", "lots");

        assert!(conf.get_bool(INDEX_DIRECT_WRITE_CONF_KEY, false));
        assert!(!conf.get_bool(DRY_RUN_CONF_KEY, false));
        assert_eq!(conf.get_usize(WRITER_BATCH_SIZE_CONF_KEY, 100), Some(25));
        assert_eq!(conf.get_usize("absent", 100), Some(100));
        assert_eq!(conf.get_usize("bad.number", 100), None);
    }

    #[test]
    fn test_with_prefix() {
        let mut conf = JobConfiguration::new();
        conf.set(format!("{}lowercase", MAPPING_PARAM_PREFIX), "true");
        conf.set(format!("{}locale", MAPPING_PARAM_PREFIX), "en");
        conf.set(TABLE_NAME_CONF_KEY, "users");

        let params = conf.with_prefix(MAPPING_PARAM_PREFIX);

        assert_eq!(params.len(), 2);
        assert_eq!(params.get("lowercase").map(String::as_str), Some("true"));
        assert_eq!(params.get("locale").map(String::as_str), Some("en"));
    }
}
