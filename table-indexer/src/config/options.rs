//! Command line options.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

use crate::IndexingError;
use table_indexer_pipeline::job::DEFAULT_WRITER_BATCH_SIZE;
use table_indexer_pipeline::mapping::IndexerConf;
use table_indexer_pipeline::orchestrator::{RunOptions, ShardSettings, DEFAULT_REDUCERS};
use table_indexer_repository::config::{COLLECTION_PARAM, ENDPOINT_PARAM};
use table_indexer_shared::{ExecutionMode, IndexingSpecification};

/// Index the rows of a table into a search cluster.
#[derive(Parser, Debug, Clone)]
#[command(name = "table-indexer")]
#[command(about = "Batch indexer turning table rows into search documents", long_about = None)]
pub struct IndexingOptions {
    /// Name of the indexer
    #[arg(long)]
    pub indexer_name: String,

    /// XML indexer configuration file
    #[arg(long)]
    pub indexer_config: PathBuf,

    /// Table to index (defaults to the table named in the indexer configuration)
    #[arg(long)]
    pub table: Option<String>,

    /// Root directory holding one directory of *.jsonl partitions per table
    #[arg(long, env = "TABLE_INDEXER_SOURCE_DIR", default_value = ".")]
    pub source_dir: PathBuf,

    /// Index connection parameter, repeatable
    #[arg(long = "connection-param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub connection_params: Vec<(String, String)>,

    /// Coordination endpoint of the index cluster
    #[arg(long, env = "TABLE_INDEXER_ENDPOINT")]
    pub cluster_endpoint: Option<String>,

    /// Collection the documents are written to
    #[arg(long, env = "TABLE_INDEXER_COLLECTION")]
    pub collection: Option<String>,

    /// Global mapping parameter, repeatable
    #[arg(long = "mapping-param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub mapping_params: Vec<(String, String)>,

    /// Write documents straight to the live cluster
    #[arg(long)]
    pub direct_write: bool,

    /// Map rows and print the documents without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Output directory for distributed output (generated when omitted)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Remove a pre-existing output directory
    #[arg(long)]
    pub overwrite_output_dir: bool,

    /// Reduce-style units building shards
    #[arg(long, default_value_t = DEFAULT_REDUCERS, value_parser = parse_positive)]
    pub reducers: usize,

    /// Number of output shards
    #[arg(long, default_value_t = 1)]
    pub shards: usize,

    /// Maximum number of shards merged in one step
    #[arg(long, default_value_t = i32::MAX as usize)]
    pub fanout: usize,

    /// Maximum number of segments per output shard
    #[arg(long, default_value_t = 1)]
    pub max_segments: usize,

    /// Documents per batch sent to the cluster
    #[arg(long, default_value_t = DEFAULT_WRITER_BATCH_SIZE, value_parser = parse_positive)]
    pub batch_size: usize,

    /// Units running at the same time (defaults to the number of CPUs)
    #[arg(long)]
    pub slots: Option<usize>,

    /// Attempts per unit before the job fails
    #[arg(long, default_value_t = 1)]
    pub max_attempts: usize,

    /// External shard build/merge program
    #[arg(long)]
    pub shard_builder: Option<PathBuf>,

    /// Extra argument for the shard build/merge program, repeatable
    #[arg(long = "shard-builder-arg")]
    pub shard_builder_args: Vec<String>,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,

    /// Log as JSON
    #[arg(long)]
    pub log_json: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    if key.trim().is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn parse_positive(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("must be a positive integer".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl IndexingOptions {
    /// Execution mode requested on the command line. Dry run wins.
    pub fn mode(&self) -> ExecutionMode {
        if self.dry_run {
            ExecutionMode::DryRun
        } else if self.direct_write {
            ExecutionMode::Direct
        } else {
            ExecutionMode::DistributedOutput
        }
    }

    /// Read the indexer configuration and resolve the run specification.
    pub fn specification(&self) -> Result<IndexingSpecification, IndexingError> {
        let xml = std::fs::read_to_string(&self.indexer_config).map_err(|e| {
            IndexingError::config(format!(
                "cannot read indexer configuration {}: {}",
                self.indexer_config.display(),
                e
            ))
        })?;

        let table = match &self.table {
            Some(table) => table.clone(),
            None => IndexerConf::from_xml(&xml)?.table.ok_or_else(|| {
                IndexingError::config("No table name given; use --table or set the table attribute of the indexer")
            })?,
        };

        let mut specification = IndexingSpecification::new(self.indexer_name.as_str(), table, xml);
        specification.connection_params = self.connection_params();
        Ok(specification)
    }

    /// Connection parameters; the dedicated options override `--connection-param`.
    pub fn connection_params(&self) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = self.connection_params.iter().cloned().collect();
        if let Some(endpoint) = &self.cluster_endpoint {
            params.insert(ENDPOINT_PARAM.to_string(), endpoint.clone());
        }
        if let Some(collection) = &self.collection {
            params.insert(COLLECTION_PARAM.to_string(), collection.clone());
        }
        params
    }

    pub fn run_options(&self) -> Result<RunOptions, IndexingError> {
        let mut options = RunOptions::new(self.specification()?, self.mode());
        options.batch_size = self.batch_size;
        options.mapping_params = self.mapping_params.iter().cloned().collect();
        options.output_dir = self.output_dir.clone();
        options.overwrite_output_dir = self.overwrite_output_dir;
        options.shard_settings = ShardSettings {
            reducers: self.reducers,
            shards: self.shards,
            fanout: self.fanout,
            max_segments: self.max_segments,
        };
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> IndexingOptions {
        let mut argv = vec!["table-indexer", "--indexer-name", "users", "--indexer-config", "users.xml"];
        argv.extend_from_slice(args);
        IndexingOptions::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(parse(&[]).mode(), ExecutionMode::DistributedOutput);
        assert_eq!(parse(&["--direct-write"]).mode(), ExecutionMode::Direct);
        assert_eq!(parse(&["--direct-write", "--dry-run"]).mode(), ExecutionMode::DryRun);
    }

    #[test]
    fn test_defaults() {
        let options = parse(&[]);
        assert_eq!(options.batch_size, 100);
        assert_eq!(options.shards, 1);
        assert_eq!(options.max_segments, 1);
        assert_eq!(options.max_attempts, 1);
        assert_eq!(options.reducers, 1);
    }

    #[test]
    fn test_batch_size_must_be_positive() {
        let result = IndexingOptions::try_parse_from([
            "table-indexer",
            "--indexer-name",
            "users",
            "--indexer-config",
            "users.xml",
            "--batch-size",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_connection_params_override() {
        let options = parse(&[
            "--connection-param",
            "cluster.collection=old",
            "--connection-param",
            "cluster.idfield=uid",
            "--collection",
            "users",
            "--cluster-endpoint",
            "http://localhost:9200",
        ]);

        let params = options.connection_params();

        assert_eq!(params["cluster.collection"], "users");
        assert_eq!(params["cluster.endpoint"], "http://localhost:9200");
        assert_eq!(params["cluster.idfield"], "uid");
    }

    #[test]
    fn test_invalid_key_value() {
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=x").is_err());
        assert_eq!(parse_key_val("a=b=c").unwrap(), ("a".to_string(), "b=c".to_string()));
    }

    #[test]
    fn test_table_from_indexer_configuration() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"<indexer table="accounts"><field name="n" value="info:n"/></indexer>"#).unwrap();
        let path = file.path().to_string_lossy().to_string();

        let options = IndexingOptions::try_parse_from([
            "table-indexer",
            "--indexer-name",
            "accounts-index",
            "--indexer-config",
            path.as_str(),
            "--mapping-param",
            "lowercase=true",
            "--reducers",
            "4",
        ])
        .unwrap();
        let run_options = options.run_options().unwrap();

        assert_eq!(run_options.specification.table_name, "accounts");
        assert_eq!(run_options.specification.indexer_name, "accounts-index");
        assert_eq!(run_options.mapping_params["lowercase"], "true");
        assert_eq!(run_options.shard_settings.reducers, 4);
    }

    #[test]
    fn test_missing_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<indexer/>").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let options = IndexingOptions::try_parse_from([
            "table-indexer",
            "--indexer-name",
            "users",
            "--indexer-config",
            path.as_str(),
        ])
        .unwrap();

        assert!(matches!(options.specification(), Err(IndexingError::ConfigError(_))));
    }
}
