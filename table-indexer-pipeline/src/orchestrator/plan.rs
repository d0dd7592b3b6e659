//! Run options and the execution plan resolved from them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use uuid::Uuid;

use crate::errors::PipelineError;
use crate::job::DEFAULT_WRITER_BATCH_SIZE;
use crate::mapping::IndexerConf;
use table_indexer_repository::config::ID_FIELD_PARAM;
use table_indexer_repository::ConnectionParams;
use table_indexer_shared::{ExecutionMode, IndexingSpecification};

const GENERATED_OUTPUT_PREFIX: &str = "table-indexer-";

/// Reducer count used when none is configured.
pub const DEFAULT_REDUCERS: usize = 1;

/// Settings of the external shard build/merge stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSettings {
    /// Reduce-style units building shards.
    pub reducers: usize,
    pub shards: usize,
    pub fanout: usize,
    pub max_segments: usize,
}

impl Default for ShardSettings {
    fn default() -> Self {
        Self {
            reducers: DEFAULT_REDUCERS,
            shards: 1,
            fanout: i32::MAX as usize,
            max_segments: 1,
        }
    }
}

/// Everything the caller decides about one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub specification: IndexingSpecification,
    pub mode: ExecutionMode,
    /// Writer capacity for direct write and dry run.
    pub batch_size: usize,
    /// Global parameters forwarded to the row mapper.
    pub mapping_params: BTreeMap<String, String>,
    /// Output directory for distributed output. Generated when absent.
    pub output_dir: Option<PathBuf>,
    pub overwrite_output_dir: bool,
    pub shard_settings: ShardSettings,
}

impl RunOptions {
    pub fn new(specification: IndexingSpecification, mode: ExecutionMode) -> Self {
        Self {
            specification,
            mode,
            batch_size: DEFAULT_WRITER_BATCH_SIZE,
            mapping_params: BTreeMap::new(),
            output_dir: None,
            overwrite_output_dir: false,
            shard_settings: ShardSettings::default(),
        }
    }
}

/// Output location of a distributed-output run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDirectory {
    pub path: PathBuf,
    /// Whether the directory was generated rather than supplied by the user.
    pub generated: bool,
}

impl OutputDirectory {
    fn resolve(supplied: Option<&PathBuf>) -> Self {
        match supplied {
            Some(path) => Self {
                path: path.clone(),
                generated: false,
            },
            None => Self {
                path: std::env::temp_dir().join(format!("{}{}", GENERATED_OUTPUT_PREFIX, Uuid::new_v4())),
                generated: true,
            },
        }
    }

    /// Directory the job's output stage writes documents into.
    pub fn documents_dir(&self) -> PathBuf {
        self.path.join("documents")
    }
}

/// Strategy of a run that submits a job. Chosen once, during configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPlan {
    /// Units write to the cluster; the run ends with a commit.
    Direct { connection: ConnectionParams },
    /// Units write to the output stage; the run ends with the shard build.
    DistributedOutput {
        output: OutputDirectory,
        shard_settings: ShardSettings,
    },
}

impl ExecutionPlan {
    pub fn resolve(options: &RunOptions, indexer_conf: &IndexerConf) -> Result<Self, PipelineError> {
        match options.mode {
            ExecutionMode::Direct => {
                let mut params = options.specification.connection_params.clone();
                params
                    .entry(ID_FIELD_PARAM.to_string())
                    .or_insert_with(|| indexer_conf.unique_key_field.clone());
                let connection =
                    ConnectionParams::from_map(&params).map_err(|e| PipelineError::setup(e.to_string()))?;
                Ok(Self::Direct { connection })
            }
            ExecutionMode::DistributedOutput => Ok(Self::DistributedOutput {
                output: OutputDirectory::resolve(options.output_dir.as_ref()),
                shard_settings: options.shard_settings,
            }),
            ExecutionMode::DryRun => Err(PipelineError::configuration(
                "a dry run is evaluated in-process and has no execution plan",
            )),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Direct { .. } => ExecutionMode::Direct,
            Self::DistributedOutput { .. } => ExecutionMode::DistributedOutput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf() -> IndexerConf {
        IndexerConf::from_xml(r#"<indexer table="users" unique-key-field="uid"/>"#).unwrap()
    }

    fn spec() -> IndexingSpecification {
        IndexingSpecification::new("users", "users", "<indexer/>")
    }

    #[test]
    fn test_direct_plan_requires_collection() {
        let options = RunOptions::new(
            spec().with_connection_param("cluster.endpoint", "http://localhost:9200"),
            ExecutionMode::Direct,
        );

        let err = ExecutionPlan::resolve(&options, &conf()).unwrap_err();

        assert!(matches!(err, PipelineError::SetupError(_)));
        assert!(err.to_string().contains("cluster.collection"));
    }

    #[test]
    fn test_direct_plan() {
        let options = RunOptions::new(
            spec()
                .with_connection_param("cluster.endpoint", "http://localhost:9200")
                .with_connection_param("cluster.collection", "users"),
            ExecutionMode::Direct,
        );

        match ExecutionPlan::resolve(&options, &conf()).unwrap() {
            ExecutionPlan::Direct { connection } => {
                assert_eq!(connection.collection, "users");
                assert_eq!(connection.id_field, "uid");
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_generated_output_directory() {
        let options = RunOptions::new(spec(), ExecutionMode::DistributedOutput);

        let ExecutionPlan::DistributedOutput { output, .. } = ExecutionPlan::resolve(&options, &conf()).unwrap() else {
            panic!("expected distributed output plan");
        };

        assert!(output.generated);
        assert!(output.path.starts_with(std::env::temp_dir()));
        let name = output.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("table-indexer-"));
    }

    #[test]
    fn test_supplied_output_directory() {
        let mut options = RunOptions::new(spec(), ExecutionMode::DistributedOutput);
        options.output_dir = Some(PathBuf::from("/data/out"));

        let plan = ExecutionPlan::resolve(&options, &conf()).unwrap();

        assert_eq!(plan.mode(), ExecutionMode::DistributedOutput);
        let ExecutionPlan::DistributedOutput { output, .. } = plan else {
            panic!("expected distributed output plan");
        };
        assert!(!output.generated);
        assert_eq!(output.documents_dir(), PathBuf::from("/data/out/documents"));
    }
}
