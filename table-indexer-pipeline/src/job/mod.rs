//! Job-side abstractions: the configuration store, counters, the per-unit task
//! context, the compute framework seam and its local implementation, table
//! scanning and the external shard build stage.

mod configuration;
mod context;
mod counters;
mod framework;
mod local;
mod scanner;
mod shard_builder;

pub use configuration::{
    configure_index_connection_params, index_connection_params, JobConfiguration,
    DEFAULT_WRITER_BATCH_SIZE, DRY_RUN_CONF_KEY, INDEX_CONFIGURATION_CONF_KEY,
    INDEX_CONNECTION_PARAMS_CONF_KEY, INDEX_DIRECT_WRITE_CONF_KEY, INDEX_NAME_CONF_KEY,
    MAPPING_PARAM_PREFIX, TABLE_NAME_CONF_KEY, WRITER_BATCH_SIZE_CONF_KEY,
};
pub use context::{OutputCollector, OutputRecord, TaskContext};
pub use counters::{CounterKey, CounterSnapshot, Counters, IndexerCounter, INDEXER_COUNTER_GROUP};
pub use framework::{ComputeFramework, JobOutcome, JobOutput, JobSpec};
pub use local::{LocalComputeFramework, LocalFrameworkConfig};
pub use scanner::{JsonLinesTableScanner, Partition, RowStream, TableScanner};
pub use shard_builder::{CommandShardBuilder, NoopShardBuilder, ShardBuildParams, ShardBuilder};
