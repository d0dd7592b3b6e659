//! Indexing unit.
//!
//! One unit runs per table partition. Its lifecycle is `setup`, then
//! `process_row` for every scanned row, then `cleanup`. Setup reads the job
//! configuration, selects the sink and builds the writer and row processor;
//! cleanup closes the writer and republishes the unit's metrics as counters.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::errors::PipelineError;
use crate::job::{
    index_connection_params, JobConfiguration, Partition, TableScanner, TaskContext,
    DEFAULT_WRITER_BATCH_SIZE, DRY_RUN_CONF_KEY, INDEX_CONFIGURATION_CONF_KEY,
    INDEX_DIRECT_WRITE_CONF_KEY, INDEX_NAME_CONF_KEY, MAPPING_PARAM_PREFIX, TABLE_NAME_CONF_KEY,
    WRITER_BATCH_SIZE_CONF_KEY,
};
use crate::mapping::{FieldMapper, IndexerConf, RowReadMode};
use crate::metrics::{MetricsBridge, MetricsRegistries};
use crate::processor::RowProcessor;
use crate::sink::{
    ClusterClientFactory, DirectWriteSink, DistributedOutputSink, DocumentSink, DryRunOutput,
    DryRunSink, OpenSearchClientFactory,
};
use crate::writer::BufferedDocumentWriter;
use table_indexer_repository::config::ID_FIELD_PARAM;
use table_indexer_repository::ConnectionParams;
use table_indexer_shared::{ExecutionMode, Row};

/// Process-level collaborators shared by every unit.
#[derive(Clone)]
pub struct UnitEnvironment {
    pub client_factory: Arc<dyn ClusterClientFactory>,
    pub dry_run_output: DryRunOutput,
}

impl UnitEnvironment {
    pub fn new(client_factory: Arc<dyn ClusterClientFactory>, dry_run_output: DryRunOutput) -> Self {
        Self {
            client_factory,
            dry_run_output,
        }
    }
}

impl Default for UnitEnvironment {
    fn default() -> Self {
        Self::new(Arc::new(OpenSearchClientFactory), DryRunOutput::stdout())
    }
}

/// Sink chosen for a unit from the job configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkSelection {
    Direct(ConnectionParams),
    DistributedOutput,
    DryRun,
}

impl SinkSelection {
    /// Resolve the sink from the dry run and direct write flags.
    ///
    /// Direct write fails when the endpoint or the collection is missing.
    pub fn resolve(conf: &JobConfiguration, indexer_conf: &IndexerConf) -> Result<Self, PipelineError> {
        if conf.get_bool(DRY_RUN_CONF_KEY, false) {
            return Ok(Self::DryRun);
        }
        if !conf.get_bool(INDEX_DIRECT_WRITE_CONF_KEY, false) {
            return Ok(Self::DistributedOutput);
        }

        let mut params = index_connection_params(conf);
        params
            .entry(ID_FIELD_PARAM.to_string())
            .or_insert_with(|| indexer_conf.unique_key_field.clone());
        let connection = ConnectionParams::from_map(&params).map_err(|e| PipelineError::setup(e.to_string()))?;
        Ok(Self::Direct(connection))
    }

    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Direct(_) => ExecutionMode::Direct,
            Self::DistributedOutput => ExecutionMode::DistributedOutput,
            Self::DryRun => ExecutionMode::DryRun,
        }
    }

    /// Writer capacity for this sink. The output stage buffers on its own,
    /// so distributed output hands over every document as it arrives.
    fn writer_capacity(&self, conf: &JobConfiguration) -> Result<usize, PipelineError> {
        if *self == Self::DistributedOutput {
            return Ok(1);
        }
        match conf.get_usize(WRITER_BATCH_SIZE_CONF_KEY, DEFAULT_WRITER_BATCH_SIZE) {
            Some(capacity) if capacity > 0 => Ok(capacity),
            _ => Err(PipelineError::setup(format!(
                "Invalid value for {}: expected a positive integer",
                WRITER_BATCH_SIZE_CONF_KEY
            ))),
        }
    }
}

fn required<'a>(conf: &'a JobConfiguration, key: &str) -> Result<&'a str, PipelineError> {
    match conf.get(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PipelineError::setup(format!("No configuration value supplied for {}", key))),
    }
}

/// Resolved configuration of one unit.
struct UnitSettings {
    indexer_name: String,
    table_name: String,
    indexer_conf: IndexerConf,
    selection: SinkSelection,
    capacity: usize,
}

impl UnitSettings {
    fn resolve(conf: &JobConfiguration) -> Result<Self, PipelineError> {
        let indexer_name = required(conf, INDEX_NAME_CONF_KEY)?.to_string();
        let xml = required(conf, INDEX_CONFIGURATION_CONF_KEY)?;
        let table_name = required(conf, TABLE_NAME_CONF_KEY)?.to_string();

        let mut indexer_conf = IndexerConf::from_xml(xml)?;
        if indexer_conf.row_read_mode != RowReadMode::Never {
            warn!(
                from = %indexer_conf.row_read_mode,
                to = %RowReadMode::Never,
                "Changing row read mode for batch indexing"
            );
            indexer_conf.row_read_mode = RowReadMode::Never;
        }
        indexer_conf.merge_params(conf.with_prefix(MAPPING_PARAM_PREFIX));

        if let Some(conf_table) = indexer_conf.table.as_deref() {
            if conf_table != table_name {
                warn!(configured = conf_table, scanned = %table_name, "Indexer configuration names another table");
            }
        }

        let selection = SinkSelection::resolve(conf, &indexer_conf)?;
        let capacity = selection.writer_capacity(conf)?;

        Ok(Self {
            indexer_name,
            table_name,
            indexer_conf,
            selection,
            capacity,
        })
    }
}

/// A configured unit, ready to process rows.
pub struct IndexingUnit {
    processor: RowProcessor,
    context: TaskContext,
    registries: MetricsRegistries,
    mode: ExecutionMode,
}

impl IndexingUnit {
    /// Configure the unit and acquire its sink.
    ///
    /// Fails before any row is processed when the index name, the indexer
    /// configuration or the table name is missing, or when direct write is
    /// requested without complete connection parameters.
    #[instrument(skip_all, fields(task = %context.task_id()))]
    pub async fn setup(
        context: TaskContext,
        environment: &UnitEnvironment,
        registries: MetricsRegistries,
    ) -> Result<Self, PipelineError> {
        let settings = UnitSettings::resolve(context.configuration())?;

        let sink: Box<dyn DocumentSink> = match &settings.selection {
            SinkSelection::Direct(params) => {
                Box::new(DirectWriteSink::connect(environment.client_factory.as_ref(), params).await?)
            }
            SinkSelection::DistributedOutput => Box::new(DistributedOutputSink::new(context.output().clone())),
            SinkSelection::DryRun => Box::new(DryRunSink::new(environment.dry_run_output.clone())),
        };

        let writer = BufferedDocumentWriter::new(
            sink,
            settings.capacity,
            context.counters().clone(),
            registries.current.clone(),
        )?;
        let mapper = Arc::new(FieldMapper::new(
            settings.indexer_name.as_str(),
            &settings.indexer_conf,
            registries.legacy.clone(),
        ));
        let processor = RowProcessor::new(mapper, writer, context.clone(), registries.current.clone());
        let mode = settings.selection.mode();

        info!(
            indexer = %settings.indexer_name,
            table = %settings.table_name,
            mode = %mode,
            batch_size = settings.capacity,
            "Indexing unit ready"
        );

        Ok(Self {
            processor,
            context,
            registries,
            mode,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub async fn process_row(&mut self, row: Row) -> Result<(), PipelineError> {
        self.processor.process(row).await
    }

    /// Close the writer and publish the unit's metrics.
    ///
    /// Metrics are published whether or not the close succeeds.
    #[instrument(skip_all, fields(task = %self.context.task_id()))]
    pub async fn cleanup(self) -> Result<(), PipelineError> {
        let closed = self.processor.into_writer().close().await;
        MetricsBridge::new(self.registries).publish(self.context.counters());
        debug!(ok = closed.is_ok(), "Indexing unit cleaned up");
        closed
    }

    /// Run a full unit over one partition: setup, every row, cleanup.
    ///
    /// Cleanup runs whether processing succeeded or not; the first error wins.
    /// Returns the number of rows processed.
    pub async fn run(
        scanner: &dyn TableScanner,
        partition: &Partition,
        context: TaskContext,
        environment: &UnitEnvironment,
    ) -> Result<u64, PipelineError> {
        let mut unit = Self::setup(context, environment, MetricsRegistries::new()).await?;
        let processed = unit.process_partition(scanner, partition).await;
        let cleaned = unit.cleanup().await;

        let rows = processed?;
        cleaned?;
        Ok(rows)
    }

    async fn process_partition(&mut self, scanner: &dyn TableScanner, partition: &Partition) -> Result<u64, PipelineError> {
        let mut rows = scanner.scan(partition).await?;
        let mut count = 0u64;
        while let Some(row) = rows.next().await {
            self.process_row(row?).await?;
            count += 1;
        }
        debug!(partition = %partition.id, rows = count, "Partition processed");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{configure_index_connection_params, Counters, IndexerCounter, OutputCollector, RowStream};
    use crate::metrics::METRICS_COUNTER_GROUP;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use table_indexer_repository::{BulkSummary, CommitOptions, IndexClusterClient, SearchIndexError};
    use table_indexer_shared::Document;
    use tokio::sync::mpsc;

    const CONF: &str = r#"<indexer table="users"><field name="name_s" value="info:name"/></indexer>"#;

    #[derive(Default)]
    struct MockClient {
        batches: AtomicUsize,
        shutdowns: AtomicUsize,
        /// Fail every batch from this (1-based) batch on.
        fail_from_batch: Option<usize>,
    }

    #[async_trait]
    impl IndexClusterClient for MockClient {
        async fn add_documents(&self, documents: &[Document]) -> Result<BulkSummary, SearchIndexError> {
            let batch = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_from_batch.is_some_and(|from| batch >= from) {
                return Err(SearchIndexError::bulk_operation("cluster unavailable"));
            }
            Ok(BulkSummary::all_succeeded(documents.iter().map(|d| d.id.clone())))
        }

        async fn commit(&self, _options: CommitOptions) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn health_check(&self) -> Result<bool, SearchIndexError> {
            Ok(true)
        }

        async fn shutdown(&self) -> Result<(), SearchIndexError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockFactory {
        client: Arc<MockClient>,
        connects: AtomicUsize,
    }

    #[async_trait]
    impl ClusterClientFactory for MockFactory {
        async fn connect(&self, _params: &ConnectionParams) -> Result<Arc<dyn IndexClusterClient>, SearchIndexError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(self.client.clone())
        }
    }

    struct VecScanner {
        rows: Vec<Row>,
    }

    #[async_trait]
    impl TableScanner for VecScanner {
        async fn partitions(&self, table: &str) -> Result<Vec<Partition>, PipelineError> {
            Ok(vec![Partition {
                table: table.to_string(),
                id: "part-0".to_string(),
            }])
        }

        async fn scan(&self, _partition: &Partition) -> Result<RowStream, PipelineError> {
            Ok(futures::stream::iter(self.rows.clone().into_iter().map(Ok)).boxed())
        }
    }

    fn environment() -> (UnitEnvironment, Arc<MockFactory>) {
        environment_with(MockClient::default())
    }

    fn environment_with(client: MockClient) -> (UnitEnvironment, Arc<MockFactory>) {
        let factory = Arc::new(MockFactory {
            client: Arc::new(client),
            connects: AtomicUsize::new(0),
        });
        let env = UnitEnvironment::new(factory.clone(), DryRunOutput::new(std::io::sink()));
        (env, factory)
    }

    fn base_conf() -> JobConfiguration {
        let mut conf = JobConfiguration::new();
        conf.set(INDEX_NAME_CONF_KEY, "users");
        conf.set(INDEX_CONFIGURATION_CONF_KEY, CONF);
        conf.set(TABLE_NAME_CONF_KEY, "users");
        conf
    }

    fn direct_conf(params: &[(&str, &str)]) -> JobConfiguration {
        let mut conf = base_conf();
        conf.set_bool(INDEX_DIRECT_WRITE_CONF_KEY, true);
        let params: BTreeMap<String, String> =
            params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        configure_index_connection_params(&mut conf, &params);
        conf
    }

    fn context(conf: JobConfiguration, output: OutputCollector) -> TaskContext {
        TaskContext::new("unit_00000_0", Arc::new(conf), Counters::new(), output)
    }

    #[tokio::test]
    async fn test_missing_required_keys_fail_setup() {
        let (env, _) = environment();
        for key in [INDEX_NAME_CONF_KEY, INDEX_CONFIGURATION_CONF_KEY, TABLE_NAME_CONF_KEY] {
            let mut conf = JobConfiguration::new();
            for (k, v) in base_conf().iter() {
                if k != key {
                    conf.set(k.clone(), v.clone());
                }
            }
            let result = IndexingUnit::setup(context(conf, OutputCollector::Discard), &env, MetricsRegistries::new()).await;
            match result {
                Err(PipelineError::SetupError(msg)) => assert!(msg.contains(key), "{}", msg),
                Err(e) => panic!("unexpected error {}", e),
                Ok(_) => panic!("setup succeeded without {}", key),
            }
        }
    }

    #[tokio::test]
    async fn test_direct_without_collection_fails_before_connecting() {
        let (env, factory) = environment();
        let conf = direct_conf(&[("cluster.endpoint", "http://localhost:9200")]);

        let result = IndexingUnit::setup(context(conf, OutputCollector::Discard), &env, MetricsRegistries::new()).await;

        assert!(matches!(result, Err(PipelineError::SetupError(_))));
        assert_eq!(factory.connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_direct_without_endpoint_fails() {
        let conf = direct_conf(&[("cluster.collection", "users")]);
        let err = SinkSelection::resolve(&conf, &IndexerConf::from_xml(CONF).unwrap()).unwrap_err();
        assert!(matches!(err, PipelineError::SetupError(_)));
    }

    #[tokio::test]
    async fn test_direct_unit_lifecycle() {
        let (env, factory) = environment();
        let mut conf = direct_conf(&[
            ("cluster.endpoint", "http://localhost:9200"),
            ("cluster.collection", "users"),
        ]);
        conf.set(WRITER_BATCH_SIZE_CONF_KEY, "2");
        let ctx = context(conf, OutputCollector::Discard);
        let counters = ctx.counters().clone();

        let mut unit = IndexingUnit::setup(ctx, &env, MetricsRegistries::new()).await.unwrap();
        assert_eq!(unit.mode(), ExecutionMode::Direct);
        for key in ["a", "b", "c"] {
            unit.process_row(Row::new(key).with_column("info:name", key)).await.unwrap();
        }
        unit.cleanup().await.unwrap();

        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
        assert_eq!(factory.client.batches.load(Ordering::SeqCst), 2);
        assert_eq!(factory.client.shutdowns.load(Ordering::SeqCst), 1);
        assert_eq!(counters.get(IndexerCounter::InputRows), 3);
        assert_eq!(counters.get(IndexerCounter::OutputIndexDocumentBatches), 2);
        assert_eq!(counters.get_named(METRICS_COUNTER_GROUP, "users: Documents mapped"), 3);
    }

    #[tokio::test]
    async fn test_metrics_published_when_unit_fails_mid_partition() {
        let (env, factory) = environment_with(MockClient {
            fail_from_batch: Some(2),
            ..MockClient::default()
        });
        let mut conf = direct_conf(&[
            ("cluster.endpoint", "http://localhost:9200"),
            ("cluster.collection", "users"),
        ]);
        conf.set(WRITER_BATCH_SIZE_CONF_KEY, "1");
        let ctx = context(conf, OutputCollector::Discard);
        let counters = ctx.counters().clone();
        let scanner = VecScanner {
            rows: ["a", "b", "c"]
                .into_iter()
                .map(|key| Row::new(key).with_column("info:name", key))
                .collect(),
        };
        let partition = Partition {
            table: "users".to_string(),
            id: "part-0".to_string(),
        };

        let err = IndexingUnit::run(&scanner, &partition, ctx, &env).await.unwrap_err();

        assert!(matches!(err, PipelineError::TransmissionError(_)));
        assert_eq!(counters.get(IndexerCounter::InputRows), 2);
        assert_eq!(counters.get(IndexerCounter::OutputIndexDocumentBatches), 1);
        assert_eq!(counters.get_named(METRICS_COUNTER_GROUP, "users: Documents mapped"), 2);
        assert_eq!(counters.get_named(METRICS_COUNTER_GROUP, "processor.documents-per-row"), 1);
        assert_eq!(factory.client.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distributed_output_emits_per_document() {
        let (env, _) = environment();
        let (tx, mut rx) = mpsc::channel(16);
        let mut conf = base_conf();
        conf.set(WRITER_BATCH_SIZE_CONF_KEY, "50");
        let ctx = context(conf, OutputCollector::Channel(tx));
        let counters = ctx.counters().clone();

        let mut unit = IndexingUnit::setup(ctx, &env, MetricsRegistries::new()).await.unwrap();
        assert_eq!(unit.mode(), ExecutionMode::DistributedOutput);
        unit.process_row(Row::new("a").with_column("info:name", "A")).await.unwrap();
        unit.process_row(Row::new("b").with_column("info:name", "B")).await.unwrap();
        unit.cleanup().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().key, "a");
        assert_eq!(rx.recv().await.unwrap().key, "b");
        assert!(rx.recv().await.is_none());
        assert_eq!(counters.get(IndexerCounter::OutputIndexDocumentBatches), 2);
    }

    #[test]
    fn test_dry_run_flag_wins_over_direct() {
        let mut conf = direct_conf(&[]);
        conf.set_bool(DRY_RUN_CONF_KEY, true);

        let selection = SinkSelection::resolve(&conf, &IndexerConf::from_xml(CONF).unwrap()).unwrap();

        assert_eq!(selection, SinkSelection::DryRun);
    }

    #[test]
    fn test_unique_key_field_becomes_id_field() {
        let conf = direct_conf(&[
            ("cluster.endpoint", "http://localhost:9200"),
            ("cluster.collection", "users"),
        ]);
        let indexer_conf =
            IndexerConf::from_xml(r#"<indexer table="users" unique-key-field="user_id"/>"#).unwrap();

        match SinkSelection::resolve(&conf, &indexer_conf).unwrap() {
            SinkSelection::Direct(params) => assert_eq!(params.id_field, "user_id"),
            other => panic!("unexpected selection {:?}", other),
        }
    }

    #[test]
    fn test_invalid_batch_size_fails_setup() {
        let mut conf = base_conf();
        conf.set_bool(DRY_RUN_CONF_KEY, true);
        conf.set(WRITER_BATCH_SIZE_CONF_KEY, "0");
        let err = UnitSettings::resolve(&conf).err().unwrap();
        assert!(matches!(err, PipelineError::SetupError(_)));
    }
}
