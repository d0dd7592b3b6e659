//! Dependency initialization and wiring for the table indexer.

use std::sync::Arc;
use tracing::{info, warn};

use crate::{IndexingError, IndexingOptions};
use table_indexer_pipeline::{
    job::{
        CommandShardBuilder, JsonLinesTableScanner, LocalComputeFramework, LocalFrameworkConfig,
        NoopShardBuilder, ShardBuilder, TableScanner,
    },
    orchestrator::{DryRunEvaluator, Orchestrator, RunOptions},
    sink::{ClusterClientFactory, DryRunOutput, OpenSearchClientFactory},
    unit::UnitEnvironment,
};
use table_indexer_repository::ConnectionParams;
use table_indexer_shared::ExecutionMode;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from the command line options.
    ///
    /// In direct mode the index cluster is health checked up front. An
    /// unhealthy cluster is logged, not fatal.
    pub async fn new(options: &IndexingOptions, run_options: &RunOptions) -> Result<Self, IndexingError> {
        info!(
            source_dir = %options.source_dir.display(),
            slots = ?options.slots,
            max_attempts = options.max_attempts,
            "Initializing dependencies"
        );

        let client_factory: Arc<dyn ClusterClientFactory> = Arc::new(OpenSearchClientFactory);

        if run_options.mode == ExecutionMode::Direct {
            verify_cluster(client_factory.as_ref(), run_options).await;
        }

        let scanner: Arc<dyn TableScanner> = Arc::new(JsonLinesTableScanner::new(&options.source_dir));
        let environment = Arc::new(UnitEnvironment::new(client_factory.clone(), DryRunOutput::stdout()));

        let mut framework_config = LocalFrameworkConfig {
            max_attempts: options.max_attempts,
            ..LocalFrameworkConfig::default()
        };
        if let Some(slots) = options.slots {
            if slots == 0 {
                return Err(IndexingError::config("--slots must be a positive integer"));
            }
            framework_config.slots = slots;
        }
        let framework = Arc::new(LocalComputeFramework::with_config(
            scanner.clone(),
            environment.clone(),
            framework_config,
        ));

        let shard_builder: Arc<dyn ShardBuilder> = match &options.shard_builder {
            Some(program) => {
                info!(program = %program.display(), "Using external shard builder");
                Arc::new(CommandShardBuilder::new(program.clone()).with_args(options.shard_builder_args.iter().cloned()))
            }
            None => {
                if run_options.mode == ExecutionMode::DistributedOutput {
                    warn!("No --shard-builder given; emitted documents stay in the output directory");
                }
                Arc::new(NoopShardBuilder)
            }
        };

        let dry_run = DryRunEvaluator::new(scanner, environment);
        let orchestrator = Orchestrator::new(framework, dry_run, client_factory, shard_builder);

        Ok(Self { orchestrator })
    }
}

async fn verify_cluster(factory: &dyn ClusterClientFactory, run_options: &RunOptions) {
    let Ok(params) = ConnectionParams::from_map(&run_options.specification.connection_params) else {
        return;
    };

    let client = match factory.connect(&params).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to create index cluster client");
            return;
        }
    };

    match client.health_check().await {
        Ok(true) => info!(endpoint = %params.endpoint, "Index cluster connection verified"),
        Ok(false) => warn!(endpoint = %params.endpoint, "Index cluster is unhealthy"),
        Err(e) => warn!(endpoint = %params.endpoint, error = %e, "Index cluster health check failed"),
    }

    if let Err(e) = client.shutdown().await {
        warn!(error = %e, "Failed to close health check client");
    }
}
