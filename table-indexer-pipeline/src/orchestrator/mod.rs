//! Orchestrator module for the table indexer pipeline.
//!
//! Resolves the run configuration, picks the execution strategy, submits the
//! job and performs the mode-specific finalization.

mod dry_run;
mod plan;

pub use dry_run::DryRunEvaluator;
pub use plan::{ExecutionPlan, OutputDirectory, RunOptions, ShardSettings, DEFAULT_REDUCERS};

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::errors::PipelineError;
use crate::job::{
    configure_index_connection_params, ComputeFramework, JobConfiguration, JobOutcome, JobOutput,
    JobSpec, ShardBuildParams, ShardBuilder, INDEX_CONFIGURATION_CONF_KEY, INDEX_DIRECT_WRITE_CONF_KEY,
    INDEX_NAME_CONF_KEY, MAPPING_PARAM_PREFIX, TABLE_NAME_CONF_KEY, WRITER_BATCH_SIZE_CONF_KEY,
};
use crate::mapping::IndexerConf;
use crate::sink::ClusterClientFactory;
use table_indexer_repository::{CommitOptions, ConnectionParams};
use table_indexer_shared::ExecutionMode;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Configuring,
    Submitted,
    DirectFinalizing,
    DistributedFinalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Done, _) | (Failed, _) => false,
            (_, Failed) => true,
            (Configuring, Submitted) | (Configuring, Done) => true,
            (Submitted, DirectFinalizing) | (Submitted, DistributedFinalizing) => true,
            (DirectFinalizing, Done) | (DistributedFinalizing, Done) => true,
            _ => false,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: ExecutionMode,
    pub outcome: JobOutcome,
}

/// Process exit code for the result of a run.
pub fn exit_code(result: &Result<RunSummary, PipelineError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Build the configuration distributed to every unit of the run.
pub fn build_job_configuration(options: &RunOptions) -> JobConfiguration {
    let spec = &options.specification;
    let mut conf = JobConfiguration::new();
    conf.set(INDEX_NAME_CONF_KEY, spec.indexer_name.as_str());
    conf.set(INDEX_CONFIGURATION_CONF_KEY, spec.index_config_xml.as_str());
    conf.set(TABLE_NAME_CONF_KEY, spec.table_name.as_str());
    conf.set(WRITER_BATCH_SIZE_CONF_KEY, options.batch_size.to_string());
    conf.set_bool(INDEX_DIRECT_WRITE_CONF_KEY, options.mode == ExecutionMode::Direct);
    configure_index_connection_params(&mut conf, &spec.connection_params);
    for (key, value) in &options.mapping_params {
        conf.set(format!("{}{}", MAPPING_PARAM_PREFIX, key), value.as_str());
    }
    conf
}

/// Top-level coordinator of an indexing run.
pub struct Orchestrator {
    framework: Arc<dyn ComputeFramework>,
    dry_run: DryRunEvaluator,
    client_factory: Arc<dyn ClusterClientFactory>,
    shard_builder: Arc<dyn ShardBuilder>,
    state: PipelineState,
}

impl Orchestrator {
    pub fn new(
        framework: Arc<dyn ComputeFramework>,
        dry_run: DryRunEvaluator,
        client_factory: Arc<dyn ClusterClientFactory>,
        shard_builder: Arc<dyn ShardBuilder>,
    ) -> Self {
        Self {
            framework,
            dry_run,
            client_factory,
            shard_builder,
            state: PipelineState::Configuring,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        if !self.state.can_transition_to(next) {
            warn!(from = ?self.state, to = ?next, "Unexpected pipeline state transition");
        }
        debug!(from = ?self.state, to = ?next, "Pipeline state");
        self.state = next;
    }

    /// Run the pipeline to completion.
    ///
    /// Blocks until the job finishes and finalization is done. An `Err` means
    /// the run failed; see [`exit_code`].
    #[instrument(skip(self, options), fields(
        indexer = %options.specification.indexer_name,
        table = %options.specification.table_name,
        mode = %options.mode
    ))]
    pub async fn run(&mut self, options: &RunOptions) -> Result<RunSummary, PipelineError> {
        self.state = PipelineState::Configuring;
        let result = self.execute(options).await;

        match &result {
            Ok(summary) => {
                self.transition(PipelineState::Done);
                info!(
                    mode = %summary.mode,
                    started_at = %summary.outcome.started_at.to_rfc3339(),
                    secs = summary.outcome.elapsed.as_secs_f64(),
                    counters = ?summary.outcome.counters,
                    "Succeeded with job. Goodbye."
                );
            }
            Err(e) => {
                self.transition(PipelineState::Failed);
                error!(error = %e, "Indexing run failed");
            }
        }

        result
    }

    async fn execute(&mut self, options: &RunOptions) -> Result<RunSummary, PipelineError> {
        let spec = &options.specification;
        let indexer_conf = IndexerConf::from_xml(&spec.index_config_xml)?;
        let conf = build_job_configuration(options);

        match self.framework.cluster_slots().await {
            Ok(slots) => info!(slots = slots, "Cluster reports available worker slots"),
            Err(e) => warn!(error = %e, "Could not determine cluster worker slots"),
        }

        if options.mode == ExecutionMode::DryRun {
            info!("Indexing dry run, no job will be submitted");
            let outcome = self.dry_run.evaluate(conf, &spec.table_name).await?;
            return Ok(RunSummary {
                mode: ExecutionMode::DryRun,
                outcome,
            });
        }

        let plan = ExecutionPlan::resolve(options, &indexer_conf)?;
        info!(
            mode = %plan.mode(),
            batch_size = options.batch_size,
            mapping_params = options.mapping_params.len(),
            "Resolved execution plan"
        );

        let job = JobSpec {
            name: format!("table-indexer: {} -> {}", spec.table_name, spec.indexer_name),
            table_name: spec.table_name.clone(),
            configuration: conf,
            output: JobOutput::Null,
            reducers: 0,
        };

        let outcome = match plan {
            ExecutionPlan::Direct { connection } => self.run_direct(job, &connection).await?,
            ExecutionPlan::DistributedOutput { output, shard_settings } => {
                self.run_distributed(job, &output, shard_settings, options.overwrite_output_dir)
                    .await?
            }
        };

        Ok(RunSummary {
            mode: options.mode,
            outcome,
        })
    }

    async fn submit(&mut self, job: JobSpec) -> Result<JobOutcome, PipelineError> {
        self.transition(PipelineState::Submitted);
        info!(job = %job.name, reducers = job.reducers, "Submitting job");
        self.framework.run_job(job).await
    }

    fn check_outcome(outcome: &JobOutcome) -> Result<(), PipelineError> {
        if outcome.succeeded {
            return Ok(());
        }
        Err(PipelineError::job(format!(
            "{} unit(s) failed: {}",
            outcome.failed_units.len(),
            outcome.failed_units.join(", ")
        )))
    }

    /// Submit a map-only job writing straight to the cluster, then commit.
    async fn run_direct(&mut self, job: JobSpec, connection: &ConnectionParams) -> Result<JobOutcome, PipelineError> {
        let outcome = self.submit(job).await?;
        self.transition(PipelineState::DirectFinalizing);
        Self::check_outcome(&outcome)?;

        info!(collection = %connection.collection, "Committing index");
        let client = self.client_factory.connect(connection).await?;
        let committed = client.commit(CommitOptions::default()).await;
        let closed = client.shutdown().await;
        committed?;
        closed?;
        info!(collection = %connection.collection, "Index committed");

        Ok(outcome)
    }

    /// Submit a job writing to the output directory, then run the shard build.
    async fn run_distributed(
        &mut self,
        mut job: JobSpec,
        output: &OutputDirectory,
        shard_settings: ShardSettings,
        overwrite: bool,
    ) -> Result<JobOutcome, PipelineError> {
        prepare_output_dir(&output.path, overwrite).await?;

        let reducers = shard_settings.reducers;
        let documents_dir = output.documents_dir();
        job.output = JobOutput::Directory(documents_dir.clone());
        job.reducers = reducers;

        let outcome = self.submit(job).await?;
        self.transition(PipelineState::DistributedFinalizing);
        Self::check_outcome(&outcome)?;

        let params = ShardBuildParams {
            input_dir: documents_dir,
            output_dir: output.path.clone(),
            reducers,
            shards: shard_settings.shards,
            fanout: shard_settings.fanout,
            max_segments: shard_settings.max_segments,
        };
        self.shard_builder.build(&params).await?;

        if output.generated && self.shard_builder.consumes_output() {
            info!(path = %output.path.display(), "Removing generated output directory");
            tokio::fs::remove_dir_all(&output.path)
                .await
                .map_err(|e| PipelineError::file_system(&output.path, e))?;
        } else if output.generated {
            warn!(
                path = %output.path.display(),
                "Shard builder did not consume the output, keeping generated output directory"
            );
        }

        Ok(outcome)
    }
}

/// Make sure the output directory does not exist before submission.
///
/// An existing directory is removed only when overwriting was requested.
async fn prepare_output_dir(path: &Path, overwrite: bool) -> Result<(), PipelineError> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| PipelineError::file_system(path, e))?;
    if !exists {
        return Ok(());
    }
    if !overwrite {
        return Err(PipelineError::OutputConflict(path.to_path_buf()));
    }

    info!(path = %path.display(), "Removing pre-existing output directory");
    tokio::fs::remove_dir_all(path)
        .await
        .map_err(|e| PipelineError::file_system(path, e))
}
