//! In-process dry run.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use crate::errors::PipelineError;
use crate::job::{
    Counters, JobConfiguration, JobOutcome, OutputCollector, TableScanner, TaskContext, DRY_RUN_CONF_KEY,
};
use crate::unit::{IndexingUnit, UnitEnvironment};

/// Scans a table in-process, one partition after the other, with every unit
/// wired to the dry-run sink. Nothing is written and no job is submitted.
pub struct DryRunEvaluator {
    scanner: Arc<dyn TableScanner>,
    environment: Arc<UnitEnvironment>,
}

impl DryRunEvaluator {
    pub fn new(scanner: Arc<dyn TableScanner>, environment: Arc<UnitEnvironment>) -> Self {
        Self { scanner, environment }
    }

    /// Evaluate the run. The first failing partition ends the evaluation.
    #[instrument(skip(self, configuration))]
    pub async fn evaluate(&self, mut configuration: JobConfiguration, table: &str) -> Result<JobOutcome, PipelineError> {
        let started_at = Utc::now();
        let started = Instant::now();
        configuration.set_bool(DRY_RUN_CONF_KEY, true);
        let configuration = Arc::new(configuration);
        let counters = Counters::new();

        let partitions = self.scanner.partitions(table).await?;
        info!(partitions = partitions.len(), "Starting dry run");

        for (index, partition) in partitions.iter().enumerate() {
            let context = TaskContext::new(
                format!("dryrun_{:05}", index),
                configuration.clone(),
                counters.clone(),
                OutputCollector::Discard,
            );
            let rows = IndexingUnit::run(self.scanner.as_ref(), partition, context, &self.environment).await?;
            info!(partition = %partition.id, rows = rows, "Dry run partition done");
        }

        let elapsed = started.elapsed();
        info!(secs = elapsed.as_secs_f64(), "Done dry run");

        Ok(JobOutcome {
            succeeded: true,
            counters: counters.snapshot(),
            failed_units: Vec::new(),
            started_at,
            elapsed,
        })
    }
}
