//! Metrics registries and the bridge that republishes them as job counters.
//!
//! Two independent registries exist per unit: the legacy registry, keyed by
//! `(group, type, name)` and fed by the mapping layer, and the current
//! registry, keyed by flat names and fed by the processor and writer. Both are
//! explicit objects handed to the components at construction.

mod bridge;
mod registry;

pub use bridge::{MetricsBridge, METRICS_COUNTER_GROUP};
pub use registry::{
    HistogramValue, LegacyMetric, LegacyMetricsRegistry, MetricName, MetricsRegistry, TimerValue,
    INDEXER_METRICS_GROUP,
};

use std::sync::Arc;

/// The pair of registries owned by one unit.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistries {
    pub legacy: Arc<LegacyMetricsRegistry>,
    pub current: Arc<MetricsRegistry>,
}

impl MetricsRegistries {
    pub fn new() -> Self {
        Self::default()
    }
}
