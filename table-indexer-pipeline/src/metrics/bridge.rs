use tracing::debug;

use crate::job::Counters;
use crate::metrics::{LegacyMetric, MetricsRegistries, INDEXER_METRICS_GROUP};

/// Counter group receiving every republished metric.
pub const METRICS_COUNTER_GROUP: &str = "Table Indexer Metrics";

/// Copies a point-in-time snapshot of both registries into job counters.
///
/// Counters, meters and histograms contribute their counts; timers contribute
/// their total time in milliseconds.
#[derive(Debug, Clone)]
pub struct MetricsBridge {
    registries: MetricsRegistries,
}

impl MetricsBridge {
    pub fn new(registries: MetricsRegistries) -> Self {
        Self { registries }
    }

    /// Publish both registries. Runs once per unit, at cleanup.
    pub fn publish(self, counters: &Counters) {
        let legacy = self.copy_legacy_metrics(counters);
        let current = self.copy_current_metrics(counters);
        debug!(legacy, current, "Copied indexing metrics to counters");
    }

    fn copy_legacy_metrics(&self, counters: &Counters) -> usize {
        let grouped = self
            .registries
            .legacy
            .grouped_metrics(|name| name.group == INDEXER_METRICS_GROUP);

        let mut copied = 0;
        for metrics in grouped.values() {
            for (name, metric) in metrics {
                let counter_name = format!("{}: {}", name.kind, name.name);
                let value = match metric {
                    LegacyMetric::Counter(count) | LegacyMetric::Meter(count) => *count,
                    LegacyMetric::Timer(timer) => timer.total_millis(),
                };
                counters.increment_named(METRICS_COUNTER_GROUP, &counter_name, value);
                copied += 1;
            }
        }
        copied
    }

    fn copy_current_metrics(&self, counters: &Counters) -> usize {
        let registry = &self.registries.current;
        let mut copied = 0;

        let counts = registry
            .counters()
            .into_iter()
            .chain(registry.histograms().into_iter().map(|(name, h)| (name, h.count)))
            .chain(registry.meters());
        for (name, count) in counts {
            counters.increment_named(METRICS_COUNTER_GROUP, &name, count);
            copied += 1;
        }

        for (name, timer) in registry.timers() {
            counters.increment_named(METRICS_COUNTER_GROUP, &name, timer.total_millis());
            copied += 1;
        }

        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricName;
    use std::time::Duration;

    fn counter(counters: &Counters, name: &str) -> u64 {
        counters.get_named(METRICS_COUNTER_GROUP, name)
    }

    #[test]
    fn test_publishes_both_registries() {
        let registries = MetricsRegistries::new();
        registries
            .legacy
            .increment_counter(MetricName::new(INDEXER_METRICS_GROUP, "users", "Documents mapped"), 4);
        registries.legacy.record_timer(
            MetricName::new(INDEXER_METRICS_GROUP, "users", "Row mapping"),
            Duration::from_micros(2_500),
        );
        registries
            .legacy
            .increment_counter(MetricName::new("jvm", "gc", "collections"), 9);
        registries.current.increment_counter("rows.skipped", 2);
        registries.current.mark_meter("documents.transmitted", 6);
        registries.current.update_histogram("documents.per-row", 3);
        registries
            .current
            .record_timer("batch.flush", Duration::from_nanos(3_999_999));

        let counters = Counters::new();
        MetricsBridge::new(registries).publish(&counters);

        assert_eq!(counter(&counters, "users: Documents mapped"), 4);
        assert_eq!(counter(&counters, "users: Row mapping"), 2);
        assert_eq!(counter(&counters, "gc: collections"), 0);
        assert_eq!(counter(&counters, "rows.skipped"), 2);
        assert_eq!(counter(&counters, "documents.transmitted"), 6);
        assert_eq!(counter(&counters, "documents.per-row"), 1);
        assert_eq!(counter(&counters, "batch.flush"), 3);
    }

    #[test]
    fn test_empty_registries_publish_nothing() {
        let counters = Counters::new();
        MetricsBridge::new(MetricsRegistries::new()).publish(&counters);
        assert!(counters.snapshot().is_empty());
    }
}
