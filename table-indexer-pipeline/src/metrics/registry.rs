use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;

/// Group under which the mapping layer registers its legacy metrics.
pub const INDEXER_METRICS_GROUP: &str = "table-indexer";

/// Accumulated value of a timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerValue {
    /// Number of recorded durations.
    pub count: u64,
    /// Sum of recorded durations in nanoseconds.
    pub total_nanos: u128,
}

impl TimerValue {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total_nanos += elapsed.as_nanos();
    }

    /// Total recorded time in milliseconds, truncated.
    pub fn total_millis(&self) -> u64 {
        (self.total_nanos / 1_000_000) as u64
    }
}

/// Distribution of the values recorded by a histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistogramValue {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl HistogramValue {
    fn update(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    counters: BTreeMap<String, u64>,
    meters: BTreeMap<String, u64>,
    timers: BTreeMap<String, TimerValue>,
    histograms: BTreeMap<String, HistogramValue>,
}

/// Registry of named counters, meters, timers and histograms.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    inner: Mutex<RegistryInner>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_counter(&self, name: &str, amount: u64) {
        *self.inner.lock().counters.entry(name.to_string()).or_insert(0) += amount;
    }

    pub fn mark_meter(&self, name: &str, events: u64) {
        *self.inner.lock().meters.entry(name.to_string()).or_insert(0) += events;
    }

    pub fn record_timer(&self, name: &str, elapsed: Duration) {
        self.inner
            .lock()
            .timers
            .entry(name.to_string())
            .or_default()
            .record(elapsed);
    }

    pub fn update_histogram(&self, name: &str, value: u64) {
        self.inner
            .lock()
            .histograms
            .entry(name.to_string())
            .or_default()
            .update(value);
    }

    pub fn counters(&self) -> BTreeMap<String, u64> {
        self.inner.lock().counters.clone()
    }

    pub fn meters(&self) -> BTreeMap<String, u64> {
        self.inner.lock().meters.clone()
    }

    pub fn timers(&self) -> BTreeMap<String, TimerValue> {
        self.inner.lock().timers.clone()
    }

    pub fn histograms(&self) -> BTreeMap<String, HistogramValue> {
        self.inner.lock().histograms.clone()
    }
}

/// Name of a legacy metric.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MetricName {
    pub group: String,
    /// Metric type; the mapping layer uses the indexer name.
    pub kind: String,
    pub name: String,
}

impl MetricName {
    pub fn new(group: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Value of a legacy metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyMetric {
    Counter(u64),
    Meter(u64),
    Timer(TimerValue),
}

/// Registry keyed by `(group, type, name)`.
#[derive(Debug, Default)]
pub struct LegacyMetricsRegistry {
    metrics: Mutex<BTreeMap<MetricName, LegacyMetric>>,
}

impl LegacyMetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter. A metric registered under the same name with
    /// another kind is left untouched.
    pub fn increment_counter(&self, name: MetricName, amount: u64) {
        let mut metrics = self.metrics.lock();
        if let LegacyMetric::Counter(count) = metrics.entry(name).or_insert(LegacyMetric::Counter(0)) {
            *count += amount;
        }
    }

    pub fn mark_meter(&self, name: MetricName, events: u64) {
        let mut metrics = self.metrics.lock();
        if let LegacyMetric::Meter(count) = metrics.entry(name).or_insert(LegacyMetric::Meter(0)) {
            *count += events;
        }
    }

    pub fn record_timer(&self, name: MetricName, elapsed: Duration) {
        let mut metrics = self.metrics.lock();
        if let LegacyMetric::Timer(timer) = metrics
            .entry(name)
            .or_insert(LegacyMetric::Timer(TimerValue::default()))
        {
            timer.record(elapsed);
        }
    }

    /// Metrics accepted by `predicate`, grouped by metric type.
    pub fn grouped_metrics<P>(&self, predicate: P) -> BTreeMap<String, BTreeMap<MetricName, LegacyMetric>>
    where
        P: Fn(&MetricName) -> bool,
    {
        let mut grouped: BTreeMap<String, BTreeMap<MetricName, LegacyMetric>> = BTreeMap::new();
        for (name, metric) in self.metrics.lock().iter() {
            if predicate(name) {
                grouped
                    .entry(name.kind.clone())
                    .or_default()
                    .insert(name.clone(), *metric);
            }
        }
        grouped
    }
}
