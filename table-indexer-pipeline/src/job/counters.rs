//! Job-scoped counters.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Group holding the built-in indexer counters.
pub const INDEXER_COUNTER_GROUP: &str = "TableIndexerCounters";

/// Built-in counters maintained by every indexing unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerCounter {
    /// Rows handed to the row processor.
    InputRows,
    /// Documents handed to the sink.
    OutputIndexDocuments,
    /// Batches handed to the sink.
    OutputIndexDocumentBatches,
    /// Documents the mapping layer could not build.
    MappingErrors,
    /// Documents the cluster refused inside an accepted batch.
    DocumentErrors,
}

impl IndexerCounter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::InputRows => "INPUT_ROWS",
            Self::OutputIndexDocuments => "OUTPUT_INDEX_DOCUMENTS",
            Self::OutputIndexDocumentBatches => "OUTPUT_INDEX_DOCUMENT_BATCHES",
            Self::MappingErrors => "MAPPING_ERRORS",
            Self::DocumentErrors => "DOCUMENT_ERRORS",
        }
    }
}

/// Key of a counter: `(group, name)`.
pub type CounterKey = (String, String);

/// Point-in-time copy of all counters.
pub type CounterSnapshot = BTreeMap<CounterKey, u64>;

/// Shared handle to the counters of one job.
///
/// Cloning is cheap; every clone updates the same values. Counters only ever
/// grow within a job.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    inner: Arc<Mutex<CounterSnapshot>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, counter: IndexerCounter, amount: u64) {
        self.increment_named(INDEXER_COUNTER_GROUP, counter.name(), amount);
    }

    pub fn increment_named(&self, group: &str, name: &str, amount: u64) {
        let mut values = self.inner.lock();
        *values
            .entry((group.to_string(), name.to_string()))
            .or_insert(0) += amount;
    }

    pub fn get(&self, counter: IndexerCounter) -> u64 {
        self.get_named(INDEXER_COUNTER_GROUP, counter.name())
    }

    pub fn get_named(&self, group: &str, name: &str) -> u64 {
        self.inner
            .lock()
            .get(&(group.to_string(), name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.inner.lock().clone()
    }

    /// Add every value of `other` to these counters.
    pub fn merge(&self, other: &Counters) {
        let incoming = other.snapshot();
        let mut values = self.inner.lock();
        for (key, amount) in incoming {
            *values.entry(key).or_insert(0) += amount;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_values() {
        let counters = Counters::new();
        let clone = counters.clone();

        counters.increment(IndexerCounter::InputRows, 2);
        clone.increment(IndexerCounter::InputRows, 3);

        assert_eq!(counters.get(IndexerCounter::InputRows), 5);
        assert_eq!(counters.get(IndexerCounter::OutputIndexDocuments), 0);
    }

    #[test]
    fn test_merge_adds_values() {
        let job = Counters::new();
        job.increment(IndexerCounter::InputRows, 1);

        let unit = Counters::new();
        unit.increment(IndexerCounter::InputRows, 4);
        unit.increment(IndexerCounter::OutputIndexDocumentBatches, 2);
        job.merge(&unit);

        assert_eq!(job.get(IndexerCounter::InputRows), 5);
        assert_eq!(job.get(IndexerCounter::OutputIndexDocumentBatches), 2);
    }

    #[test]
    fn test_named_counters_in_snapshot() {
        let counters = Counters::new();
        counters.increment_named("Table Indexer Metrics", "indexer: rows", 7);

        let snapshot = counters.snapshot();
        assert_eq!(
            snapshot.get(&("Table Indexer Metrics".to_string(), "indexer: rows".to_string())),
            Some(&7)
        );
    }
}
