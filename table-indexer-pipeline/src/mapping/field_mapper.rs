use std::sync::Arc;
use std::time::Instant;

use serde_json::{Number, Value};

use crate::mapping::{FieldDefinition, FieldType, IndexerConf};
use crate::metrics::{LegacyMetricsRegistry, MetricName, INDEXER_METRICS_GROUP};
use table_indexer_shared::{Document, Row};

const LOWERCASE_PARAM: &str = "lowercase";

/// A document-level failure. The affected document is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    pub row_key: String,
    pub field: String,
    pub message: String,
}

/// Result of mapping one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingOutcome {
    pub documents: Vec<Document>,
    /// Number of documents dropped because of `errors`.
    pub dropped: usize,
    pub errors: Vec<MappingError>,
}

/// Converts a row into zero or more documents.
pub trait RowMapper: Send + Sync {
    fn map(&self, row: &Row) -> MappingOutcome;
}

/// Maps every configured column of a row onto one document keyed by the row key.
pub struct FieldMapper {
    indexer_name: String,
    fields: Vec<FieldDefinition>,
    lowercase: bool,
    metrics: Arc<LegacyMetricsRegistry>,
}

impl FieldMapper {
    pub fn new(indexer_name: impl Into<String>, conf: &IndexerConf, metrics: Arc<LegacyMetricsRegistry>) -> Self {
        let lowercase = conf
            .params
            .get(LOWERCASE_PARAM)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            indexer_name: indexer_name.into(),
            fields: conf.fields.clone(),
            lowercase,
            metrics,
        }
    }

    fn metric(&self, name: &str) -> MetricName {
        MetricName::new(INDEXER_METRICS_GROUP, self.indexer_name.as_str(), name)
    }

    fn convert(&self, field: &FieldDefinition, raw: &str) -> Result<Value, String> {
        let invalid = |e: &dyn std::fmt::Display| format!("cannot convert '{}' to {:?}: {}", raw, field.field_type, e);
        match field.field_type {
            FieldType::String if self.lowercase => Ok(Value::String(raw.to_lowercase())),
            FieldType::String => Ok(Value::String(raw.to_string())),
            FieldType::Int => raw.trim().parse::<i32>().map(Value::from).map_err(|e| invalid(&e)),
            FieldType::Long => raw.trim().parse::<i64>().map(Value::from).map_err(|e| invalid(&e)),
            FieldType::Float => {
                let parsed = raw.trim().parse::<f64>().map_err(|e| invalid(&e))?;
                Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| invalid(&"not a finite number"))
            }
            FieldType::Boolean => raw
                .trim()
                .to_ascii_lowercase()
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|e| invalid(&e)),
        }
    }
}

impl RowMapper for FieldMapper {
    fn map(&self, row: &Row) -> MappingOutcome {
        let started = Instant::now();
        let mut outcome = MappingOutcome::default();
        let mut document = Document::new(row.key.clone());
        let mut failed = false;

        for field in &self.fields {
            let Some(raw) = row.column(&field.column) else {
                continue;
            };
            match self.convert(field, raw) {
                Ok(value) => document.add_field(field.name.clone(), value),
                Err(message) => {
                    failed = true;
                    outcome.errors.push(MappingError {
                        row_key: row.key.clone(),
                        field: field.name.clone(),
                        message,
                    });
                }
            }
        }

        if failed {
            outcome.dropped = 1;
        } else if !document.fields.is_empty() {
            outcome.documents.push(document);
        }

        self.metrics
            .increment_counter(self.metric("Documents mapped"), outcome.documents.len() as u64);
        if outcome.dropped > 0 {
            self.metrics
                .increment_counter(self.metric("Mapping errors"), outcome.dropped as u64);
        }
        self.metrics.record_timer(self.metric("Row mapping"), started.elapsed());

        outcome
    }
}
