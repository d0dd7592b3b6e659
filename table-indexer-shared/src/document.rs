//! Search documents produced from rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A search-index-ready document.
///
/// The `id` is the stable document identifier used as the key when the
/// document travels through the compute framework's output stage and as the
/// `_id` when it is sent to a live cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable document identifier.
    pub id: String,
    /// Field values. A field may carry several values.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<Value>>,
}

impl Document {
    /// Create a document with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Append a value to a field.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.entry(name.into()).or_default().push(value.into());
    }

    /// Builder form of [`Document::add_field`].
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_field(name, value);
        self
    }

    /// First value of a field, if any.
    pub fn first_value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(|values| values.first())
    }

    /// Render the document as the JSON body sent to the cluster.
    ///
    /// Single-valued fields are flattened to a scalar.
    pub fn to_source(&self, id_field: &str) -> Value {
        let mut source = serde_json::Map::new();
        source.insert(id_field.to_string(), Value::String(self.id.clone()));
        for (name, values) in &self.fields {
            let value = match values.as_slice() {
                [single] => single.clone(),
                many => Value::Array(many.to_vec()),
            };
            source.insert(name.clone(), value);
        }
        Value::Object(source)
    }
}
