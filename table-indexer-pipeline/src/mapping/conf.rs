use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::errors::PipelineError;

const DEFAULT_UNIQUE_KEY_FIELD: &str = "id";

/// Whether a row is re-read from the table when an update arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowReadMode {
    #[default]
    Dynamic,
    Never,
}

impl FromStr for RowReadMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamic" => Ok(Self::Dynamic),
            "never" => Ok(Self::Never),
            other => Err(PipelineError::configuration(format!(
                "unknown read-row mode '{}', expected 'dynamic' or 'never'",
                other
            ))),
        }
    }
}

impl fmt::Display for RowReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dynamic => f.write_str("dynamic"),
            Self::Never => f.write_str("never"),
        }
    }
}

/// Value type of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldType {
    #[default]
    String,
    Int,
    Long,
    Float,
    Boolean,
}

impl FromStr for FieldType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "int" => Ok(Self::Int),
            "long" => Ok(Self::Long),
            "float" | "double" => Ok(Self::Float),
            "boolean" => Ok(Self::Boolean),
            other => Err(PipelineError::configuration(format!("unknown field type '{}'", other))),
        }
    }
}

/// One `<field>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    /// Name of the document field.
    pub name: String,
    /// Row column the value is read from.
    pub column: String,
    pub field_type: FieldType,
}

/// Parsed indexer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerConf {
    pub table: Option<String>,
    pub unique_key_field: String,
    pub row_read_mode: RowReadMode,
    pub fields: Vec<FieldDefinition>,
    /// Global mapping parameters.
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawIndexer {
    #[serde(rename = "@table", default)]
    table: Option<String>,
    #[serde(rename = "@unique-key-field", default)]
    unique_key_field: Option<String>,
    #[serde(rename = "@read-row", default)]
    read_row: Option<String>,
    #[serde(rename = "field", default)]
    fields: Vec<RawField>,
    #[serde(rename = "param", default)]
    params: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
    #[serde(rename = "@type", default)]
    field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawParam {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

impl IndexerConf {
    /// Parse the XML form of an indexer configuration.
    pub fn from_xml(xml: &str) -> Result<Self, PipelineError> {
        if xml.trim().is_empty() {
            return Err(PipelineError::configuration("indexer configuration is empty"));
        }

        let raw: RawIndexer = quick_xml::de::from_str(xml)
            .map_err(|e| PipelineError::configuration(format!("invalid indexer configuration: {}", e)))?;

        let row_read_mode = match raw.read_row.as_deref() {
            Some(mode) => mode.parse()?,
            None => RowReadMode::default(),
        };

        let fields = raw
            .fields
            .into_iter()
            .map(|f| {
                let field_type = match f.field_type.as_deref() {
                    Some(t) => t.parse()?,
                    None => FieldType::default(),
                };
                Ok(FieldDefinition {
                    name: f.name,
                    column: f.value,
                    field_type,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        Ok(Self {
            table: raw.table.filter(|t| !t.is_empty()),
            unique_key_field: raw
                .unique_key_field
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| DEFAULT_UNIQUE_KEY_FIELD.to_string()),
            row_read_mode,
            fields,
            params: raw.params.into_iter().map(|p| (p.name, p.value)).collect(),
        })
    }

    /// Merge global parameters, overriding values from the XML.
    pub fn merge_params(&mut self, params: BTreeMap<String, String>) {
        self.params.extend(params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS_CONF: &str = r#"
        <indexer table="users" unique-key-field="user_id" read-row="dynamic">
          <field name="name_s" value="info:name"/>
          <param name="lowercase" value="false"/>
          <field name="age_i" value="info:age" type="int"/>
        </indexer>
    "#;

    #[test]
    fn test_parse_full_configuration() {
        let conf = IndexerConf::from_xml(USERS_CONF).unwrap();

        assert_eq!(conf.table.as_deref(), Some("users"));
        assert_eq!(conf.unique_key_field, "user_id");
        assert_eq!(conf.row_read_mode, RowReadMode::Dynamic);
        assert_eq!(conf.fields.len(), 2);
        assert_eq!(conf.fields[0].column, "info:name");
        assert_eq!(conf.fields[0].field_type, FieldType::String);
        assert_eq!(conf.fields[1].field_type, FieldType::Int);
        assert_eq!(conf.params.get("lowercase").map(String::as_str), Some("false"));
    }

    #[test]
    fn test_defaults() {
        let conf = IndexerConf::from_xml(r#"<indexer table="t"/>"#).unwrap();

        assert_eq!(conf.unique_key_field, "id");
        assert_eq!(conf.row_read_mode, RowReadMode::Dynamic);
        assert!(conf.fields.is_empty());
    }

    #[test]
    fn test_merge_params_overrides_xml() {
        let mut conf = IndexerConf::from_xml(USERS_CONF).unwrap();
        conf.merge_params(BTreeMap::from([("lowercase".to_string(), "true".to_string())]));

        assert_eq!(conf.params["lowercase"], "true");
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(IndexerConf::from_xml("").is_err());
        assert!(IndexerConf::from_xml("<indexer").is_err());

        let err = IndexerConf::from_xml(r#"<indexer><field name="a" value="b" type="date"/></indexer>"#)
            .unwrap_err();
        assert!(err.to_string().contains("unknown field type"));

        let err = IndexerConf::from_xml(r#"<indexer read-row="always"/>"#).unwrap_err();
        assert!(err.is_setup());
    }
}
