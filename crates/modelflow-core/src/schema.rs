//! Versioned record schemas.
//!
//! These are the JSON wire shapes for model definitions and environments and
//! the plain data types an environment is assembled from. They carry no
//! behaviour beyond defaults and lookups; validation lives with the value
//! objects that own them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelSpecError, ProtocolVersionError};
use crate::protocol::ProtocolVersion;

// ============================================================================
// Model definition record
// ============================================================================

/// Wire form of a model definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinitionRecord {
    pub name: String,
    pub version: String,
    pub extractor_class: String,
    pub scorer_class: String,
    pub protocol_version: String,
}

// ============================================================================
// Model environment record
// ============================================================================

/// Wire form of a model environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEnvironmentRecord {
    pub protocol_version: String,
    pub name: String,
    pub version: String,
    pub model_table_uri: String,
    #[serde(default)]
    pub extract_environment: Option<ExtractEnvironment>,
    #[serde(default)]
    pub score_environment: Option<ScoreEnvironment>,
}

/// Resources bound to the extract phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractEnvironment {
    pub data_request: DataRequest,
    #[serde(default)]
    pub kv_stores: Vec<KvStoreSpec>,
    #[serde(default)]
    pub field_bindings: Vec<FieldBinding>,
}

/// Resources bound to the score phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEnvironment {
    #[serde(default)]
    pub kv_stores: Vec<KvStoreSpec>,
    #[serde(rename = "output_column")]
    pub output_column_name: String,
}

/// Columns and time range the extract phase reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRequest {
    #[serde(default)]
    pub min_timestamp: i64,
    #[serde(default = "default_max_timestamp")]
    pub max_timestamp: i64,
    #[serde(rename = "column_definitions", default)]
    pub columns: Vec<ColumnSpec>,
}

impl Default for DataRequest {
    fn default() -> Self {
        Self {
            min_timestamp: 0,
            max_timestamp: default_max_timestamp(),
            columns: Vec::new(),
        }
    }
}

impl DataRequest {
    pub fn new(min_timestamp: i64, max_timestamp: i64, columns: Vec<ColumnSpec>) -> Self {
        Self {
            min_timestamp,
            max_timestamp,
            columns,
        }
    }
}

fn default_max_timestamp() -> i64 {
    i64::MAX
}

/// A single requested column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "name")]
    pub column_name: String,
    #[serde(default = "default_max_versions")]
    pub max_versions: i32,
    #[serde(default)]
    pub filter: Option<ColumnFilter>,
}

impl ColumnSpec {
    /// A column reading only the most recent version, unfiltered.
    pub fn new(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            max_versions: default_max_versions(),
            filter: None,
        }
    }

    pub fn with_max_versions(mut self, max_versions: i32) -> Self {
        self.max_versions = max_versions;
        self
    }

    pub fn with_filter(mut self, filter: ColumnFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

fn default_max_versions() -> i32 {
    1
}

/// Kinds of column filter the storage layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    And,
    ColumnRange,
    Or,
    RegexQualifier,
}

/// A filter applied to a requested column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub filter_type: FilterType,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl ColumnFilter {
    pub fn new(filter_type: FilterType, properties: Vec<Property>) -> Self {
        Self {
            filter_type,
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        find_property(&self.properties, name)
    }
}

/// Kinds of key-value store a phase may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreType {
    AvroKv,
    AvroRecord,
    TableBacked,
}

impl StoreType {
    /// Properties a store of this type must carry.
    pub fn required_properties(&self) -> &'static [&'static str] {
        match self {
            StoreType::AvroKv => &["path"],
            StoreType::AvroRecord => &["path", "key_field"],
            StoreType::TableBacked => &["table_uri", "column"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::AvroKv => "AVRO_KV",
            StoreType::AvroRecord => "AVRO_RECORD",
            StoreType::TableBacked => "TABLE_BACKED",
        }
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named key-value store a phase reads at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvStoreSpec {
    pub store_type: StoreType,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl KvStoreSpec {
    pub fn new(store_type: StoreType, name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            store_type,
            name: name.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        find_property(&self.properties, name)
    }
}

/// Association between a tuple field and the store field backing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldBinding {
    pub tuple_field_name: String,
    pub store_field_name: String,
}

impl FieldBinding {
    pub fn new(tuple_field_name: impl Into<String>, store_field_name: impl Into<String>) -> Self {
        Self {
            tuple_field_name: tuple_field_name.into(),
            store_field_name: store_field_name.into(),
        }
    }
}

/// A `{name, value}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a str> {
    properties
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.value.as_str())
}

// ============================================================================
// Document header
// ============================================================================

/// Read and gate the `protocol_version` of a raw document.
///
/// Runs before the full decode so an out-of-window document is reported as
/// such rather than as whatever shape mismatch the newer schema causes.
pub(crate) fn read_protocol_version(
    document: &Value,
    min: &ProtocolVersion,
    max: &ProtocolVersion,
) -> Result<ProtocolVersion, ModelSpecError> {
    let raw = match document.get("protocol_version") {
        Some(Value::String(raw)) => raw,
        Some(_) => {
            return Err(ProtocolVersionError::InvalidFormat {
                input: document["protocol_version"].to_string(),
                reason: "protocol_version must be a string".to_string(),
            }
            .into())
        }
        None => {
            return Err(ModelSpecError::MalformedDocument(
                <serde_json::Error as serde::de::Error>::missing_field("protocol_version"),
            ))
        }
    };
    let version = ProtocolVersion::parse(raw)?;
    version.validate(min, max)?;
    Ok(version)
}
