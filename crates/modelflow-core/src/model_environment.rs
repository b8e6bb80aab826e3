//! Model environments: the runtime resources bound to each phase.
//!
//! Either phase environment may be absent, meaning that phase is not
//! configured for this run. Like definitions, an environment only exists
//! once every rule has passed.

use serde_json::Value;

use crate::error::{Result, ValidationError, ValidationErrors, MODEL_ENVIRONMENT_SUMMARY};
use crate::obs;
use crate::protocol::ProtocolVersion;
use crate::schema::{
    read_protocol_version, ColumnFilter, DataRequest, ExtractEnvironment, FilterType,
    KvStoreSpec, ModelEnvironmentRecord, ScoreEnvironment,
};
use crate::validation::{
    find_duplicates, validate_column_address, validate_name, validate_non_empty,
    validate_properties, validate_uri, validate_version, ValidationReport,
};

/// Protocol name stamped on model environment documents.
pub const MODEL_ENVIRONMENT_PROTOCOL: &str = "model_environment";

/// Oldest model environment protocol this build reads.
pub const MIN_MODEL_ENV_VERSION: ProtocolVersion =
    ProtocolVersion::from_static(MODEL_ENVIRONMENT_PROTOCOL, 0, 1, 0);

/// Newest model environment protocol this build reads.
pub const MAX_MODEL_ENV_VERSION: ProtocolVersion =
    ProtocolVersion::from_static(MODEL_ENVIRONMENT_PROTOCOL, 0, 1, 0);

/// Protocol version written by this build.
pub const CURRENT_MODEL_ENV_VERSION: ProtocolVersion = MAX_MODEL_ENV_VERSION;

/// A validated, immutable model environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEnvironment {
    protocol_version: ProtocolVersion,
    name: String,
    version: String,
    model_table_uri: String,
    extract_environment: Option<ExtractEnvironment>,
    score_environment: Option<ScoreEnvironment>,
}

/// Fields to replace in [`ModelEnvironment::with_new_settings`].
///
/// The phase environments use a nested `Option`: `Some(None)` removes the
/// phase, `None` keeps the current one.
#[derive(Debug, Clone, Default)]
pub struct ModelEnvironmentOverrides {
    pub name: Option<String>,
    pub version: Option<String>,
    pub model_table_uri: Option<String>,
    pub extract_environment: Option<Option<ExtractEnvironment>>,
    pub score_environment: Option<Option<ScoreEnvironment>>,
    pub protocol_version: Option<ProtocolVersion>,
}

impl ModelEnvironment {
    /// Build an environment stamped with [`CURRENT_MODEL_ENV_VERSION`].
    ///
    /// # Errors
    ///
    /// Every violated rule, aggregated.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        model_table_uri: impl Into<String>,
        extract_environment: Option<ExtractEnvironment>,
        score_environment: Option<ScoreEnvironment>,
    ) -> std::result::Result<Self, ValidationErrors> {
        Self::from_parts(Self {
            protocol_version: CURRENT_MODEL_ENV_VERSION,
            name: name.into(),
            version: version.into(),
            model_table_uri: model_table_uri.into(),
            extract_environment,
            score_environment,
        })
    }

    /// Build an environment from its wire record.
    ///
    /// # Errors
    ///
    /// - `ModelSpecError::Protocol`: `protocol_version` does not parse.
    /// - `ModelSpecError::Invalid`: one or more rules failed.
    pub fn from_record(record: ModelEnvironmentRecord) -> Result<Self> {
        let protocol_version = ProtocolVersion::parse(&record.protocol_version)?;
        let environment = Self::from_parts(Self {
            protocol_version,
            name: record.name,
            version: record.version,
            model_table_uri: record.model_table_uri,
            extract_environment: record.extract_environment,
            score_environment: record.score_environment,
        })?;
        Ok(environment)
    }

    fn from_parts(candidate: Self) -> std::result::Result<Self, ValidationErrors> {
        match candidate.validate() {
            Ok(()) => {
                obs::emit_environment_validated(
                    &candidate.name,
                    &candidate.version,
                    candidate.extract_environment.is_some(),
                    candidate.score_environment.is_some(),
                );
                Ok(candidate)
            }
            Err(errors) => {
                obs::emit_environment_rejected(&candidate.name, errors.len());
                Err(errors)
            }
        }
    }

    /// Decode and validate an environment document.
    ///
    /// # Errors
    ///
    /// - `ModelSpecError::MalformedDocument`: not JSON, or not the record shape.
    /// - `ModelSpecError::Protocol`: bad or out-of-window `protocol_version`.
    /// - `ModelSpecError::Invalid`: one or more rules failed.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(json)?;
        read_protocol_version(&document, &MIN_MODEL_ENV_VERSION, &MAX_MODEL_ENV_VERSION)?;
        let record: ModelEnvironmentRecord = serde_json::from_value(document)?;
        Self::from_record(record)
    }

    /// Deterministic JSON encoding; round-trips through [`from_json`](Self::from_json).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    pub fn to_record(&self) -> ModelEnvironmentRecord {
        ModelEnvironmentRecord {
            protocol_version: self.protocol_version.to_string(),
            name: self.name.clone(),
            version: self.version.clone(),
            model_table_uri: self.model_table_uri.clone(),
            extract_environment: self.extract_environment.clone(),
            score_environment: self.score_environment.clone(),
        }
    }

    /// A new validated environment with `overrides` applied on top of `self`.
    pub fn with_new_settings(
        &self,
        overrides: ModelEnvironmentOverrides,
    ) -> std::result::Result<Self, ValidationErrors> {
        Self::from_parts(Self {
            protocol_version: overrides
                .protocol_version
                .unwrap_or_else(|| self.protocol_version.clone()),
            name: overrides.name.unwrap_or_else(|| self.name.clone()),
            version: overrides.version.unwrap_or_else(|| self.version.clone()),
            model_table_uri: overrides
                .model_table_uri
                .unwrap_or_else(|| self.model_table_uri.clone()),
            extract_environment: overrides
                .extract_environment
                .unwrap_or_else(|| self.extract_environment.clone()),
            score_environment: overrides
                .score_environment
                .unwrap_or_else(|| self.score_environment.clone()),
        })
    }

    /// Run every rule against this environment.
    pub fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut report = ValidationReport::new();

        report.check(
            self.protocol_version
                .validate(&MIN_MODEL_ENV_VERSION, &MAX_MODEL_ENV_VERSION)
                .map_err(ValidationError::from),
        );
        report.check(validate_name("name", &self.name));
        report.check(validate_version("version", &self.version));
        report.check(validate_uri("model_table_uri", &self.model_table_uri));

        if let Some(extract) = &self.extract_environment {
            validate_extract_environment(extract, &mut report);
        }
        if let Some(score) = &self.score_environment {
            validate_score_environment(score, &mut report);
        }

        report.finish(MODEL_ENVIRONMENT_SUMMARY)
    }

    pub fn protocol_version(&self) -> &ProtocolVersion {
        &self.protocol_version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn model_table_uri(&self) -> &str {
        &self.model_table_uri
    }

    pub fn extract_environment(&self) -> Option<&ExtractEnvironment> {
        self.extract_environment.as_ref()
    }

    pub fn score_environment(&self) -> Option<&ScoreEnvironment> {
        self.score_environment.as_ref()
    }
}

fn validate_extract_environment(env: &ExtractEnvironment, report: &mut ValidationReport) {
    validate_data_request("extract_environment.data_request", &env.data_request, report);
    validate_kv_stores("extract_environment.kv_stores", &env.kv_stores, report);

    for (i, binding) in env.field_bindings.iter().enumerate() {
        report.check(validate_non_empty(
            &format!("extract_environment.field_bindings[{i}].tuple_field_name"),
            &binding.tuple_field_name,
        ));
        report.check(validate_non_empty(
            &format!("extract_environment.field_bindings[{i}].store_field_name"),
            &binding.store_field_name,
        ));
    }
    report.extend(find_duplicates(
        "extract_environment.field_bindings",
        env.field_bindings
            .iter()
            .map(|b| b.tuple_field_name.as_str())
            .filter(|name| !name.is_empty()),
    ));
}

fn validate_score_environment(env: &ScoreEnvironment, report: &mut ValidationReport) {
    report.check(validate_column_address(
        "score_environment.output_column",
        &env.output_column_name,
    ));
    validate_kv_stores("score_environment.kv_stores", &env.kv_stores, report);
}

fn validate_data_request(field: &str, request: &DataRequest, report: &mut ValidationReport) {
    if request.min_timestamp < 0 {
        report.push(ValidationError::NegativeTimestamp {
            field: field.to_string(),
            value: request.min_timestamp,
        });
    }
    if request.min_timestamp >= request.max_timestamp {
        report.push(ValidationError::TimestampOrder {
            field: field.to_string(),
            min: request.min_timestamp,
            max: request.max_timestamp,
        });
    }

    for (i, column) in request.columns.iter().enumerate() {
        let column_field = format!("{field}.column_definitions[{i}]");
        report.check(validate_column_address(
            &format!("{column_field}.name"),
            &column.column_name,
        ));
        if column.max_versions < 1 {
            report.push(ValidationError::MaxVersions {
                field: column_field.clone(),
                value: column.max_versions,
            });
        }
        if let Some(filter) = &column.filter {
            validate_filter(&format!("{column_field}.filter"), filter, report);
        }
    }
    report.extend(find_duplicates(
        &format!("{field}.column_definitions"),
        request.columns.iter().map(|c| c.column_name.as_str()),
    ));
}

fn validate_filter(field: &str, filter: &ColumnFilter, report: &mut ValidationReport) {
    match filter.filter_type {
        FilterType::RegexQualifier => {
            report.extend(validate_properties(field, &filter.properties, &["regex"]));
            if let Some(pattern) = filter.property("regex") {
                if let Err(err) = regex::Regex::new(pattern) {
                    report.push(ValidationError::InvalidRegex {
                        field: field.to_string(),
                        value: pattern.to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        FilterType::ColumnRange => {
            report.extend(validate_properties(field, &filter.properties, &[]));
            if filter.property("min_qualifier").is_none()
                && filter.property("max_qualifier").is_none()
            {
                report.push(ValidationError::MissingProperty {
                    field: field.to_string(),
                    property: "min_qualifier or max_qualifier".to_string(),
                });
            }
        }
        FilterType::And | FilterType::Or => {
            report.extend(validate_properties(field, &filter.properties, &[]));
        }
    }
}

fn validate_kv_stores(field: &str, stores: &[KvStoreSpec], report: &mut ValidationReport) {
    for (i, store) in stores.iter().enumerate() {
        let store_field = format!("{field}[{i}]");
        report.check(validate_non_empty(&format!("{store_field}.name"), &store.name));
        report.extend(validate_properties(
            &store_field,
            &store.properties,
            store.store_type.required_properties(),
        ));
    }
    report.extend(find_duplicates(
        field,
        stores
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !name.is_empty()),
    ));
}
