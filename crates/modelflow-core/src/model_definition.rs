//! Model definitions: which extractor and scorer make up a model.
//!
//! A [`ModelDefinition`] only exists once it has passed every rule. All rules
//! run on every construction and their failures are reported together.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{
    ModelSpecError, Result, ValidationError, ValidationErrors, MODEL_DEFINITION_SUMMARY,
};
use crate::fields::{extractor_output_fields, scorer_input_fields, validate_coverage};
use crate::obs;
use crate::phase::{Extractor, Scorer};
use crate::protocol::ProtocolVersion;
use crate::registry::PhaseRegistry;
use crate::schema::{read_protocol_version, ModelDefinitionRecord};
use crate::validation::{validate_name, validate_version, ValidationReport};

/// Protocol name stamped on model definition documents.
pub const MODEL_DEFINITION_PROTOCOL: &str = "model_definition";

/// Oldest model definition protocol this build reads.
pub const MIN_MODEL_DEF_VERSION: ProtocolVersion =
    ProtocolVersion::from_static(MODEL_DEFINITION_PROTOCOL, 0, 1, 0);

/// Newest model definition protocol this build reads.
pub const MAX_MODEL_DEF_VERSION: ProtocolVersion =
    ProtocolVersion::from_static(MODEL_DEFINITION_PROTOCOL, 0, 1, 0);

/// Protocol version written by this build.
pub const CURRENT_MODEL_DEF_VERSION: ProtocolVersion = MAX_MODEL_DEF_VERSION;

/// A validated, immutable model definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    name: String,
    version: String,
    extractor_class: String,
    scorer_class: String,
    protocol_version: ProtocolVersion,
}

/// Fields to replace in [`ModelDefinition::with_new_settings`]. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct ModelDefinitionOverrides {
    pub name: Option<String>,
    pub version: Option<String>,
    pub extractor_class: Option<String>,
    pub scorer_class: Option<String>,
    pub protocol_version: Option<ProtocolVersion>,
}

impl ModelDefinition {
    /// Build a definition stamped with [`CURRENT_MODEL_DEF_VERSION`].
    ///
    /// # Errors
    ///
    /// Every violated rule, aggregated.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        extractor_class: impl Into<String>,
        scorer_class: impl Into<String>,
        registry: &PhaseRegistry,
    ) -> std::result::Result<Self, ValidationErrors> {
        Self::with_protocol_version(
            name,
            version,
            extractor_class,
            scorer_class,
            CURRENT_MODEL_DEF_VERSION,
            registry,
        )
    }

    /// Build a definition with an explicit protocol version.
    pub fn with_protocol_version(
        name: impl Into<String>,
        version: impl Into<String>,
        extractor_class: impl Into<String>,
        scorer_class: impl Into<String>,
        protocol_version: ProtocolVersion,
        registry: &PhaseRegistry,
    ) -> std::result::Result<Self, ValidationErrors> {
        let candidate = Self {
            name: name.into(),
            version: version.into(),
            extractor_class: extractor_class.into(),
            scorer_class: scorer_class.into(),
            protocol_version,
        };
        match candidate.validate(registry) {
            Ok(()) => {
                obs::emit_definition_validated(&candidate.name, &candidate.version);
                Ok(candidate)
            }
            Err(errors) => {
                obs::emit_definition_rejected(&candidate.name, errors.len());
                Err(errors)
            }
        }
    }

    /// Decode and validate a definition document.
    ///
    /// # Errors
    ///
    /// - `ModelSpecError::MalformedDocument`: not JSON, or not the record shape.
    /// - `ModelSpecError::Protocol`: bad or out-of-window `protocol_version`.
    /// - `ModelSpecError::Invalid`: one or more rules failed, including
    ///   unresolvable implementation names.
    pub fn from_json(json: &str, registry: &PhaseRegistry) -> Result<Self> {
        let document: Value = serde_json::from_str(json)?;
        let protocol_version =
            read_protocol_version(&document, &MIN_MODEL_DEF_VERSION, &MAX_MODEL_DEF_VERSION)?;
        let record: ModelDefinitionRecord = serde_json::from_value(document)?;
        let definition = Self::with_protocol_version(
            record.name,
            record.version,
            record.extractor_class,
            record.scorer_class,
            protocol_version,
            registry,
        )?;
        Ok(definition)
    }

    /// Deterministic JSON encoding; round-trips through [`from_json`](Self::from_json).
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_record())?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_record())?)
    }

    pub fn to_record(&self) -> ModelDefinitionRecord {
        ModelDefinitionRecord {
            name: self.name.clone(),
            version: self.version.clone(),
            extractor_class: self.extractor_class.clone(),
            scorer_class: self.scorer_class.clone(),
            protocol_version: self.protocol_version.to_string(),
        }
    }

    /// A new validated definition with `overrides` applied on top of `self`.
    pub fn with_new_settings(
        &self,
        overrides: ModelDefinitionOverrides,
        registry: &PhaseRegistry,
    ) -> std::result::Result<Self, ValidationErrors> {
        Self::with_protocol_version(
            overrides.name.unwrap_or_else(|| self.name.clone()),
            overrides.version.unwrap_or_else(|| self.version.clone()),
            overrides
                .extractor_class
                .unwrap_or_else(|| self.extractor_class.clone()),
            overrides
                .scorer_class
                .unwrap_or_else(|| self.scorer_class.clone()),
            overrides
                .protocol_version
                .unwrap_or_else(|| self.protocol_version.clone()),
            registry,
        )
    }

    /// Run every rule against this definition.
    ///
    /// Field coverage is only checked when both implementations resolved and
    /// instantiated; otherwise their own failures are the ones reported.
    pub fn validate(&self, registry: &PhaseRegistry) -> std::result::Result<(), ValidationErrors> {
        let mut report = ValidationReport::new();

        report.check(
            self.protocol_version
                .validate(&MIN_MODEL_DEF_VERSION, &MAX_MODEL_DEF_VERSION)
                .map_err(ValidationError::from),
        );
        report.check(validate_name("name", &self.name));
        report.check(validate_version("version", &self.version));

        let extractor = report.take(registry.instantiate_extractor(&self.extractor_class));
        let scorer = report.take(registry.instantiate_scorer(&self.scorer_class));

        if let Some(extractor) = &extractor {
            if extractor.input_fields().is_all() {
                report.push(ValidationError::ExtractorConsumesAll {
                    name: self.extractor_class.clone(),
                });
            }
        }

        if let (Some(extractor), Some(scorer)) = (&extractor, &scorer) {
            report.extend(validate_coverage(
                &self.extractor_class,
                &scorer_input_fields(scorer.as_ref()),
                &extractor_output_fields(extractor.as_ref()),
            ));
        }

        report.finish(MODEL_DEFINITION_SUMMARY)
    }

    /// Build the extractor this definition names.
    pub fn instantiate_extractor(
        &self,
        registry: &PhaseRegistry,
    ) -> std::result::Result<Arc<dyn Extractor>, ValidationError> {
        registry.instantiate_extractor(&self.extractor_class)
    }

    /// Build the scorer this definition names.
    pub fn instantiate_scorer(
        &self,
        registry: &PhaseRegistry,
    ) -> std::result::Result<Arc<dyn Scorer>, ValidationError> {
        registry.instantiate_scorer(&self.scorer_class)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn extractor_class(&self) -> &str {
        &self.extractor_class
    }

    pub fn scorer_class(&self) -> &str {
        &self.scorer_class
    }

    pub fn protocol_version(&self) -> &ProtocolVersion {
        &self.protocol_version
    }
}

/// Header-level view of a definition document, checked without resolving implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSummary {
    pub name: String,
    pub version: String,
    pub extractor_class: String,
    pub scorer_class: String,
    pub protocol_version: ProtocolVersion,
}

/// Decode a definition document and check everything that does not need a registry.
///
/// Covers the protocol gate, `name` and `version`. Useful to tools that have
/// no phase implementations linked in.
pub fn inspect_definition(json: &str) -> Result<DefinitionSummary> {
    let document: Value = serde_json::from_str(json)?;
    let protocol_version =
        read_protocol_version(&document, &MIN_MODEL_DEF_VERSION, &MAX_MODEL_DEF_VERSION)?;
    let record: ModelDefinitionRecord = serde_json::from_value(document)?;

    let mut report = ValidationReport::new();
    report.check(validate_name("name", &record.name));
    report.check(validate_version("version", &record.version));
    if record.extractor_class.is_empty() {
        report.push(ValidationError::EmptyField {
            field: "extractor_class".to_string(),
        });
    }
    if record.scorer_class.is_empty() {
        report.push(ValidationError::EmptyField {
            field: "scorer_class".to_string(),
        });
    }
    report
        .finish(MODEL_DEFINITION_SUMMARY)
        .map_err(ModelSpecError::Invalid)?;

    Ok(DefinitionSummary {
        name: record.name,
        version: record.version,
        extractor_class: record.extractor_class,
        scorer_class: record.scorer_class,
        protocol_version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ColumnCopyExtractor, FieldSumScorer};

    fn registry() -> PhaseRegistry {
        let mut registry = PhaseRegistry::new();
        registry
            .register_default_extractor::<ColumnCopyExtractor>("test.Copy")
            .unwrap();
        registry
            .register_default_scorer::<FieldSumScorer>("test.Sum")
            .unwrap();
        registry
    }

    #[test]
    fn test_new_stamps_current_version() {
        let def = ModelDefinition::new("m", "1.0", "test.Copy", "test.Sum", &registry()).unwrap();
        assert_eq!(def.protocol_version(), &CURRENT_MODEL_DEF_VERSION);
        assert_eq!(def.name(), "m");
        assert_eq!(def.extractor_class(), "test.Copy");
    }

    #[test]
    fn test_record_field_order_is_stable() {
        let def = ModelDefinition::new("m", "1.0", "test.Copy", "test.Sum", &registry()).unwrap();
        assert_eq!(
            def.to_json().unwrap(),
            r#"{"name":"m","version":"1.0","extractor_class":"test.Copy","scorer_class":"test.Sum","protocol_version":"model_definition-0.1.0"}"#
        );
    }

    #[test]
    fn test_with_new_settings_keeps_unset_fields() {
        let registry = registry();
        let def = ModelDefinition::new("m", "1.0", "test.Copy", "test.Sum", &registry).unwrap();
        let bumped = def
            .with_new_settings(
                ModelDefinitionOverrides {
                    version: Some("2.0".to_string()),
                    ..Default::default()
                },
                &registry,
            )
            .unwrap();
        assert_eq!(bumped.version(), "2.0");
        assert_eq!(bumped.name(), def.name());
        assert_eq!(def.version(), "1.0");

        let err = def
            .with_new_settings(
                ModelDefinitionOverrides {
                    name: Some(String::new()),
                    ..Default::default()
                },
                &registry,
            )
            .unwrap_err();
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_inspect_definition_without_registry() {
        let summary = inspect_definition(
            r#"{"name":"m","version":"1","extractor_class":"a.B","scorer_class":"c.D","protocol_version":"model_definition-0.1.0"}"#,
        )
        .unwrap();
        assert_eq!(summary.extractor_class, "a.B");

        let err = inspect_definition(
            r#"{"name":"","version":"x","extractor_class":"","scorer_class":"c.D","protocol_version":"model_definition-0.1.0"}"#,
        )
        .unwrap_err();
        assert_eq!(err.validation_errors().unwrap().len(), 3);
    }
}
