//! Pairing a definition with the environment it runs in.

use std::collections::BTreeSet;

use crate::error::{ValidationError, ValidationErrors, MODEL_BUNDLE_SUMMARY};
use crate::model_definition::ModelDefinition;
use crate::model_environment::ModelEnvironment;
use crate::phase::Phase;
use crate::registry::PhaseRegistry;
use crate::schema::KvStoreSpec;
use crate::validation::ValidationReport;

/// A definition and environment that have been checked against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBundle {
    definition: ModelDefinition,
    environment: ModelEnvironment,
}

impl ModelBundle {
    /// Check that `environment` can host `definition`.
    ///
    /// Both halves are already valid on their own; this adds the rules that
    /// span them:
    /// - `name` and `version` agree;
    /// - every store a phase requires is configured for that phase;
    /// - every named extractor input has a field binding.
    ///
    /// # Errors
    ///
    /// Every violated rule, aggregated.
    pub fn new(
        definition: ModelDefinition,
        environment: ModelEnvironment,
        registry: &PhaseRegistry,
    ) -> Result<Self, ValidationErrors> {
        let mut report = ValidationReport::new();

        if definition.name() != environment.name() {
            report.push(ValidationError::Mismatch {
                field: "name".to_string(),
                definition: definition.name().to_string(),
                environment: environment.name().to_string(),
            });
        }
        if definition.version() != environment.version() {
            report.push(ValidationError::Mismatch {
                field: "version".to_string(),
                definition: definition.version().to_string(),
                environment: environment.version().to_string(),
            });
        }

        let extract = environment.extract_environment();
        if let Some(extractor) = report.take(definition.instantiate_extractor(registry)) {
            report.extend(missing_stores(
                Phase::Extract,
                &extractor.required_stores(),
                extract.map(|env| env.kv_stores.as_slice()),
            ));

            if let Some(env) = extract {
                let bound: BTreeSet<&str> = env
                    .field_bindings
                    .iter()
                    .map(|b| b.tuple_field_name.as_str())
                    .collect();
                for field in extractor.input_fields().field_names() {
                    if !bound.contains(field.as_str()) {
                        report.push(ValidationError::UnboundField {
                            field: field.clone(),
                        });
                    }
                }
            }
        }

        if let Some(scorer) = report.take(definition.instantiate_scorer(registry)) {
            report.extend(missing_stores(
                Phase::Score,
                &scorer.required_stores(),
                environment
                    .score_environment()
                    .map(|env| env.kv_stores.as_slice()),
            ));
        }

        report.finish(MODEL_BUNDLE_SUMMARY)?;
        Ok(Self {
            definition,
            environment,
        })
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn environment(&self) -> &ModelEnvironment {
        &self.environment
    }

    pub fn into_parts(self) -> (ModelDefinition, ModelEnvironment) {
        (self.definition, self.environment)
    }
}

fn missing_stores(
    phase: Phase,
    required: &[String],
    configured: Option<&[KvStoreSpec]>,
) -> Vec<ValidationError> {
    let configured = configured.unwrap_or_default();
    required
        .iter()
        .filter(|store| !configured.iter().any(|spec| &spec.name == *store))
        .map(|store| ValidationError::MissingStore {
            phase,
            store: store.clone(),
        })
        .collect()
}
