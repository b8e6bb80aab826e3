//! Error taxonomy for model configuration documents.
//!
//! Individual rule failures are [`ValidationError`]s. A single construction
//! attempt folds every failure it finds into one [`ValidationErrors`]
//! aggregate, which is the only validation error surfaced to callers.

use crate::phase::Phase;

/// Errors produced while parsing or gating a protocol version.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolVersionError {
    #[error("invalid protocol version '{input}': {reason}")]
    InvalidFormat { input: String, reason: String },

    #[error("protocol version {found} is not supported (supported range {min} to {max})")]
    Unsupported {
        found: String,
        min: String,
        max: String,
    },
}

/// A single violated validation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Protocol(#[from] ProtocolVersionError),

    #[error("{field} must not be empty")]
    EmptyField { field: String },

    #[error("{field} '{value}' is not a valid name (expected {pattern})")]
    InvalidName {
        field: String,
        value: String,
        pattern: &'static str,
    },

    #[error("{field} '{value}' is not a valid version (expected {pattern})")]
    InvalidVersion {
        field: String,
        value: String,
        pattern: &'static str,
    },

    #[error("{field} '{value}' is not a valid URI: {reason}")]
    InvalidUri {
        field: String,
        value: String,
        reason: String,
    },

    #[error("{field} '{value}' is not a valid column address (expected family or family:qualifier)")]
    InvalidColumn { field: String, value: String },

    #[error("type '{name}' is not registered")]
    TypeNotFound { name: String },

    #[error("type '{name}' does not implement {}", .phase.capability())]
    MissingCapability { name: String, phase: Phase },

    #[error("cannot instantiate '{name}': {reason}")]
    CannotInstantiate { name: String, reason: String },

    #[error("extractor '{name}' may not declare all fields as its input")]
    ExtractorConsumesAll { name: String },

    #[error("scorer input field '{field}' is not produced by extractor '{extractor}'")]
    UncoveredField { field: String, extractor: String },

    #[error("{field} min_timestamp ({min}) must be less than max_timestamp ({max})")]
    TimestampOrder { field: String, min: i64, max: i64 },

    #[error("{field} min_timestamp ({value}) must not be negative")]
    NegativeTimestamp { field: String, value: i64 },

    #[error("{field} max_versions must be at least 1, got {value}")]
    MaxVersions { field: String, value: i32 },

    #[error("{field} contains duplicate entry '{value}'")]
    Duplicate { field: String, value: String },

    #[error("{field} is missing required property '{property}'")]
    MissingProperty { field: String, property: String },

    #[error("{field} regex '{value}' does not compile: {reason}")]
    InvalidRegex {
        field: String,
        value: String,
        reason: String,
    },

    #[error("definition {field} '{definition}' does not match environment {field} '{environment}'")]
    Mismatch {
        field: String,
        definition: String,
        environment: String,
    },

    #[error("{phase} phase requires kv store '{store}' which is not configured")]
    MissingStore { phase: Phase, store: String },

    #[error("extractor input field '{field}' has no field binding")]
    UnboundField { field: String },
}

/// Summary attached to a failed model definition construction.
pub const MODEL_DEFINITION_SUMMARY: &str = "model definition failed validation";
/// Summary attached to a failed model environment construction.
pub const MODEL_ENVIRONMENT_SUMMARY: &str = "model environment failed validation";
/// Summary attached to a failed definition/environment pairing.
pub const MODEL_BUNDLE_SUMMARY: &str = "model definition and environment are incompatible";

/// Every rule violation found by one construction attempt.
///
/// Never empty: [`crate::validation::ValidationReport::finish`] only builds
/// one when at least one cause was recorded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{summary} ({} problem(s)):{}", .causes.len(), render_causes(.causes))]
pub struct ValidationErrors {
    summary: &'static str,
    causes: Vec<ValidationError>,
}

impl ValidationErrors {
    pub(crate) fn new(summary: &'static str, causes: Vec<ValidationError>) -> Self {
        debug_assert!(!causes.is_empty());
        Self { summary, causes }
    }

    /// The fixed summary message for the kind of object that failed.
    pub fn summary(&self) -> &'static str {
        self.summary
    }

    /// The individual rule violations, in the order they were found.
    pub fn causes(&self) -> &[ValidationError] {
        &self.causes
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}

fn render_causes(causes: &[ValidationError]) -> String {
    causes.iter().map(|cause| format!("\n  - {cause}")).collect()
}

/// Errors surfaced by loading or constructing a model document.
#[derive(Debug, thiserror::Error)]
pub enum ModelSpecError {
    #[error("malformed document: {0}")]
    MalformedDocument(#[from] serde_json::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolVersionError),

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),
}

impl ModelSpecError {
    /// Whether the document was rejected for carrying an out-of-window protocol version.
    pub fn is_version_unsupported(&self) -> bool {
        matches!(
            self,
            ModelSpecError::Protocol(ProtocolVersionError::Unsupported { .. })
        )
    }

    /// The aggregated rule violations, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ModelSpecError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type for model document operations.
pub type Result<T> = std::result::Result<T, ModelSpecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_display_lists_every_cause() {
        let errors = ValidationErrors::new(
            MODEL_DEFINITION_SUMMARY,
            vec![
                ValidationError::EmptyField {
                    field: "name".to_string(),
                },
                ValidationError::TypeNotFound {
                    name: "com.example.Missing".to_string(),
                },
            ],
        );

        let msg = errors.to_string();
        assert!(msg.starts_with(MODEL_DEFINITION_SUMMARY));
        assert!(msg.contains("2 problem(s)"));
        assert!(msg.contains("name must not be empty"));
        assert!(msg.contains("com.example.Missing"));
    }

    #[test]
    fn test_missing_capability_names_the_capability() {
        let err = ValidationError::MissingCapability {
            name: "example.Thing".to_string(),
            phase: Phase::Score,
        };
        assert_eq!(
            err.to_string(),
            "type 'example.Thing' does not implement Scorer"
        );
    }

    #[test]
    fn test_version_unsupported_is_distinct_from_malformed() {
        let malformed: ModelSpecError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(!malformed.is_version_unsupported());

        let unsupported = ModelSpecError::Protocol(ProtocolVersionError::Unsupported {
            found: "model_definition-0.2.0".to_string(),
            min: "model_definition-0.1.0".to_string(),
            max: "model_definition-0.1.0".to_string(),
        });
        assert!(unsupported.is_version_unsupported());
    }
}
