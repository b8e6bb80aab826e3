//! Extract and score phase capabilities.
//!
//! Implementations expose their field metadata through pure methods so the
//! validator can inspect them without running any computation. The compute
//! methods receive the key-value stores the runner bound for this execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kvstore::{BindingError, KeyValueStoreBinding, StoreError};

/// A named set of field values flowing between phases.
pub type FieldTuple = BTreeMap<String, Value>;

/// One stage of the model workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Extract,
    Score,
}

impl Phase {
    /// Name of the capability a type must implement to serve this phase.
    pub fn capability(&self) -> &'static str {
        match self {
            Phase::Extract => "Extractor",
            Phase::Score => "Scorer",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Extract => write!(f, "extract"),
            Phase::Score => write!(f, "score"),
        }
    }
}

/// Which fields a phase consumes or produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelector {
    /// Every available field. Reserved: an extractor may not consume all fields.
    All,
    /// An explicit, ordered list of field names.
    Named(Vec<String>),
    /// The phase emits exactly the fields it was given.
    ResultsEqualToInput,
}

impl FieldSelector {
    pub fn named<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSelector::Named(fields.into_iter().map(Into::into).collect())
    }

    /// Concrete field names; empty for the symbolic selectors.
    pub fn field_names(&self) -> &[String] {
        match self {
            FieldSelector::Named(fields) => fields,
            FieldSelector::All | FieldSelector::ResultsEqualToInput => &[],
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FieldSelector::All)
    }
}

/// Errors raised by a phase implementation while computing.
#[derive(Debug, thiserror::Error)]
pub enum PhaseError {
    #[error("missing input field '{0}'")]
    MissingField(String),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Failed(String),
}

/// Turns input store fields into intermediate tuple fields.
pub trait Extractor: Send + Sync {
    /// Fields this extractor reads, named by tuple field name.
    fn input_fields(&self) -> FieldSelector;

    /// Fields this extractor emits.
    fn output_fields(&self) -> FieldSelector;

    /// Logical names of the key-value stores this extractor reads.
    fn required_stores(&self) -> Vec<String> {
        Vec::new()
    }

    fn extract(
        &self,
        input: &FieldTuple,
        stores: &KeyValueStoreBinding,
    ) -> Result<FieldTuple, PhaseError>;
}

/// Consumes tuple fields and produces the final output value.
pub trait Scorer: Send + Sync {
    /// Fields this scorer reads, in declaration order.
    fn input_fields(&self) -> FieldSelector;

    /// Logical names of the key-value stores this scorer reads.
    fn required_stores(&self) -> Vec<String> {
        Vec::new()
    }

    fn score(&self, input: &FieldTuple, stores: &KeyValueStoreBinding)
        -> Result<Value, PhaseError>;
}

/// Fetch a required field from a tuple.
pub fn require_field<'a>(input: &'a FieldTuple, name: &str) -> Result<&'a Value, PhaseError> {
    input
        .get(name)
        .ok_or_else(|| PhaseError::MissingField(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_selector_names() {
        let selector = FieldSelector::named(["a", "b"]);
        assert_eq!(selector.field_names(), ["a".to_string(), "b".to_string()]);
        assert!(!selector.is_all());

        assert!(FieldSelector::All.field_names().is_empty());
        assert!(FieldSelector::All.is_all());
        assert!(FieldSelector::ResultsEqualToInput.field_names().is_empty());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Extract.to_string(), "extract");
        assert_eq!(Phase::Score.capability(), "Scorer");
        assert_eq!(serde_json::to_string(&Phase::Score).unwrap(), "\"score\"");
    }

    #[test]
    fn test_require_field() {
        let mut tuple = FieldTuple::new();
        tuple.insert("a".to_string(), Value::from(1));
        assert_eq!(require_field(&tuple, "a").unwrap(), &Value::from(1));
        let err = require_field(&tuple, "b").unwrap_err();
        assert_eq!(err.to_string(), "missing input field 'b'");
    }
}
