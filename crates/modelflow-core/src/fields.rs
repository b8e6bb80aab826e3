//! Cross-phase field coverage.
//!
//! Every field a scorer declares as input must be produced by the extractor.
//! Errors follow the scorer's declaration order so diagnostics are stable.

use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::phase::{Extractor, FieldSelector, Scorer};

/// Effective output field set of an extractor.
///
/// A pass-through extractor (`ResultsEqualToInput`) produces its declared
/// input fields. `All` names no concrete fields and so covers nothing.
pub fn extractor_output_fields(extractor: &dyn Extractor) -> BTreeSet<String> {
    let selector = match extractor.output_fields() {
        FieldSelector::ResultsEqualToInput => extractor.input_fields(),
        other => other,
    };
    selector.field_names().iter().cloned().collect()
}

/// Concrete input field sequence of a scorer.
pub fn scorer_input_fields(scorer: &dyn Scorer) -> Vec<String> {
    scorer.input_fields().field_names().to_vec()
}

/// One `UncoveredField` error per scorer input missing from the extractor outputs.
pub fn validate_coverage(
    extractor_name: &str,
    scorer_inputs: &[String],
    extractor_outputs: &BTreeSet<String>,
) -> Vec<ValidationError> {
    scorer_inputs
        .iter()
        .filter(|field| !extractor_outputs.contains(*field))
        .map(|field| ValidationError::UncoveredField {
            field: field.clone(),
            extractor: extractor_name.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::KeyValueStoreBinding;
    use crate::phase::{FieldTuple, PhaseError};
    use serde_json::Value;

    struct Declared {
        input: FieldSelector,
        output: FieldSelector,
    }

    impl Extractor for Declared {
        fn input_fields(&self) -> FieldSelector {
            self.input.clone()
        }

        fn output_fields(&self) -> FieldSelector {
            self.output.clone()
        }

        fn extract(
            &self,
            input: &FieldTuple,
            _stores: &KeyValueStoreBinding,
        ) -> Result<FieldTuple, PhaseError> {
            Ok(input.clone())
        }
    }

    struct Reads(FieldSelector);

    impl Scorer for Reads {
        fn input_fields(&self) -> FieldSelector {
            self.0.clone()
        }

        fn score(
            &self,
            _input: &FieldTuple,
            _stores: &KeyValueStoreBinding,
        ) -> Result<Value, PhaseError> {
            Ok(Value::Null)
        }
    }

    fn set(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_named_outputs() {
        let extractor = Declared {
            input: FieldSelector::named(["raw"]),
            output: FieldSelector::named(["a", "b"]),
        };
        assert_eq!(extractor_output_fields(&extractor), set(&["a", "b"]));
    }

    #[test]
    fn test_pass_through_uses_inputs() {
        let extractor = Declared {
            input: FieldSelector::named(["x", "y"]),
            output: FieldSelector::ResultsEqualToInput,
        };
        assert_eq!(extractor_output_fields(&extractor), set(&["x", "y"]));
    }

    #[test]
    fn test_coverage_passes_when_subset() {
        let outputs = set(&["a", "b"]);
        let scorer = Reads(FieldSelector::named(["a"]));
        assert!(validate_coverage("ex", &scorer_input_fields(&scorer), &outputs).is_empty());
    }

    #[test]
    fn test_coverage_names_missing_field() {
        let outputs = set(&["a", "b"]);
        let errors = validate_coverage("ex", &["c".to_string()], &outputs);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("'c'"));
    }

    #[test]
    fn test_coverage_errors_follow_scorer_order() {
        let outputs = set(&["b"]);
        let inputs = vec!["z".to_string(), "b".to_string(), "a".to_string()];
        let missing: Vec<String> = validate_coverage("ex", &inputs, &outputs)
            .into_iter()
            .map(|e| match e {
                ValidationError::UncoveredField { field, .. } => field,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(missing, vec!["z".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_scorer_consuming_all_requires_nothing() {
        let scorer = Reads(FieldSelector::All);
        assert!(scorer_input_fields(&scorer).is_empty());
    }
}
