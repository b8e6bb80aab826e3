//! Shared validation rules and the report that aggregates their failures.
//!
//! Rule helpers return `Result<(), ValidationError>` or a list of errors and
//! never abort validation early; callers fold every outcome into one
//! [`ValidationReport`].

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ValidationError, ValidationErrors};
use crate::schema::Property;

/// Pattern for model, column-family and store names.
pub const IDENTIFIER_PATTERN: &str = r"^[a-zA-Z_][a-zA-Z0-9_]*$";

/// Pattern for model version strings.
pub const VERSION_PATTERN: &str = r"^[0-9]+(\.[0-9]+)*$";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern compiles"));

static VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(VERSION_PATTERN).expect("version pattern compiles"));

/// Accumulates rule failures for one construction attempt.
#[derive(Debug, Default)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the failure of a single rule, if it failed.
    pub fn check(&mut self, outcome: Result<(), ValidationError>) {
        if let Err(error) = outcome {
            self.errors.push(error);
        }
    }

    /// Keep the value of a rule that succeeded; record the failure otherwise.
    pub fn take<T>(&mut self, outcome: Result<T, ValidationError>) -> Option<T> {
        match outcome {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.push(error);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Close the report: `Ok` when no rule failed, otherwise the aggregate.
    pub fn finish(self, summary: &'static str) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors::new(summary, self.errors))
        }
    }
}

impl Extend<ValidationError> for ValidationReport {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

/// A non-empty identifier: `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// An empty value yields only the emptiness error, not a pattern error too.
pub fn validate_name(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    if !IDENTIFIER.is_match(value) {
        return Err(ValidationError::InvalidName {
            field: field.to_string(),
            value: value.to_string(),
            pattern: IDENTIFIER_PATTERN,
        });
    }
    Ok(())
}

/// A dotted numeric version such as `1`, `1.0` or `1.0.0`.
pub fn validate_version(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    if !VERSION.is_match(value) {
        return Err(ValidationError::InvalidVersion {
            field: field.to_string(),
            value: value.to_string(),
            pattern: VERSION_PATTERN,
        });
    }
    Ok(())
}

pub fn validate_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// A column address: `family` or `family:qualifier`.
///
/// The family must be an identifier; the qualifier, when present, must be
/// non-empty and may not contain a further `:`.
pub fn validate_column_address(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    let (family, qualifier) = match value.split_once(':') {
        Some((family, qualifier)) => (family, Some(qualifier)),
        None => (value, None),
    };
    let qualifier_ok = qualifier.map_or(true, |q| !q.is_empty() && !q.contains(':'));
    if !IDENTIFIER.is_match(family) || !qualifier_ok {
        return Err(ValidationError::InvalidColumn {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A syntactically valid absolute URI.
pub fn validate_uri(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::EmptyField {
            field: field.to_string(),
        });
    }
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|err| ValidationError::InvalidUri {
            field: field.to_string(),
            value: value.to_string(),
            reason: err.to_string(),
        })
}

/// One `Duplicate` error per value seen more than once, in first-repeat order.
pub fn find_duplicates<'a, I>(field: &str, values: I) -> Vec<ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut errors = Vec::new();
    for value in values {
        if !seen.insert(value) && reported.insert(value) {
            errors.push(ValidationError::Duplicate {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
    }
    errors
}

/// Property names must be unique and `required` must all be present.
pub fn validate_properties(
    field: &str,
    properties: &[Property],
    required: &[&str],
) -> Vec<ValidationError> {
    let mut errors = find_duplicates(field, properties.iter().map(|p| p.name.as_str()));
    for property in required {
        if !properties.iter().any(|p| p.name == *property) {
            errors.push(ValidationError::MissingProperty {
                field: field.to_string(),
                property: (*property).to_string(),
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "valid_name").is_ok());
        assert!(validate_name("name", "_private9").is_ok());

        let err = validate_name("name", "").unwrap_err();
        assert!(err.to_string().contains("empty"));

        for bad in ["in valid!", "9lives", "dash-name", "dotted.name"] {
            assert!(
                matches!(
                    validate_name("name", bad),
                    Err(ValidationError::InvalidName { .. })
                ),
                "{bad:?} should fail the pattern"
            );
        }
    }

    #[test]
    fn test_validate_version() {
        for good in ["1", "1.0", "1.0.0", "10.200.3000"] {
            assert!(validate_version("version", good).is_ok(), "{good}");
        }
        for bad in ["1.0.0-beta", "v1", "1.", ".1", "1..0"] {
            assert!(
                matches!(
                    validate_version("version", bad),
                    Err(ValidationError::InvalidVersion { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_column_address() {
        assert!(validate_column_address("col", "info").is_ok());
        assert!(validate_column_address("col", "info:email").is_ok());
        assert!(validate_column_address("col", "model:score.v2").is_ok());

        for bad in ["info:", ":email", "in fo:email", "a:b:c"] {
            assert!(
                matches!(
                    validate_column_address("col", bad),
                    Err(ValidationError::InvalidColumn { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(matches!(
            validate_column_address("col", ""),
            Err(ValidationError::EmptyField { .. })
        ));
    }

    #[test]
    fn test_validate_uri() {
        assert!(validate_uri("uri", "kiji://.env/default/users").is_ok());
        assert!(validate_uri("uri", "hdfs://namenode:8020/models").is_ok());
        assert!(matches!(
            validate_uri("uri", "not a uri"),
            Err(ValidationError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_find_duplicates_reports_each_value_once() {
        let errors = find_duplicates("bindings", ["x", "y", "x", "x", "y", "z"]);
        let values: Vec<String> = errors
            .iter()
            .map(|e| match e {
                ValidationError::Duplicate { value, .. } => value.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(values, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_validate_properties() {
        let properties = vec![Property::new("path", "/a"), Property::new("path", "/b")];
        let errors = validate_properties("store", &properties, &["path", "key_field"]);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::Duplicate { .. }));
        assert!(matches!(
            &errors[1],
            ValidationError::MissingProperty { property, .. } if property == "key_field"
        ));
    }

    #[test]
    fn test_report_finish() {
        let report = ValidationReport::new();
        assert!(report.finish("summary").is_ok());

        let mut report = ValidationReport::new();
        report.check(validate_name("name", ""));
        report.check(validate_version("version", "1.0"));
        assert_eq!(report.take(Ok::<_, ValidationError>(5)), Some(5));
        report.extend(find_duplicates("f", ["a", "a"]));
        let errors = report.finish("summary").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.summary(), "summary");
    }
}
