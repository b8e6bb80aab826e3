//! Registry of extractor and scorer implementations.
//!
//! Documents name their phase implementations by string identifier. The
//! registry maps each identifier to factories for the capabilities it was
//! registered under, and is populated at program start.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::phase::{Extractor, Phase, Scorer};

/// A factory could not produce an instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InstantiationError(pub String);

/// Errors raised while populating a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{capability} '{name}' is already registered")]
    Duplicate {
        name: String,
        capability: &'static str,
    },

    #[error("registration name must not be empty")]
    EmptyName,
}

pub type ExtractorFactory =
    Arc<dyn Fn() -> Result<Arc<dyn Extractor>, InstantiationError> + Send + Sync>;
pub type ScorerFactory = Arc<dyn Fn() -> Result<Arc<dyn Scorer>, InstantiationError> + Send + Sync>;

#[derive(Clone, Default)]
struct Registration {
    extractor: Option<ExtractorFactory>,
    scorer: Option<ScorerFactory>,
}

/// In-memory phase implementation registry.
#[derive(Clone, Default)]
pub struct PhaseRegistry {
    entries: HashMap<String, Registration>,
}

impl PhaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_extractor<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<Arc<dyn Extractor>, InstantiationError> + Send + Sync + 'static,
    {
        let entry = self.entry(name.into(), Phase::Extract, |r| r.extractor.is_some())?;
        entry.extractor = Some(Arc::new(factory));
        Ok(())
    }

    pub fn register_scorer<F>(
        &mut self,
        name: impl Into<String>,
        factory: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<Arc<dyn Scorer>, InstantiationError> + Send + Sync + 'static,
    {
        let entry = self.entry(name.into(), Phase::Score, |r| r.scorer.is_some())?;
        entry.scorer = Some(Arc::new(factory));
        Ok(())
    }

    /// Register an extractor that is built with `Default`.
    pub fn register_default_extractor<T>(&mut self, name: impl Into<String>) -> Result<(), RegistryError>
    where
        T: Extractor + Default + 'static,
    {
        self.register_extractor(name, || Ok(Arc::new(T::default()) as Arc<dyn Extractor>))
    }

    /// Register a scorer that is built with `Default`.
    pub fn register_default_scorer<T>(&mut self, name: impl Into<String>) -> Result<(), RegistryError>
    where
        T: Scorer + Default + 'static,
    {
        self.register_scorer(name, || Ok(Arc::new(T::default()) as Arc<dyn Scorer>))
    }

    fn entry(
        &mut self,
        name: String,
        phase: Phase,
        taken: impl Fn(&Registration) -> bool,
    ) -> Result<&mut Registration, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.entries.get(&name).is_some_and(&taken) {
            return Err(RegistryError::Duplicate {
                name,
                capability: phase.capability(),
            });
        }
        Ok(self.entries.entry(name).or_default())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve `name` as an extractor and build an instance.
    ///
    /// # Errors
    ///
    /// - `ValidationError::TypeNotFound`: nothing is registered under `name`.
    /// - `ValidationError::MissingCapability`: `name` is not an extractor.
    /// - `ValidationError::CannotInstantiate`: the factory failed.
    pub fn instantiate_extractor(&self, name: &str) -> Result<Arc<dyn Extractor>, ValidationError> {
        let factory = self
            .resolve(name)?
            .extractor
            .as_ref()
            .ok_or_else(|| ValidationError::MissingCapability {
                name: name.to_string(),
                phase: Phase::Extract,
            })?;
        factory().map_err(|err| ValidationError::CannotInstantiate {
            name: name.to_string(),
            reason: err.to_string(),
        })
    }

    /// Resolve `name` as a scorer and build an instance.
    ///
    /// # Errors
    ///
    /// As for [`instantiate_extractor`](Self::instantiate_extractor).
    pub fn instantiate_scorer(&self, name: &str) -> Result<Arc<dyn Scorer>, ValidationError> {
        let factory = self
            .resolve(name)?
            .scorer
            .as_ref()
            .ok_or_else(|| ValidationError::MissingCapability {
                name: name.to_string(),
                phase: Phase::Score,
            })?;
        factory().map_err(|err| ValidationError::CannotInstantiate {
            name: name.to_string(),
            reason: err.to_string(),
        })
    }

    fn resolve(&self, name: &str) -> Result<&Registration, ValidationError> {
        self.entries
            .get(name)
            .ok_or_else(|| ValidationError::TypeNotFound {
                name: name.to_string(),
            })
    }
}

impl fmt::Debug for PhaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvstore::KeyValueStoreBinding;
    use crate::phase::{FieldSelector, FieldTuple, PhaseError};

    #[derive(Default)]
    struct Noop;

    impl Extractor for Noop {
        fn input_fields(&self) -> FieldSelector {
            FieldSelector::named(["a"])
        }

        fn output_fields(&self) -> FieldSelector {
            FieldSelector::ResultsEqualToInput
        }

        fn extract(
            &self,
            input: &FieldTuple,
            _stores: &KeyValueStoreBinding,
        ) -> Result<FieldTuple, PhaseError> {
            Ok(input.clone())
        }
    }

    #[test]
    fn test_instantiate_registered_extractor() {
        let mut registry = PhaseRegistry::new();
        registry
            .register_default_extractor::<Noop>("test.Noop")
            .unwrap();
        assert!(registry.contains("test.Noop"));
        let extractor = registry.instantiate_extractor("test.Noop").ok().unwrap();
        assert_eq!(extractor.input_fields(), FieldSelector::named(["a"]));
    }

    #[test]
    fn test_unknown_name_is_type_not_found() {
        let registry = PhaseRegistry::new();
        let err = registry.instantiate_extractor("test.Missing").err().unwrap();
        assert_eq!(
            err,
            ValidationError::TypeNotFound {
                name: "test.Missing".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_capability() {
        let mut registry = PhaseRegistry::new();
        registry
            .register_default_extractor::<Noop>("test.Noop")
            .unwrap();
        let err = registry.instantiate_scorer("test.Noop").err().unwrap();
        assert!(matches!(
            err,
            ValidationError::MissingCapability {
                phase: Phase::Score,
                ..
            }
        ));
    }

    #[test]
    fn test_failing_factory_is_cannot_instantiate() {
        let mut registry = PhaseRegistry::new();
        registry
            .register_extractor("test.Broken", || {
                Err(InstantiationError("constructor panicked".to_string()))
            })
            .unwrap();
        let err = registry.instantiate_extractor("test.Broken").err().unwrap();
        assert!(err.to_string().starts_with("cannot instantiate 'test.Broken'"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = PhaseRegistry::new();
        registry
            .register_default_extractor::<Noop>("test.Noop")
            .unwrap();
        let err = registry
            .register_default_extractor::<Noop>("test.Noop")
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
        assert_eq!(
            registry.register_default_extractor::<Noop>(""),
            Err(RegistryError::EmptyName)
        );
    }
}
