//! In-memory fakes for the runner seams and sample phases (testing only)
//!
//! Provides `MemoryStore`, `MemoryStoreOpener` and `MemoryEngine`, which
//! satisfy the store and engine contracts without touching any real table,
//! plus a few small extractors and scorers to register in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::kvstore::{KeyValueReader, KeyValueStoreBinding, StoreError, StoreHandle};
use crate::phase::{require_field, Extractor, FieldSelector, FieldTuple, Phase, PhaseError, Scorer};
use crate::runner::{BoundPhase, ExecutionEngine, ExecutionError, PhaseCompletion, StoreOpener};
use crate::schema::{ExtractEnvironment, KvStoreSpec, ScoreEnvironment};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Read-only store backed by a `HashMap` keyed on the canonical JSON of the key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn from_entries(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }
}

impl KeyValueReader for MemoryStore {
    fn get(&self, key: &Value) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.get(&key.to_string()).cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryStoreOpener
// ---------------------------------------------------------------------------

/// Opens stores from a fixed name → handle table. Unknown names are unavailable.
#[derive(Default)]
pub struct MemoryStoreOpener {
    stores: HashMap<String, StoreHandle>,
    opened: Mutex<Vec<String>>,
}

impl MemoryStoreOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, name: impl Into<String>, handle: StoreHandle) -> Self {
        self.stores.insert(name.into(), handle);
        self
    }

    /// Names of the stores opened so far, in call order.
    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl StoreOpener for MemoryStoreOpener {
    async fn open(&self, spec: &KvStoreSpec) -> Result<StoreHandle, StoreError> {
        let handle = self
            .stores
            .get(&spec.name)
            .cloned()
            .ok_or_else(|| StoreError::Unavailable {
                name: spec.name.clone(),
                reason: format!("no in-memory {} store registered", spec.store_type),
            })?;
        lock(&self.opened).push(spec.name.clone());
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// MemoryEngine
// ---------------------------------------------------------------------------

/// Runs phases over a fixed list of input rows, keyed by store field name.
///
/// Extract maps each row through the environment's field bindings and keeps
/// the results. Score runs over the extracted tuples, or over the raw rows if
/// nothing was extracted yet.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    rows: Vec<FieldTuple>,
    extracted: Mutex<Vec<FieldTuple>>,
    scores: Mutex<Vec<Value>>,
}

impl MemoryEngine {
    pub fn new(rows: Vec<FieldTuple>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn extracted(&self) -> Vec<FieldTuple> {
        lock(&self.extracted).clone()
    }

    pub fn scores(&self) -> Vec<Value> {
        lock(&self.scores).clone()
    }

    fn bind_row(row: &FieldTuple, env: &ExtractEnvironment) -> FieldTuple {
        if env.field_bindings.is_empty() {
            return row.clone();
        }
        env.field_bindings
            .iter()
            .filter_map(|binding| {
                row.get(&binding.store_field_name)
                    .map(|value| (binding.tuple_field_name.clone(), value.clone()))
            })
            .collect()
    }
}

#[async_trait]
impl ExecutionEngine for MemoryEngine {
    async fn run_extract(
        &self,
        phase: &BoundPhase<dyn Extractor>,
        env: &ExtractEnvironment,
    ) -> Result<PhaseCompletion, ExecutionError> {
        let mut outputs = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            outputs.push(phase.extract(&Self::bind_row(row, env))?);
        }
        let rows = outputs.len() as u64;
        *lock(&self.extracted) = outputs;
        Ok(PhaseCompletion {
            phase: Phase::Extract,
            rows,
        })
    }

    async fn run_score(
        &self,
        phase: &BoundPhase<dyn Scorer>,
        _env: &ScoreEnvironment,
    ) -> Result<PhaseCompletion, ExecutionError> {
        let extracted = self.extracted();
        let inputs = if extracted.is_empty() {
            &self.rows
        } else {
            &extracted
        };

        let mut scores = Vec::with_capacity(inputs.len());
        for input in inputs {
            scores.push(phase.score(input)?);
        }
        let rows = scores.len() as u64;
        lock(&self.scores).extend(scores);
        Ok(PhaseCompletion {
            phase: Phase::Score,
            rows,
        })
    }
}

// ---------------------------------------------------------------------------
// Sample phases
// ---------------------------------------------------------------------------

fn as_f64(input: &FieldTuple, field: &str) -> Result<f64, PhaseError> {
    require_field(input, field)?
        .as_f64()
        .ok_or_else(|| PhaseError::Failed(format!("field '{field}' is not numeric")))
}

/// Copies fields `a` and `b` through unchanged.
#[derive(Debug, Default)]
pub struct ColumnCopyExtractor;

impl Extractor for ColumnCopyExtractor {
    fn input_fields(&self) -> FieldSelector {
        FieldSelector::named(["a", "b"])
    }

    fn output_fields(&self) -> FieldSelector {
        FieldSelector::ResultsEqualToInput
    }

    fn extract(
        &self,
        input: &FieldTuple,
        _stores: &KeyValueStoreBinding,
    ) -> Result<FieldTuple, PhaseError> {
        ["a", "b"]
            .into_iter()
            .map(|field| Ok((field.to_string(), require_field(input, field)?.clone())))
            .collect()
    }
}

/// Scores `a + b`.
#[derive(Debug, Default)]
pub struct FieldSumScorer;

impl Scorer for FieldSumScorer {
    fn input_fields(&self) -> FieldSelector {
        FieldSelector::named(["a", "b"])
    }

    fn score(&self, input: &FieldTuple, _stores: &KeyValueStoreBinding) -> Result<Value, PhaseError> {
        Ok(Value::from(as_f64(input, "a")? + as_f64(input, "b")?))
    }
}

/// Scores `a * weights["a"] + b * weights["b"]`, reading the `weights` store.
#[derive(Debug, Default)]
pub struct WeightedSumScorer;

impl WeightedSumScorer {
    pub const STORE: &'static str = "weights";
}

impl Scorer for WeightedSumScorer {
    fn input_fields(&self) -> FieldSelector {
        FieldSelector::named(["a", "b"])
    }

    fn required_stores(&self) -> Vec<String> {
        vec![Self::STORE.to_string()]
    }

    fn score(&self, input: &FieldTuple, stores: &KeyValueStoreBinding) -> Result<Value, PhaseError> {
        let weights = stores.typed::<String, f64>(Self::STORE)?;
        let mut total = 0.0;
        for field in ["a", "b"] {
            let weight = weights
                .get(&field.to_string())?
                .ok_or_else(|| PhaseError::Failed(format!("no weight for '{field}'")))?;
            total += as_f64(input, field)? * weight;
        }
        Ok(Value::from(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lookup() {
        let store = MemoryStore::from_entries([(Value::from("k"), Value::from(7))]);
        assert_eq!(store.get(&Value::from("k")).unwrap(), Some(Value::from(7)));
        assert!(!store.contains_key(&Value::from("other")).unwrap());
    }

    #[test]
    fn test_field_sum_scorer() {
        let input = FieldTuple::from([
            ("a".to_string(), Value::from(1.5)),
            ("b".to_string(), Value::from(2)),
        ]);
        let score = FieldSumScorer
            .score(&input, &KeyValueStoreBinding::new())
            .unwrap();
        assert_eq!(score, Value::from(3.5));
    }

    #[test]
    fn test_weighted_scorer_needs_bound_stores() {
        let input = FieldTuple::from([
            ("a".to_string(), Value::from(1)),
            ("b".to_string(), Value::from(1)),
        ]);
        let err = WeightedSumScorer
            .score(&input, &KeyValueStoreBinding::new())
            .unwrap_err();
        assert!(matches!(err, PhaseError::Binding(_)));
    }
}
