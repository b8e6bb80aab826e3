//! Phase runner: binds opened stores to phase instances and hands them to
//! the execution engine.
//!
//! Store opening and execution are external collaborators, reached through
//! the [`StoreOpener`] and [`ExecutionEngine`] traits. A phase instance only
//! reaches the engine wrapped in a [`BoundPhase`], which the runner alone can
//! build, so a phase can never observe its stores before they are bound.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::Instrument;

use crate::bundle::ModelBundle;
use crate::error::ValidationError;
use crate::kvstore::{BindingError, KeyValueStoreBinding, StoreError, StoreHandle};
use crate::obs;
use crate::phase::{Extractor, FieldTuple, Phase, PhaseError, Scorer};
use crate::registry::PhaseRegistry;
use crate::schema::{ExtractEnvironment, KvStoreSpec, ScoreEnvironment};

/// Opens the key-value stores an environment names.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    /// Open the store described by `spec`.
    ///
    /// Returns `StoreError::Unavailable` if the store cannot be reached.
    async fn open(&self, spec: &KvStoreSpec) -> Result<StoreHandle, StoreError>;
}

/// Errors raised by the execution engine.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("execution engine failure: {0}")]
    Engine(String),
}

/// Outcome of one committed phase execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCompletion {
    pub phase: Phase,
    pub rows: u64,
}

/// Runs bound phases over the dataset.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn run_extract(
        &self,
        phase: &BoundPhase<dyn Extractor>,
        env: &ExtractEnvironment,
    ) -> Result<PhaseCompletion, ExecutionError>;

    async fn run_score(
        &self,
        phase: &BoundPhase<dyn Scorer>,
        env: &ScoreEnvironment,
    ) -> Result<PhaseCompletion, ExecutionError>;
}

/// A phase instance together with the stores the runner bound for it.
pub struct BoundPhase<P: ?Sized> {
    phase: Arc<P>,
    stores: Arc<KeyValueStoreBinding>,
}

impl<P: ?Sized> BoundPhase<P> {
    fn new(phase: Arc<P>, stores: Arc<KeyValueStoreBinding>) -> Self {
        Self { phase, stores }
    }

    pub fn phase(&self) -> &P {
        &self.phase
    }

    pub fn stores(&self) -> &KeyValueStoreBinding {
        &self.stores
    }
}

impl BoundPhase<dyn Extractor> {
    pub fn extract(&self, input: &FieldTuple) -> Result<FieldTuple, PhaseError> {
        self.phase.extract(input, &self.stores)
    }
}

impl BoundPhase<dyn Scorer> {
    pub fn score(&self, input: &FieldTuple) -> Result<serde_json::Value, PhaseError> {
        self.phase.score(input, &self.stores)
    }
}

/// Errors raised while running a model.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Instantiation(#[from] ValidationError),

    #[error("{phase} phase could not open kv store '{name}': {source}")]
    StoreOpen {
        phase: Phase,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("{phase} phase failed: {source}")]
    Execution {
        phase: Phase,
        #[source]
        source: ExecutionError,
    },
}

/// Completions of the phases that ran. `None` means the phase was not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub extract: Option<PhaseCompletion>,
    pub score: Option<PhaseCompletion>,
}

/// Wires registry, store opener and execution engine together.
pub struct ModelRunner {
    registry: Arc<PhaseRegistry>,
    opener: Arc<dyn StoreOpener>,
    engine: Arc<dyn ExecutionEngine>,
}

impl ModelRunner {
    pub fn new(
        registry: Arc<PhaseRegistry>,
        opener: Arc<dyn StoreOpener>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Self {
        Self {
            registry,
            opener,
            engine,
        }
    }

    /// Run the extract phase, or skip it when the environment has none.
    pub async fn run_extract(
        &self,
        bundle: &ModelBundle,
    ) -> Result<Option<PhaseCompletion>, RunnerError> {
        let model = bundle.definition().name();
        let Some(env) = bundle.environment().extract_environment() else {
            obs::emit_phase_skipped(model, Phase::Extract);
            return Ok(None);
        };

        async {
            let extractor = bundle.definition().instantiate_extractor(&self.registry)?;
            let stores = self.bind_stores(Phase::Extract, &env.kv_stores).await?;
            let bound = BoundPhase::new(extractor, stores);
            self.execute(model, Phase::Extract, self.engine.run_extract(&bound, env))
                .await
                .map(Some)
        }
        .instrument(obs::phase_span(model, Phase::Extract))
        .await
    }

    /// Run the score phase, or skip it when the environment has none.
    pub async fn run_score(
        &self,
        bundle: &ModelBundle,
    ) -> Result<Option<PhaseCompletion>, RunnerError> {
        let model = bundle.definition().name();
        let Some(env) = bundle.environment().score_environment() else {
            obs::emit_phase_skipped(model, Phase::Score);
            return Ok(None);
        };

        async {
            let scorer = bundle.definition().instantiate_scorer(&self.registry)?;
            let stores = self.bind_stores(Phase::Score, &env.kv_stores).await?;
            let bound = BoundPhase::new(scorer, stores);
            self.execute(model, Phase::Score, self.engine.run_score(&bound, env))
                .await
                .map(Some)
        }
        .instrument(obs::phase_span(model, Phase::Score))
        .await
    }

    /// Run extract and then score. Stops at the first failing phase.
    pub async fn run_all(&self, bundle: &ModelBundle) -> Result<RunSummary, RunnerError> {
        let extract = self.run_extract(bundle).await?;
        let score = self.run_score(bundle).await?;
        Ok(RunSummary { extract, score })
    }

    /// Open every store of a phase into a fresh binding.
    ///
    /// Each call builds its own binding, so phase instances never share one.
    async fn bind_stores(
        &self,
        phase: Phase,
        specs: &[KvStoreSpec],
    ) -> Result<Arc<KeyValueStoreBinding>, RunnerError> {
        let mut opened = HashMap::with_capacity(specs.len());
        for spec in specs {
            let handle = self
                .opener
                .open(spec)
                .await
                .map_err(|source| RunnerError::StoreOpen {
                    phase,
                    name: spec.name.clone(),
                    source,
                })?;
            obs::emit_store_opened(phase, &spec.name, spec.store_type.as_str());
            opened.insert(spec.name.clone(), handle);
        }

        let binding = KeyValueStoreBinding::new();
        binding.set_all(opened)?;
        obs::emit_stores_bound(phase, specs.len());
        Ok(Arc::new(binding))
    }

    async fn execute<F>(
        &self,
        model: &str,
        phase: Phase,
        run: F,
    ) -> Result<PhaseCompletion, RunnerError>
    where
        F: Future<Output = Result<PhaseCompletion, ExecutionError>>,
    {
        obs::emit_phase_started(model, phase);
        let started = Instant::now();
        match run.await {
            Ok(completion) => {
                let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                obs::emit_phase_finished(model, phase, completion.rows, duration_ms);
                Ok(completion)
            }
            Err(source) => {
                obs::emit_phase_failed(model, phase, &source);
                Err(RunnerError::Execution { phase, source })
            }
        }
    }
}
