//! Modelflow Core Library
//!
//! Versioned model definitions and environments, cross-phase field
//! validation, and key-value store binding for extract/score workflows.

pub mod bundle;
pub mod error;
pub mod fakes;
pub mod fields;
pub mod kvstore;
pub mod model_definition;
pub mod model_environment;
pub mod obs;
pub mod phase;
pub mod protocol;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod telemetry;
pub mod validation;

pub use bundle::ModelBundle;

pub use error::{
    ModelSpecError, ProtocolVersionError, Result, ValidationError, ValidationErrors,
};

pub use kvstore::{
    BindingError, KeyValueReader, KeyValueStoreBinding, StoreError, StoreHandle, TypedStore,
};

pub use model_definition::{
    inspect_definition, DefinitionSummary, ModelDefinition, ModelDefinitionOverrides,
    CURRENT_MODEL_DEF_VERSION, MAX_MODEL_DEF_VERSION, MIN_MODEL_DEF_VERSION,
};

pub use model_environment::{
    ModelEnvironment, ModelEnvironmentOverrides, CURRENT_MODEL_ENV_VERSION,
    MAX_MODEL_ENV_VERSION, MIN_MODEL_ENV_VERSION,
};

pub use phase::{Extractor, FieldSelector, FieldTuple, Phase, PhaseError, Scorer};

pub use protocol::ProtocolVersion;

pub use registry::{InstantiationError, PhaseRegistry, RegistryError};

pub use runner::{
    BoundPhase, ExecutionEngine, ExecutionError, ModelRunner, PhaseCompletion, RunSummary,
    RunnerError, StoreOpener,
};

pub use schema::{
    ColumnFilter, ColumnSpec, DataRequest, ExtractEnvironment, FieldBinding, FilterType,
    KvStoreSpec, ModelDefinitionRecord, ModelEnvironmentRecord, Property, ScoreEnvironment,
    StoreType,
};

pub use telemetry::init_tracing;

/// Modelflow version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
