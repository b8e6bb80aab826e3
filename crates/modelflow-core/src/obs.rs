//! Structured observability hooks for model validation and phase runs.
//!
//! This module provides:
//! - Phase-scoped tracing spans via `phase_span`
//! - Emission functions for validation outcomes, store binding and phase lifecycle
//!
//! Every event carries a fixed `event = "..."` key so log pipelines can
//! filter on it regardless of message text.

use tracing::{debug, info, warn};

use crate::phase::Phase;

/// Span tagged with the model and phase, for instrumenting a phase run.
///
/// # Example
///
/// ```ignore
/// run_phase().instrument(phase_span("churn", Phase::Extract)).await
/// // tracing calls inside carry model = "churn", phase = "extract"
/// ```
pub fn phase_span(model: &str, phase: Phase) -> tracing::Span {
    tracing::info_span!("modelflow.phase", model = %model, phase = %phase)
}

pub fn emit_definition_validated(name: &str, version: &str) {
    debug!(event = "definition.validated", name = %name, version = %version);
}

pub fn emit_definition_rejected(name: &str, problems: usize) {
    warn!(event = "definition.rejected", name = %name, problems = problems);
}

pub fn emit_environment_validated(name: &str, version: &str, extract: bool, score: bool) {
    debug!(
        event = "environment.validated",
        name = %name,
        version = %version,
        extract_configured = extract,
        score_configured = score,
    );
}

pub fn emit_environment_rejected(name: &str, problems: usize) {
    warn!(event = "environment.rejected", name = %name, problems = problems);
}

/// Emit event: a kv store was opened for a phase.
pub fn emit_store_opened(phase: Phase, store: &str, store_type: &str) {
    debug!(event = "store.opened", phase = %phase, store = %store, store_type = %store_type);
}

/// Emit event: a phase's store binding was populated.
pub fn emit_stores_bound(phase: Phase, count: usize) {
    info!(event = "stores.bound", phase = %phase, count = count);
}

pub fn emit_phase_started(model: &str, phase: Phase) {
    info!(event = "phase.started", model = %model, phase = %phase);
}

/// Emit event: phase finished with row count and duration.
pub fn emit_phase_finished(model: &str, phase: Phase, rows: u64, duration_ms: u64) {
    info!(
        event = "phase.finished",
        model = %model,
        phase = %phase,
        rows = rows,
        duration_ms = duration_ms,
    );
}

/// Emit event: phase not configured in the environment, so not run.
pub fn emit_phase_skipped(model: &str, phase: Phase) {
    info!(event = "phase.skipped", model = %model, phase = %phase);
}

/// Emit event: phase failed (warning level).
pub fn emit_phase_failed(model: &str, phase: Phase, error: &dyn std::fmt::Display) {
    warn!(event = "phase.failed", model = %model, phase = %phase, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_span_create() {
        let span = phase_span("test-model", Phase::Score);
        let _entered = span.enter();
        emit_phase_started("test-model", Phase::Score);
    }
}
