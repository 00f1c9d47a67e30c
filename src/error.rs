use std::time::Duration;

use crate::run::RunId;

/// Errors surfaced to callers of the run registry and pool orchestrator.
///
/// Failures of an individual agent never appear here; the supervisor records
/// them as failed results instead.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Malformed input to `run_pool`; no run was created
    #[error("validation error: {0}")]
    Validation(String),

    /// `run_pool` was called outside a Tokio runtime; no run was created
    #[error("no async runtime available to run agents: {0}")]
    NoRuntime(String),

    /// No run is registered under this id
    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    /// An append that would break the run's result invariants
    #[error("rejected result for agent {agent_index} of run {run_id}: {reason}")]
    RejectedResult {
        run_id: RunId,
        agent_index: usize,
        reason: String,
    },

    /// The run did not complete before the wait deadline
    #[error("run {run_id} still incomplete after {waited:?} ({completed}/{total} agents reported)")]
    WaitTimeout {
        run_id: RunId,
        completed: usize,
        total: usize,
        waited: Duration,
    },
}

/// Result type for run operations
pub type RunResult<T> = Result<T, RunError>;
