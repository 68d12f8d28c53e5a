//! Engine error taxonomy
//!
//! Every error a run can hit is contained within the run's lifecycle and
//! surfaces as the execution's error message; nothing here ever crashes
//! the hosting process.

use thiserror::Error;

use crate::definition::DefinitionError;
use crate::runner::TaskError;

/// Errors produced while driving a run through the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Git clone exited non-zero; carries the captured diagnostics.
    #[error("git clone failed: {0}")]
    CloneFailed(String),

    /// Git clone exceeded the configured time budget.
    #[error("git clone timed out after {0} seconds")]
    CloneTimedOut(u64),

    /// The clone succeeded but the definition file was not there.
    #[error("definition file not found in repository: {0}")]
    DefinitionFileMissing(String),

    /// The definition text failed schema validation.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// A task failed to execute; see [`TaskError`] for the reasons.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// The run was cancelled while this operation was in flight.
    #[error("execution cancelled")]
    Cancelled,

    /// Anything unexpected; caught at the run boundary and recorded.
    #[error("{0}")]
    Internal(String),
}
