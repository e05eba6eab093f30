//! Engine error taxonomy.
//!
//! Structural and validation failures carry a distinguishing variant so the
//! API boundary can map them to precise status codes.  Execution-time
//! failures of the underlying automation never appear here — they are data
//! on the automation record.

use crate::pending::ActionStatus;

/// Unified error type for the workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The pending action id is unknown, or was invalidated by a session
    /// clear.  Client error (not-found).
    #[error("pending action not found: {id}")]
    ActionNotFound { id: String },

    /// The pending action already reached a terminal status.  Conflict —
    /// a correctly surfaced race, not a bug.
    #[error("pending action {id} already decided: {status}")]
    AlreadyDecided { id: String, status: ActionStatus },

    /// An error propagated from the intent layer.
    #[error("intent error: {0}")]
    Intent(#[from] valet_intent::IntentError),

    /// An error propagated from the automation layer.
    #[error("automation error: {0}")]
    Automation(#[from] valet_automation::AutomationError),

    /// An error propagated from the storage layer.
    #[error("store error: {0}")]
    Store(#[from] valet_store::StoreError),
}

/// Convenience alias used throughout the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;
