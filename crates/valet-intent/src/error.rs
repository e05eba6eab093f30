//! Intent layer error types.
//!
//! All intent subsystems surface errors through [`IntentError`].  The two
//! failure kinds callers must distinguish are an *unknown label* (a healthy
//! classifier produced an intent the policy table does not know — degrade to
//! conversation) and an *unavailable classifier* (the external dependency is
//! down — fall back and retry later).  They are separate variants on purpose.

/// Unified error type for the intent layer.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// The intent label is not present in the policy registry.
    ///
    /// Callers treat this as conversational with a warning, never as a
    /// request failure.
    #[error("unknown intent: {intent}")]
    UnknownIntent { intent: String },

    /// The external classifier could not produce a result (transport
    /// failure, non-success status, or unusable output).
    #[error("classifier unavailable: {reason}")]
    Unavailable { reason: String },

    /// The classifier responded but its output could not be parsed into an
    /// [`crate::IntentResult`].
    #[error("failed to parse classifier output: {reason}")]
    ParseFailed { reason: String },

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for IntentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout the intent crate.
pub type Result<T> = std::result::Result<T, IntentError>;
