//! Executor trait and outcome type.
//!
//! Every automation back-end implements [`Executor`].  The contract is
//! deliberate: `run` does **not** return a `Result`.  A target site timing
//! out, a login being rejected, a provider rate-limiting us — those are
//! expected operating conditions, expressed as a failed
//! [`ExecutionOutcome`] so the dispatcher can still write its ledger record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What one executor run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Whether the underlying automation succeeded.
    pub success: bool,
    /// Opaque structured payload (extracted data, provider response, ...).
    pub data: Value,
    /// Human-readable summary of what happened.
    pub message: String,
}

impl ExecutionOutcome {
    /// A successful outcome.
    pub fn ok(data: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: message.into(),
        }
    }

    /// A failed outcome. The failure is data, not an error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Core trait
// ---------------------------------------------------------------------------

/// The uniform automation back-end interface.
///
/// The dispatcher validates the request shape before calling `run`; the
/// executor owns its own timeouts and absorbs every execution-time failure
/// into the outcome.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Unique identifier for this executor instance (for logs).
    fn id(&self) -> &str;

    /// Run the automation with the given parameters.
    async fn run(&self, parameters: &Value) -> ExecutionOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_constructors() {
        let ok = ExecutionOutcome::ok(json!({"title": "x"}), "scraped");
        assert!(ok.success);
        assert_eq!(ok.data["title"].as_str(), Some("x"));

        let failed = ExecutionOutcome::failed("target timed out");
        assert!(!failed.success);
        assert!(failed.data.is_null());
        assert_eq!(failed.message, "target timed out");
    }
}
