//! Automation dispatcher.
//!
//! The dispatcher is the single entry point for running automation, from
//! both the direct-execution chat path and the post-approval path.  Its
//! rules:
//!
//! 1. The automation type must parse against the closed allow-list —
//!    rejected **before** any executor is looked up or invoked.
//! 2. Required parameters are validated per type — a malformed request is a
//!    client error, distinct from a failed execution.
//! 3. The executor call is timed wall-clock and its outcome — success or
//!    failure — is written to the ledger.  The ledger records attempts, not
//!    just successes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use valet_store::{AutomationRecord, HistoryStore};

use crate::error::{AutomationError, Result};
use crate::kind::AutomationType;
use crate::traits::{ExecutionOutcome, Executor};

/// Routes automation requests to executors and keeps the ledger.
pub struct Dispatcher {
    executors: HashMap<AutomationType, Arc<dyn Executor>>,
    history: HistoryStore,
}

impl Dispatcher {
    /// Create a dispatcher with no executors registered.
    pub fn new(history: HistoryStore) -> Self {
        Self {
            executors: HashMap::new(),
            history,
        }
    }

    /// Register an executor for an automation type.
    ///
    /// Registration happens once at startup; the same executor instance may
    /// back several types.
    pub fn register(&mut self, kind: AutomationType, executor: Arc<dyn Executor>) {
        info!(automation_type = %kind, executor = executor.id(), "executor registered");
        self.executors.insert(kind, executor);
    }

    /// Whether an executor is registered for the type.
    pub fn has_executor(&self, kind: AutomationType) -> bool {
        self.executors.contains_key(&kind)
    }

    /// Validate and run one automation, writing a ledger record.
    ///
    /// Structural problems (unknown type, missing parameters) fail before
    /// any executor is invoked and write nothing.  Once the request is
    /// valid, a record is written and returned regardless of whether the
    /// underlying automation succeeded.
    pub async fn execute(
        &self,
        automation_type: &str,
        parameters: Value,
        session_id: &str,
    ) -> Result<AutomationRecord> {
        let kind: AutomationType =
            automation_type
                .parse()
                .map_err(|()| AutomationError::UnsupportedType {
                    automation_type: automation_type.to_string(),
                })?;

        validate_params(kind, &parameters)?;

        let started = Instant::now();
        let outcome = match self.executors.get(&kind) {
            Some(executor) => executor.run(&parameters).await,
            None => {
                warn!(automation_type = %kind, "no executor registered");
                ExecutionOutcome::failed(format!("no executor registered for {kind}"))
            }
        };
        let execution_time = started.elapsed().as_secs_f64();

        if outcome.success {
            info!(
                automation_type = %kind,
                session_id = %session_id,
                execution_time = execution_time,
                "automation succeeded"
            );
        } else {
            warn!(
                automation_type = %kind,
                session_id = %session_id,
                execution_time = execution_time,
                message = %outcome.message,
                "automation failed"
            );
        }

        let record = AutomationRecord {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            automation_type: kind.as_str().to_string(),
            parameters,
            result: outcome.data,
            success: outcome.success,
            message: outcome.message,
            execution_time,
            created_at: Utc::now(),
        };

        self.history.append_automation(&record).await?;
        Ok(record)
    }
}

/// Check the per-type required parameters.
fn validate_params(kind: AutomationType, parameters: &Value) -> Result<()> {
    for name in kind.required_params() {
        let present = match parameters.get(name) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };

        if !present {
            return Err(AutomationError::MissingParameter {
                automation_type: kind.as_str().to_string(),
                parameter: name,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
