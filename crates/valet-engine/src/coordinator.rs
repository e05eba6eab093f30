//! Workflow coordinator — the per-turn state machine.
//!
//! One inbound message moves `Classified → {Answered | AwaitingApproval |
//! Dispatched}`; a pending action later moves `AwaitingApproval →
//! {Approved → Dispatched | Rejected → Cancelled}`.  No state regresses,
//! and every pending action reaches exactly one terminal state exactly once
//! (enforced by [`PendingActionStore::claim_decision`]).
//!
//! The coordinator holds no lock across the classifier or executor awaits;
//! shared state is touched only to record outcomes.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use valet_automation::Dispatcher;
use valet_intent::{
    Classifier, IntentError, IntentPolicy, IntentResult, PolicyRegistry, SessionContext, SlotMap,
};
use valet_store::{AutomationRecord, ChatTurn, HistoryStore};

use crate::error::Result;
use crate::pending::{ActionStatus, PendingAction, PendingActionStore};

/// How many prior turns are handed to the classifier as context.
const CONTEXT_TURNS: usize = 6;

/// Fallback reply when the classifier is unreachable.
const CLASSIFIER_DOWN_REPLY: &str =
    "I'm having trouble understanding messages right now. Please try again in a moment.";

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// The result of an approve/reject decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    /// The decided action id.
    pub action_id: String,
    /// Whether the decision was an approval.
    pub approved: bool,
    /// The terminal status the action reached.
    pub status: ActionStatus,
    /// Human-readable acknowledgment.
    pub message: String,
    /// The ledger record, when an approval dispatched automation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AutomationRecord>,
}

/// Support status for an intent label, for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationStatusReport {
    /// The queried intent label.
    pub intent: String,
    /// Human-readable status line.
    pub status_message: String,
    /// Whether the label names a known direct-execution intent.
    pub is_direct_automation: bool,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Glues classifier, policy registry, pending actions, dispatcher, and
/// history into the request path.
pub struct WorkflowCoordinator {
    classifier: Arc<dyn Classifier>,
    registry: PolicyRegistry,
    pending: PendingActionStore,
    dispatcher: Arc<Dispatcher>,
    history: HistoryStore,
}

impl WorkflowCoordinator {
    /// Assemble a coordinator.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        registry: PolicyRegistry,
        dispatcher: Arc<Dispatcher>,
        history: HistoryStore,
    ) -> Self {
        Self {
            classifier,
            registry,
            pending: PendingActionStore::new(),
            dispatcher,
            history,
        }
    }

    /// Handle one inbound chat message and return the completed turn.
    ///
    /// Classifier outages degrade to a conversational fallback; unknown
    /// intent labels degrade to plain chat.  Neither fails the turn.
    pub async fn handle_message(&self, session_id: &str, user_message: &str) -> Result<ChatTurn> {
        let context = self.build_context(session_id).await?;

        let intent_result = match self.classifier.classify(user_message, &context).await {
            Ok(result) => result,
            Err(e @ (IntentError::Unavailable { .. } | IntentError::ParseFailed { .. })) => {
                warn!(session_id = %session_id, error = %e, "classifier unavailable, degrading to chat");
                IntentResult::conversational(CLASSIFIER_DOWN_REPLY)
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "unexpected classifier error, degrading to chat");
                IntentResult::conversational(CLASSIFIER_DOWN_REPLY)
            }
        };

        let policy = match self.registry.resolve(&intent_result.intent) {
            Ok(entry) => entry.policy,
            Err(IntentError::UnknownIntent { ref intent }) => {
                warn!(session_id = %session_id, intent = %intent, "unknown intent, degrading to chat");
                IntentPolicy::Conversational
            }
            Err(e) => return Err(e.into()),
        };

        let turn_id = Uuid::new_v4().to_string();
        let payload = effective_slots(&intent_result);
        let mut snapshot = snapshot_from(&intent_result);

        let (assistant_response, needs_approval) = match policy {
            IntentPolicy::Conversational => (conversational_reply(&intent_result), false),

            IntentPolicy::ApprovalRequired => {
                let missing = self.registry.missing_slots(&intent_result.intent, &payload);
                if missing.is_empty() {
                    self.pending
                        .create(session_id, &turn_id, &intent_result.intent, payload);
                    (confirmation_prompt(&intent_result.intent), true)
                } else {
                    // Not enough to act on — ask instead of proceeding.
                    (clarifying_question(&missing), false)
                }
            }

            IntentPolicy::DirectExecution => {
                let automation_type = self
                    .registry
                    .resolve(&intent_result.intent)
                    .ok()
                    .and_then(|e| e.automation_type)
                    .unwrap_or("workflow_relay");

                let record = self
                    .dispatcher
                    .execute(automation_type, Value::Object(payload), session_id)
                    .await?;

                if let Value::Object(map) = &mut snapshot {
                    map.insert("automation_result".into(), record.result.clone());
                    map.insert("automation_success".into(), record.success.into());
                    map.insert("execution_time".into(), record.execution_time.into());
                    map.insert("direct_automation".into(), true.into());
                }

                (direct_summary(&intent_result.intent, &record), false)
            }
        };

        let turn = ChatTurn {
            id: turn_id,
            session_id: session_id.to_string(),
            user_message: user_message.to_string(),
            assistant_response,
            intent_snapshot: snapshot,
            needs_approval,
            created_at: Utc::now(),
        };

        self.history.append_turn(&turn).await?;

        info!(
            session_id = %session_id,
            turn_id = %turn.id,
            intent = %intent_result.intent,
            needs_approval = needs_approval,
            "chat turn completed"
        );
        Ok(turn)
    }

    /// Apply an approve/reject decision to a pending action.
    ///
    /// Rejection never dispatches.  Approval claims the decision exclusively
    /// and then dispatches the effective payload — exactly one ledger record
    /// per approved action, ever.
    pub async fn decide(
        &self,
        action_id: &str,
        approved: bool,
        edited_payload: Option<SlotMap>,
    ) -> Result<DecisionOutcome> {
        let decided = self
            .pending
            .claim_decision(action_id, approved, edited_payload)?;

        if !decided.approved {
            info!(action_id = %action_id, "action rejected, nothing dispatched");
            return Ok(DecisionOutcome {
                action_id: action_id.to_string(),
                approved: false,
                status: ActionStatus::Rejected,
                message: "Action cancelled.".into(),
                record: None,
            });
        }

        let automation_type = self
            .registry
            .resolve(&decided.action.intent)
            .ok()
            .and_then(|e| e.automation_type)
            .unwrap_or("workflow_relay");

        let record = self
            .dispatcher
            .execute(
                automation_type,
                Value::Object(decided.effective_payload),
                &decided.action.session_id,
            )
            .await?;

        let message = if record.success {
            "Action approved and executed.".to_string()
        } else {
            format!("Action approved, but the automation failed: {}", record.message)
        };

        Ok(DecisionOutcome {
            action_id: action_id.to_string(),
            approved: true,
            status: ActionStatus::Approved,
            message,
            record: Some(record),
        })
    }

    /// Fetch a pending action snapshot.
    pub fn pending_action(&self, action_id: &str) -> Result<PendingAction> {
        self.pending.get(action_id)
    }

    /// List a session's chat turns in insertion order.
    pub async fn list_history(&self, session_id: &str) -> Result<Vec<ChatTurn>> {
        Ok(self.history.list_turns(session_id).await?)
    }

    /// List a session's automation records in insertion order.
    pub async fn list_automation_history(
        &self,
        session_id: &str,
    ) -> Result<Vec<AutomationRecord>> {
        Ok(self.history.list_automation(session_id).await?)
    }

    /// Clear a session: both history ledgers plus its awaiting actions.
    ///
    /// Idempotent — clearing an empty session succeeds.
    pub async fn clear_session(&self, session_id: &str) -> Result<()> {
        let invalidated = self.pending.invalidate_session(session_id);
        let removed = self.history.clear_session(session_id).await?;
        info!(
            session_id = %session_id,
            turns_removed = removed,
            actions_invalidated = invalidated,
            "session cleared"
        );
        Ok(())
    }

    /// Run one automation directly (the raw automation surface).
    pub async fn execute_automation(
        &self,
        automation_type: &str,
        parameters: Value,
        session_id: &str,
    ) -> Result<AutomationRecord> {
        Ok(self
            .dispatcher
            .execute(automation_type, parameters, session_id)
            .await?)
    }

    /// Report whether an intent label is a known direct automation.
    pub fn automation_status(&self, intent: &str) -> AutomationStatusReport {
        let is_direct = self.registry.is_direct(intent);
        let status_message = if is_direct {
            format!("{} runs automatically, no approval needed", humanize(intent))
        } else if self.registry.resolve(intent).is_ok() {
            format!("{} is supported but not a direct automation", humanize(intent))
        } else {
            format!("{intent} is not a recognized automation")
        };

        AutomationStatusReport {
            intent: intent.to_string(),
            status_message,
            is_direct_automation: is_direct,
        }
    }

    // -- Private helpers ----------------------------------------------------

    /// Assemble classifier context from the session's recent turns.
    async fn build_context(&self, session_id: &str) -> Result<SessionContext> {
        let turns = self.history.list_turns(session_id).await?;
        let recent_turns = turns
            .iter()
            .rev()
            .take(CONTEXT_TURNS)
            .rev()
            .map(|t| (t.user_message.clone(), t.assistant_response.clone()))
            .collect();

        Ok(SessionContext {
            session_id: session_id.to_string(),
            recent_turns,
        })
    }
}

// ---------------------------------------------------------------------------
// Turn composition helpers
// ---------------------------------------------------------------------------

/// Slots plus the classifier's url, when the slots don't already carry one.
fn effective_slots(result: &IntentResult) -> SlotMap {
    let mut slots = result.slots.clone();
    if let Some(url) = &result.url
        && !slots.contains_key("url")
    {
        slots.insert("url".into(), url.clone().into());
    }
    slots
}

/// The intent snapshot embedded in the turn: label plus slots, flattened.
fn snapshot_from(result: &IntentResult) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("intent".into(), result.intent.clone().into());
    for (key, value) in &result.slots {
        map.insert(key.clone(), value.clone());
    }
    if let Some(url) = &result.url {
        map.entry("url".to_string())
            .or_insert_with(|| url.clone().into());
    }
    Value::Object(map)
}

fn conversational_reply(result: &IntentResult) -> String {
    result
        .reply
        .clone()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| {
            "I'm not sure how to act on that yet, but I'm happy to help however I can.".into()
        })
}

fn confirmation_prompt(intent: &str) -> String {
    format!(
        "I've prepared the {} details for your review. Approve to proceed, or edit the fields first.",
        humanize(intent)
    )
}

fn clarifying_question(missing: &[&str]) -> String {
    format!(
        "I need a bit more information before I can do that — could you give me: {}?",
        missing.join(", ")
    )
}

fn direct_summary(intent: &str, record: &AutomationRecord) -> String {
    if record.success {
        format!("{} finished: {}", humanize(intent), record.message)
    } else {
        format!("{} didn't go through: {}", humanize(intent), record.message)
    }
}

fn humanize(intent: &str) -> String {
    intent.replace('_', " ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
