//! Pending action store.
//!
//! Arena-style map of actions awaiting a human decision, keyed by action id
//! with a per-session index for clear-on-demand invalidation.  Backed by
//! [`DashMap`]: the status-check-and-set in [`PendingActionStore::claim_decision`]
//! happens under the map's entry guard, which is what makes decisions
//! exclusive — two concurrent decisions on one id yield exactly one success
//! and one conflict, never two executions.
//!
//! The guard is always dropped before anything external (the dispatcher) is
//! called.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use valet_intent::SlotMap;

use crate::error::{EngineError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Lifecycle status of a pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Created, no decision yet.
    Awaiting,
    /// Approved and dispatched.
    Approved,
    /// Rejected; nothing was dispatched.
    Rejected,
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Awaiting => write!(f, "awaiting"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// One action held for a human decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    /// Action id — equal to the chat turn id that created it.
    pub id: String,
    /// The session the action belongs to.
    pub session_id: String,
    /// The intent label that required approval.
    pub intent: String,
    /// Slot payload; replaced field-by-field by an edited decision.
    pub payload: SlotMap,
    /// Lifecycle status. Transitions exactly once, `Awaiting` → terminal.
    pub status: ActionStatus,
    /// When the action was created.
    pub created_at: DateTime<Utc>,
    /// When the decision landed, for terminal actions.
    pub decided_at: Option<DateTime<Utc>>,
}

/// The result of successfully claiming a decision.
#[derive(Debug, Clone)]
pub struct DecidedAction {
    /// Snapshot of the action after the transition.
    pub action: PendingAction,
    /// The payload dispatch should use: edits merged over the original.
    pub effective_payload: SlotMap,
    /// Whether the decision was an approval.
    pub approved: bool,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Concurrent pending-action arena.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct PendingActionStore {
    actions: DashMap<String, PendingAction>,
    /// session id → action ids created in that session.
    sessions: DashMap<String, Vec<String>>,
}

impl PendingActionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// Create a pending action in the `Awaiting` state.
    pub fn create(
        &self,
        session_id: impl Into<String>,
        id: impl Into<String>,
        intent: impl Into<String>,
        payload: SlotMap,
    ) -> PendingAction {
        let action = PendingAction {
            id: id.into(),
            session_id: session_id.into(),
            intent: intent.into(),
            payload,
            status: ActionStatus::Awaiting,
            created_at: Utc::now(),
            decided_at: None,
        };

        info!(
            action_id = %action.id,
            session_id = %action.session_id,
            intent = %action.intent,
            "pending action created"
        );

        self.sessions
            .entry(action.session_id.clone())
            .or_default()
            .push(action.id.clone());
        self.actions.insert(action.id.clone(), action.clone());
        action
    }

    /// Fetch a snapshot of a pending action.
    pub fn get(&self, id: &str) -> Result<PendingAction> {
        self.actions
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::ActionNotFound { id: id.to_string() })
    }

    /// Atomically transition an action out of `Awaiting`.
    ///
    /// Fails with [`EngineError::ActionNotFound`] for unknown or invalidated
    /// ids, and with [`EngineError::AlreadyDecided`] when the action is
    /// already terminal.  On approval, `edited_payload` fields win over the
    /// original payload; unedited fields are retained.
    ///
    /// The entry guard is held only for the transition itself — callers
    /// dispatch *after* this returns.
    pub fn claim_decision(
        &self,
        id: &str,
        approved: bool,
        edited_payload: Option<SlotMap>,
    ) -> Result<DecidedAction> {
        let mut entry = self
            .actions
            .get_mut(id)
            .ok_or_else(|| EngineError::ActionNotFound { id: id.to_string() })?;

        if entry.status != ActionStatus::Awaiting {
            return Err(EngineError::AlreadyDecided {
                id: id.to_string(),
                status: entry.status,
            });
        }

        entry.status = if approved {
            ActionStatus::Approved
        } else {
            ActionStatus::Rejected
        };
        entry.decided_at = Some(Utc::now());

        if approved && let Some(edits) = edited_payload {
            for (key, value) in edits {
                entry.payload.insert(key, value);
            }
        }

        let action = entry.value().clone();
        drop(entry);

        info!(
            action_id = %id,
            approved = approved,
            "pending action decided"
        );

        Ok(DecidedAction {
            effective_payload: action.payload.clone(),
            approved,
            action,
        })
    }

    /// Invalidate a session's still-`Awaiting` actions.
    ///
    /// Terminal actions are retained for audit; removed ids subsequently
    /// fail with [`EngineError::ActionNotFound`].  Returns the number of
    /// actions removed.
    pub fn invalidate_session(&self, session_id: &str) -> usize {
        let Some((_, ids)) = self.sessions.remove(session_id) else {
            return 0;
        };

        let mut removed = 0;
        let mut kept = Vec::new();
        for id in ids {
            let awaiting = self
                .actions
                .get(&id)
                .is_some_and(|a| a.status == ActionStatus::Awaiting);
            if awaiting {
                self.actions.remove(&id);
                removed += 1;
            } else {
                kept.push(id);
            }
        }

        // Terminal actions stay addressable under their session.
        if !kept.is_empty() {
            self.sessions.insert(session_id.to_string(), kept);
        }

        debug!(
            session_id = %session_id,
            removed = removed,
            "session pending actions invalidated"
        );
        removed
    }

    /// Number of actions currently `Awaiting` (across all sessions).
    pub fn awaiting_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|e| e.status == ActionStatus::Awaiting)
            .count()
    }
}

impl Default for PendingActionStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn payload(pairs: &[(&str, &str)]) -> SlotMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
            .collect()
    }

    #[test]
    fn create_and_get() {
        let store = PendingActionStore::new();
        let action = store.create("s1", "a1", "send_email", payload(&[("subject", "Hi")]));

        assert_eq!(action.status, ActionStatus::Awaiting);
        assert!(action.decided_at.is_none());

        let fetched = store.get("a1").unwrap();
        assert_eq!(fetched.intent, "send_email");
        assert_eq!(fetched.payload["subject"], "Hi");
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = PendingActionStore::new();
        assert!(matches!(
            store.get("nope"),
            Err(EngineError::ActionNotFound { .. })
        ));
    }

    #[test]
    fn approve_merges_edits_over_payload() {
        let store = PendingActionStore::new();
        store.create(
            "s1",
            "a1",
            "send_email",
            payload(&[("recipient_name", "Sarah"), ("subject", "Quarterly report")]),
        );

        let decided = store
            .claim_decision("a1", true, Some(payload(&[("subject", "X")])))
            .unwrap();

        assert!(decided.approved);
        assert_eq!(decided.action.status, ActionStatus::Approved);
        assert!(decided.action.decided_at.is_some());
        // Edited field wins, unedited field retained.
        assert_eq!(decided.effective_payload["subject"], "X");
        assert_eq!(decided.effective_payload["recipient_name"], "Sarah");
    }

    #[test]
    fn reject_ignores_edits_and_is_terminal() {
        let store = PendingActionStore::new();
        store.create("s1", "a1", "set_reminder", payload(&[("reminder_text", "call mom")]));

        let decided = store
            .claim_decision("a1", false, Some(payload(&[("reminder_text", "ignored")])))
            .unwrap();
        assert!(!decided.approved);
        assert_eq!(decided.action.status, ActionStatus::Rejected);
        // Rejection leaves the payload untouched.
        assert_eq!(decided.effective_payload["reminder_text"], "call mom");
    }

    #[test]
    fn second_decision_is_a_conflict() {
        let store = PendingActionStore::new();
        store.create("s1", "a1", "add_todo", payload(&[("task", "x")]));

        store.claim_decision("a1", true, None).unwrap();

        let second = store.claim_decision("a1", true, None);
        assert!(matches!(
            second,
            Err(EngineError::AlreadyDecided {
                status: ActionStatus::Approved,
                ..
            })
        ));

        // The record stays around for audit.
        assert_eq!(store.get("a1").unwrap().status, ActionStatus::Approved);
    }

    #[tokio::test]
    async fn concurrent_decisions_have_exactly_one_winner() {
        let store = Arc::new(PendingActionStore::new());
        store.create("s1", "a1", "add_todo", payload(&[("task", "x")]));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.claim_decision("a1", true, None).is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn invalidate_session_removes_awaiting_keeps_terminal() {
        let store = PendingActionStore::new();
        store.create("s1", "a1", "add_todo", SlotMap::new());
        store.create("s1", "a2", "add_todo", SlotMap::new());
        store.create("s2", "b1", "add_todo", SlotMap::new());

        store.claim_decision("a1", false, None).unwrap();

        let removed = store.invalidate_session("s1");
        assert_eq!(removed, 1);

        // The decided action survives for audit; the awaiting one is gone.
        assert_eq!(store.get("a1").unwrap().status, ActionStatus::Rejected);
        assert!(matches!(
            store.get("a2"),
            Err(EngineError::ActionNotFound { .. })
        ));
        assert!(matches!(
            store.claim_decision("a2", true, None),
            Err(EngineError::ActionNotFound { .. })
        ));

        // Other sessions are untouched.
        assert_eq!(store.get("b1").unwrap().status, ActionStatus::Awaiting);
    }

    #[test]
    fn invalidate_unknown_session_is_noop() {
        let store = PendingActionStore::new();
        assert_eq!(store.invalidate_session("nope"), 0);
    }
}
