//! Session history manager.
//!
//! Two append-only ledgers keyed by session id: chat turns and automation
//! records.  Rows come back in insertion order (creation time, then rowid
//! for same-second inserts).  Clearing a session removes its rows from both
//! ledgers and is idempotent — clearing an empty session succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// One chat exchange: the user message and the assistant's response,
/// together with the intent snapshot taken at classification time.
///
/// Immutable once written, except that `assistant_response` may have been
/// completed by direct automation before the turn was appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Unique identifier (UUID v4). Doubles as the pending-action id for
    /// approval-required turns.
    pub id: String,
    /// The session this turn belongs to.
    pub session_id: String,
    /// The raw user message.
    pub user_message: String,
    /// The assistant's reply.
    pub assistant_response: String,
    /// Intent label and slot payload at classification time. For direct
    /// automation this also carries the execution result fields.
    pub intent_snapshot: serde_json::Value,
    /// Whether the turn is waiting on a human decision.
    pub needs_approval: bool,
    /// When the turn was created.
    pub created_at: DateTime<Utc>,
}

/// One automation attempt, successful or not.
///
/// Append-only — the ledger is a complete record of attempts, not just
/// successes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationRecord {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// The session the automation ran for.
    pub session_id: String,
    /// Wire name of the automation type (e.g. `"web_scraping"`).
    pub automation_type: String,
    /// The parameters the executor ran with.
    pub parameters: serde_json::Value,
    /// Opaque structured payload from the executor.
    pub result: serde_json::Value,
    /// Whether the underlying automation succeeded.
    pub success: bool,
    /// Human-readable summary of the outcome.
    pub message: String,
    /// Wall-clock execution time in seconds, never negative.
    pub execution_time: f64,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
//  HistoryStore
// ═══════════════════════════════════════════════════════════════════════

/// Append/list/clear operations on the per-session ledgers.
#[derive(Clone)]
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    /// Create a history store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a chat turn.
    #[instrument(skip(self, turn), fields(session_id = %turn.session_id, turn_id = %turn.id))]
    pub async fn append_turn(&self, turn: &ChatTurn) -> StoreResult<()> {
        let turn = turn.clone();
        let snapshot = serde_json::to_string(&turn.intent_snapshot)?;

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO chat_turns (id, session_id, user_message, assistant_response, intent_snapshot, needs_approval, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        turn.id,
                        turn.session_id,
                        turn.user_message,
                        turn.assistant_response,
                        snapshot,
                        turn.needs_approval,
                        turn.created_at.timestamp(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!("chat turn appended");
        Ok(())
    }

    /// List a session's chat turns in insertion order.
    #[instrument(skip(self))]
    pub async fn list_turns(&self, session_id: &str) -> StoreResult<Vec<ChatTurn>> {
        let session_id = session_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, user_message, assistant_response, intent_snapshot, needs_approval, created_at \
                     FROM chat_turns WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
                )?;
                let turns = stmt
                    .query_map(rusqlite::params![session_id], |row| {
                        let snapshot: String = row.get(4)?;
                        let created: i64 = row.get(6)?;
                        Ok(ChatTurn {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            user_message: row.get(2)?,
                            assistant_response: row.get(3)?,
                            intent_snapshot: serde_json::from_str(&snapshot)
                                .unwrap_or(serde_json::Value::Null),
                            needs_approval: row.get(5)?,
                            created_at: DateTime::from_timestamp(created, 0)
                                .unwrap_or_default(),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(turns)
            })
            .await
    }

    /// Append an automation record.
    #[instrument(skip(self, record), fields(session_id = %record.session_id, record_id = %record.id))]
    pub async fn append_automation(&self, record: &AutomationRecord) -> StoreResult<()> {
        let record = record.clone();
        let parameters = serde_json::to_string(&record.parameters)?;
        let result = serde_json::to_string(&record.result)?;

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO automation_records (id, session_id, automation_type, parameters, result, success, message, execution_time, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        record.id,
                        record.session_id,
                        record.automation_type,
                        parameters,
                        result,
                        record.success,
                        record.message,
                        record.execution_time,
                        record.created_at.timestamp(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!("automation record appended");
        Ok(())
    }

    /// List a session's automation records in insertion order.
    #[instrument(skip(self))]
    pub async fn list_automation(&self, session_id: &str) -> StoreResult<Vec<AutomationRecord>> {
        let session_id = session_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, automation_type, parameters, result, success, message, execution_time, created_at \
                     FROM automation_records WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
                )?;
                let records = stmt
                    .query_map(rusqlite::params![session_id], |row| {
                        let parameters: String = row.get(3)?;
                        let result: String = row.get(4)?;
                        let created: i64 = row.get(8)?;
                        Ok(AutomationRecord {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            automation_type: row.get(2)?,
                            parameters: serde_json::from_str(&parameters)
                                .unwrap_or(serde_json::Value::Null),
                            result: serde_json::from_str(&result)
                                .unwrap_or(serde_json::Value::Null),
                            success: row.get(5)?,
                            message: row.get(6)?,
                            execution_time: row.get(7)?,
                            created_at: DateTime::from_timestamp(created, 0)
                                .unwrap_or_default(),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
    }

    /// Remove all of a session's turns and automation records.
    ///
    /// Idempotent: clearing a session with no rows succeeds. Returns the
    /// number of chat turns removed.
    #[instrument(skip(self))]
    pub async fn clear_session(&self, session_id: &str) -> StoreResult<usize> {
        let session_id = session_id.to_string();
        let removed = self
            .db
            .call(move |conn| {
                let turns = conn.execute(
                    "DELETE FROM chat_turns WHERE session_id = ?1",
                    rusqlite::params![session_id],
                )?;
                conn.execute(
                    "DELETE FROM automation_records WHERE session_id = ?1",
                    rusqlite::params![session_id],
                )?;
                Ok(turns)
            })
            .await?;

        debug!(removed = removed, "session history cleared");
        Ok(removed)
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_store() -> HistoryStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        HistoryStore::new(db)
    }

    fn turn(id: &str, session: &str, message: &str) -> ChatTurn {
        ChatTurn {
            id: id.into(),
            session_id: session.into(),
            user_message: message.into(),
            assistant_response: format!("re: {message}"),
            intent_snapshot: json!({"intent": "general_chat"}),
            needs_approval: false,
            created_at: Utc::now(),
        }
    }

    fn record(id: &str, session: &str, success: bool) -> AutomationRecord {
        AutomationRecord {
            id: id.into(),
            session_id: session.into(),
            automation_type: "web_scraping".into(),
            parameters: json!({"url": "https://example.com"}),
            result: json!({"title": "Example"}),
            success,
            message: if success { "ok" } else { "target timed out" }.into(),
            execution_time: 0.42,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_and_list_turns_in_order() {
        let store = setup_store().await;

        store.append_turn(&turn("t1", "s1", "first")).await.unwrap();
        store.append_turn(&turn("t2", "s1", "second")).await.unwrap();
        store.append_turn(&turn("t3", "s2", "other session")).await.unwrap();

        let turns = store.list_turns("s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_message, "first");
        assert_eq!(turns[1].user_message, "second");
        assert_eq!(
            turns[0].intent_snapshot["intent"].as_str(),
            Some("general_chat")
        );
    }

    #[tokio::test]
    async fn list_unknown_session_is_empty() {
        let store = setup_store().await;
        assert!(store.list_turns("nope").await.unwrap().is_empty());
        assert!(store.list_automation("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn automation_ledger_keeps_failures() {
        let store = setup_store().await;

        store.append_automation(&record("a1", "s1", true)).await.unwrap();
        store.append_automation(&record("a2", "s1", false)).await.unwrap();

        let records = store.list_automation("s1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].success);
        assert!(!records[1].success);
        assert_eq!(records[1].message, "target timed out");
        assert!(records[1].execution_time >= 0.0);
    }

    #[tokio::test]
    async fn clear_session_empties_both_ledgers() {
        let store = setup_store().await;

        store.append_turn(&turn("t1", "s1", "hello")).await.unwrap();
        store.append_automation(&record("a1", "s1", true)).await.unwrap();
        store.append_turn(&turn("t2", "s2", "untouched")).await.unwrap();

        let removed = store.clear_session("s1").await.unwrap();
        assert_eq!(removed, 1);

        assert!(store.list_turns("s1").await.unwrap().is_empty());
        assert!(store.list_automation("s1").await.unwrap().is_empty());

        // Other sessions are unaffected.
        assert_eq!(store.list_turns("s2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clear_empty_session_is_idempotent() {
        let store = setup_store().await;
        assert_eq!(store.clear_session("s1").await.unwrap(), 0);
        assert_eq!(store.clear_session("s1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn needs_approval_round_trips() {
        let store = setup_store().await;

        let mut t = turn("t1", "s1", "send an email");
        t.needs_approval = true;
        t.intent_snapshot = json!({"intent": "send_email", "recipient_name": "Sarah"});
        store.append_turn(&t).await.unwrap();

        let turns = store.list_turns("s1").await.unwrap();
        assert!(turns[0].needs_approval);
        assert_eq!(
            turns[0].intent_snapshot["recipient_name"].as_str(),
            Some("Sarah")
        );
    }
}
