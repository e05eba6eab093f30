//! Integration tests for the valet-engine crate.
//!
//! These exercise the workflow coordinator, pending action store, and
//! automation dispatcher as integrated subsystems, with a scripted
//! classifier and counting executors standing in for the external
//! collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use valet_automation::{AutomationType, Dispatcher, ExecutionOutcome, Executor};
use valet_engine::{ActionStatus, EngineError, WorkflowCoordinator};
use valet_intent::{
    Classifier, IntentError, IntentResult, PolicyRegistry, SessionContext, SlotMap,
};
use valet_store::{Database, HistoryStore};

// ═══════════════════════════════════════════════════════════════════════
//  Test doubles
// ═══════════════════════════════════════════════════════════════════════

/// Classifies by keyword; can be switched into an "outage" mode.
struct ScriptedClassifier {
    down: AtomicBool,
}

impl ScriptedClassifier {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            down: AtomicBool::new(false),
        })
    }

    fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(
        &self,
        message: &str,
        _context: &SessionContext,
    ) -> valet_intent::Result<IntentResult> {
        if self.down.load(Ordering::SeqCst) {
            return Err(IntentError::Unavailable {
                reason: "connection refused".into(),
            });
        }

        let lower = message.to_lowercase();
        if lower.contains("email to") {
            let mut slots = SlotMap::new();
            slots.insert("recipient_name".into(), "Sarah".into());
            slots.insert("subject".into(), "Quarterly report".into());
            slots.insert("body".into(), "Hi Sarah, ...".into());
            return Ok(IntentResult {
                intent: "send_email".into(),
                slots,
                url: None,
                reply: None,
            });
        }
        if lower.contains("scrape") {
            let mut slots = SlotMap::new();
            slots.insert("url".into(), "https://example.com".into());
            return Ok(IntentResult {
                intent: "web_scraping".into(),
                slots,
                url: Some("https://example.com".into()),
                reply: None,
            });
        }
        if lower.contains("linkedin notifications") {
            return Ok(IntentResult {
                intent: "check_linkedin_notifications".into(),
                slots: SlotMap::new(),
                url: None,
                reply: None,
            });
        }
        if lower.contains("dance") {
            // A label the policy registry does not know.
            return Ok(IntentResult {
                intent: "interpretive_dance".into(),
                slots: SlotMap::new(),
                url: None,
                reply: None,
            });
        }
        Ok(IntentResult::conversational("Hello! How can I help?"))
    }
}

/// Counts invocations and remembers the last parameters it ran with.
struct CountingExecutor {
    calls: AtomicU32,
    last_params: Mutex<Option<Value>>,
}

impl CountingExecutor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            last_params: Mutex::new(None),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_params(&self) -> Option<Value> {
        self.last_params.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for CountingExecutor {
    fn id(&self) -> &str {
        "counting"
    }

    async fn run(&self, parameters: &Value) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(parameters.clone());
        ExecutionOutcome::ok(json!({"echo": parameters}), "done")
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Harness
// ═══════════════════════════════════════════════════════════════════════

struct Harness {
    engine: WorkflowCoordinator,
    classifier: Arc<ScriptedClassifier>,
    executor: Arc<CountingExecutor>,
    history: HistoryStore,
}

async fn harness() -> Harness {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    let history = HistoryStore::new(db);

    let executor = CountingExecutor::new();
    let mut dispatcher = Dispatcher::new(history.clone());
    for kind in [
        AutomationType::WorkflowRelay,
        AutomationType::WebScraping,
        AutomationType::LinkedinNotifications,
    ] {
        dispatcher.register(kind, Arc::clone(&executor) as Arc<dyn Executor>);
    }

    let classifier = ScriptedClassifier::new();
    let engine = WorkflowCoordinator::new(
        Arc::clone(&classifier) as Arc<dyn Classifier>,
        PolicyRegistry::with_defaults(),
        Arc::new(dispatcher),
        history.clone(),
    );

    Harness {
        engine,
        classifier,
        executor,
        history,
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Conversational and degrade paths
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn general_chat_answers_immediately() {
    let h = harness().await;

    let turn = h.engine.handle_message("s1", "Hello, how are you today?").await.unwrap();

    assert!(!turn.needs_approval);
    assert!(!turn.assistant_response.trim().is_empty());
    assert_eq!(turn.intent_snapshot["intent"], "general_chat");
    assert_eq!(h.executor.calls(), 0);

    // The turn landed in history.
    let turns = h.history.list_turns("s1").await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].id, turn.id);
}

#[tokio::test]
async fn unknown_intent_degrades_to_chat() {
    let h = harness().await;

    let turn = h.engine.handle_message("s1", "do a dance").await.unwrap();

    assert!(!turn.needs_approval);
    assert!(!turn.assistant_response.trim().is_empty());
    // The snapshot keeps the label the classifier produced.
    assert_eq!(turn.intent_snapshot["intent"], "interpretive_dance");
    assert_eq!(h.executor.calls(), 0);
}

#[tokio::test]
async fn classifier_outage_degrades_to_chat() {
    let h = harness().await;
    h.classifier.go_down();

    let turn = h.engine.handle_message("s1", "Hello").await.unwrap();

    assert!(!turn.needs_approval);
    assert!(!turn.assistant_response.trim().is_empty());
    assert_eq!(turn.intent_snapshot["intent"], "general_chat");
}

// ═══════════════════════════════════════════════════════════════════════
//  Approval flow
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn approval_intent_creates_awaiting_action() {
    let h = harness().await;

    let turn = h
        .engine
        .handle_message("s1", "Send an email to Sarah about the quarterly report")
        .await
        .unwrap();

    assert!(turn.needs_approval);
    assert_eq!(turn.intent_snapshot["intent"], "send_email");
    assert_eq!(turn.intent_snapshot["recipient_name"], "Sarah");

    let action = h.engine.pending_action(&turn.id).unwrap();
    assert_eq!(action.status, ActionStatus::Awaiting);
    assert_eq!(action.session_id, "s1");

    // Nothing dispatched, nothing in the ledger.
    assert_eq!(h.executor.calls(), 0);
    assert!(h.history.list_automation("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn approve_dispatches_exactly_once() {
    let h = harness().await;
    let turn = h
        .engine
        .handle_message("s1", "Send an email to Sarah about the quarterly report")
        .await
        .unwrap();

    let outcome = h.engine.decide(&turn.id, true, None).await.unwrap();
    assert!(outcome.approved);
    assert_eq!(outcome.status, ActionStatus::Approved);
    let record = outcome.record.expect("approval carries a record");
    assert!(record.success);
    assert_eq!(h.executor.calls(), 1);

    // A second decision is a conflict and produces no extra record.
    let second = h.engine.decide(&turn.id, true, None).await;
    assert!(matches!(second, Err(EngineError::AlreadyDecided { .. })));
    assert_eq!(h.executor.calls(), 1);
    assert_eq!(h.history.list_automation("s1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn approve_with_edits_merges_payload() {
    let h = harness().await;
    let turn = h
        .engine
        .handle_message("s1", "Send an email to Sarah about the quarterly report")
        .await
        .unwrap();

    let mut edits = SlotMap::new();
    edits.insert("subject".into(), "X".into());

    let outcome = h.engine.decide(&turn.id, true, Some(edits)).await.unwrap();
    assert!(outcome.approved);

    // The executor saw the edited subject and the untouched fields.
    let params = h.executor.last_params().unwrap();
    assert_eq!(params["subject"], "X");
    assert_eq!(params["recipient_name"], "Sarah");
    assert_eq!(params["body"], "Hi Sarah, ...");
}

#[tokio::test]
async fn reject_cancels_without_dispatch() {
    let h = harness().await;
    let turn = h
        .engine
        .handle_message("s1", "Send an email to Sarah about the quarterly report")
        .await
        .unwrap();

    let outcome = h.engine.decide(&turn.id, false, None).await.unwrap();
    assert!(!outcome.approved);
    assert_eq!(outcome.status, ActionStatus::Rejected);
    assert!(outcome.message.to_lowercase().contains("cancelled"));
    assert!(outcome.record.is_none());

    assert_eq!(h.executor.calls(), 0);
    assert!(h.history.list_automation("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn decide_unknown_id_is_not_found() {
    let h = harness().await;

    let result = h.engine.decide("no-such-action", true, None).await;
    assert!(matches!(result, Err(EngineError::ActionNotFound { .. })));

    let mut edits = SlotMap::new();
    edits.insert("subject".into(), "irrelevant".into());
    let result = h.engine.decide("no-such-action", false, Some(edits)).await;
    assert!(matches!(result, Err(EngineError::ActionNotFound { .. })));
}

#[tokio::test]
async fn concurrent_approvals_dispatch_once() {
    let h = Arc::new(harness().await);
    let turn = h
        .engine
        .handle_message("s1", "Send an email to Sarah about the quarterly report")
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let h = Arc::clone(&h);
        let id = turn.id.clone();
        handles.push(tokio::spawn(async move {
            h.engine.decide(&id, true, None).await.is_ok()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(h.executor.calls(), 1);
    assert_eq!(h.history.list_automation("s1").await.unwrap().len(), 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Direct execution
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn direct_intent_executes_inline() {
    let h = harness().await;

    let turn = h
        .engine
        .handle_message("s1", "Check my LinkedIn notifications")
        .await
        .unwrap();

    assert!(!turn.needs_approval);
    let snapshot = &turn.intent_snapshot;
    assert_eq!(snapshot["intent"], "check_linkedin_notifications");
    assert_eq!(snapshot["direct_automation"], true);
    assert_eq!(snapshot["automation_success"], true);
    assert!(snapshot["execution_time"].as_f64().unwrap() >= 0.0);
    assert!(snapshot.get("automation_result").is_some());

    assert_eq!(h.executor.calls(), 1);
    let ledger = h.history.list_automation("s1").await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].automation_type, "linkedin_notifications");
}

// ═══════════════════════════════════════════════════════════════════════
//  Raw automation surface
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn unsupported_automation_type_fails_before_executor() {
    let h = harness().await;

    let result = h
        .engine
        .execute_automation("price_monitoring", json!({"product_url": "x"}), "s1")
        .await;

    match result {
        Err(EngineError::Automation(
            valet_automation::AutomationError::UnsupportedType { automation_type },
        )) => assert_eq!(automation_type, "price_monitoring"),
        other => panic!("expected UnsupportedType, got {other:?}"),
    }

    assert_eq!(h.executor.calls(), 0);
    assert!(h.history.list_automation("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_parameter_is_a_client_error() {
    let h = harness().await;

    let result = h
        .engine
        .execute_automation("web_scraping", json!({"selectors": {}}), "s1")
        .await;

    assert!(matches!(
        result,
        Err(EngineError::Automation(
            valet_automation::AutomationError::MissingParameter { .. }
        ))
    ));
    assert_eq!(h.executor.calls(), 0);
}

// ═══════════════════════════════════════════════════════════════════════
//  Session clearing
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn clear_session_empties_history_and_invalidates_actions() {
    let h = harness().await;

    let pending_turn = h
        .engine
        .handle_message("s1", "Send an email to Sarah about the quarterly report")
        .await
        .unwrap();
    h.engine
        .handle_message("s1", "Check my LinkedIn notifications")
        .await
        .unwrap();

    assert_eq!(h.history.list_turns("s1").await.unwrap().len(), 2);
    assert_eq!(h.history.list_automation("s1").await.unwrap().len(), 1);

    h.engine.clear_session("s1").await.unwrap();

    assert!(h.engine.list_history("s1").await.unwrap().is_empty());
    assert!(h.engine.list_automation_history("s1").await.unwrap().is_empty());

    // The still-awaiting action is gone; deciding it is a not-found.
    let result = h.engine.decide(&pending_turn.id, true, None).await;
    assert!(matches!(result, Err(EngineError::ActionNotFound { .. })));

    // Clearing again is fine.
    h.engine.clear_session("s1").await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════
//  Status surface
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn automation_status_reports_direct_intents() {
    let h = harness().await;

    let report = h.engine.automation_status("check_linkedin_notifications");
    assert!(report.is_direct_automation);
    assert!(!report.status_message.is_empty());

    let report = h.engine.automation_status("send_email");
    assert!(!report.is_direct_automation);

    let report = h.engine.automation_status("unknown_thing");
    assert!(!report.is_direct_automation);
    assert!(report.status_message.contains("not a recognized"));
}
