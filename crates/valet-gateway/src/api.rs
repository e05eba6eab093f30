//! REST API route handlers.
//!
//! Handlers translate between the wire shapes and the engine, and map the
//! engine's error taxonomy onto status codes: not-found → 404, an already
//! decided action → 409, a malformed automation request → 400, everything
//! internal → 500.  A *failed execution* of a structurally valid automation
//! is not an error — it comes back 200 with `success: false`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use valet_automation::{AutomationError, AutomationType};
use valet_engine::EngineError;
use valet_intent::SlotMap;
use valet_store::ChatTurn;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map an engine error to a response status.
fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::ActionNotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::AlreadyDecided { .. } => StatusCode::CONFLICT,
        EngineError::Automation(
            AutomationError::UnsupportedType { .. } | AutomationError::MissingParameter { .. },
        ) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(error: &EngineError) -> Json<Value> {
    Json(json!({"detail": error.to_string()}))
}

/// One chat turn as the API returns it.
fn turn_envelope(turn: &ChatTurn) -> Value {
    json!({
        "id": turn.id,
        "session_id": turn.session_id,
        "message": turn.user_message,
        "response": turn.assistant_response,
        "intent_data": turn.intent_snapshot,
        "needs_approval": turn.needs_approval,
        "timestamp": turn.created_at.to_rfc3339(),
    })
}

// ---------------------------------------------------------------------------
// POST /api/chat
// ---------------------------------------------------------------------------

/// Request body for the chat endpoint.
#[derive(Deserialize)]
pub struct ChatBody {
    /// The user message.
    pub message: String,
    /// The session the message belongs to.
    pub session_id: String,
    /// Optional caller identifier (unused by the engine, accepted for
    /// compatibility).
    #[allow(dead_code)]
    pub user_id: Option<String>,
}

/// Run one chat turn through the workflow engine.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> (StatusCode, Json<Value>) {
    match state.engine.handle_message(&body.session_id, &body.message).await {
        Ok(turn) => (StatusCode::OK, Json(turn_envelope(&turn))),
        Err(e) => {
            tracing::error!(session_id = %body.session_id, error = %e, "chat turn failed");
            (status_for(&e), error_body(&e))
        }
    }
}

// ---------------------------------------------------------------------------
// POST /api/approve
// ---------------------------------------------------------------------------

/// Request body for an approval decision.
#[derive(Deserialize)]
pub struct ApproveBody {
    /// The session the pending action belongs to (accepted for
    /// compatibility; the action id is globally unique).
    #[allow(dead_code)]
    pub session_id: Option<String>,
    /// The pending action id (= the chat turn id).
    pub message_id: String,
    /// Approve (`true`) or reject (`false`).
    pub approved: bool,
    /// Edited fields; merged over the original payload on approval.
    pub edited_data: Option<SlotMap>,
}

/// Apply an approve/reject decision.
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApproveBody>,
) -> (StatusCode, Json<Value>) {
    match state
        .engine
        .decide(&body.message_id, body.approved, body.edited_data)
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message_id": outcome.action_id,
                "approved": outcome.approved,
                "status": outcome.status,
                "message": outcome.message,
                "automation_record": outcome.record,
            })),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

// ---------------------------------------------------------------------------
// GET/DELETE /api/history/{session_id}
// ---------------------------------------------------------------------------

/// Read a session's chat history.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.engine.list_history(&session_id).await {
        Ok(turns) => {
            let messages: Vec<Value> = turns.iter().map(turn_envelope).collect();
            (
                StatusCode::OK,
                Json(json!({"session_id": session_id, "messages": messages})),
            )
        }
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

/// Clear a session: chat history, automation history, and awaiting actions.
pub async fn clear_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.engine.clear_session(&session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"success": true, "message": "History cleared"})),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

// ---------------------------------------------------------------------------
// POST /api/automation
// ---------------------------------------------------------------------------

/// Request body for the raw automation surface.
#[derive(Deserialize)]
pub struct AutomationBody {
    /// The session to record the attempt under.
    pub session_id: String,
    /// Wire name of the automation type.
    pub automation_type: String,
    /// Executor parameters.
    #[serde(default)]
    pub parameters: Value,
}

/// Validate and run one automation.
pub async fn run_automation(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AutomationBody>,
) -> (StatusCode, Json<Value>) {
    match state
        .engine
        .execute_automation(&body.automation_type, body.parameters, &body.session_id)
        .await
    {
        Ok(record) => (
            StatusCode::OK,
            Json(json!({
                "success": record.success,
                "data": record.result,
                "message": record.message,
                "execution_time": record.execution_time,
                "automation_id": record.id,
            })),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

// ---------------------------------------------------------------------------
// GET /api/automation-history/{session_id}
// ---------------------------------------------------------------------------

/// Read a session's automation ledger.
pub async fn automation_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.engine.list_automation_history(&session_id).await {
        Ok(records) => (
            StatusCode::OK,
            Json(json!({"automation_history": records})),
        ),
        Err(e) => (status_for(&e), error_body(&e)),
    }
}

// ---------------------------------------------------------------------------
// GET /api/automation-status/{intent}
// ---------------------------------------------------------------------------

/// Report whether an intent label is a direct automation.
pub async fn automation_status(
    State(state): State<Arc<AppState>>,
    Path(intent): Path<String>,
) -> Json<Value> {
    let report = state.engine.automation_status(&intent);
    Json(json!({
        "intent": report.intent,
        "status_message": report.status_message,
        "is_direct_automation": report.is_direct_automation,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// ---------------------------------------------------------------------------
// Mail OAuth endpoints
// ---------------------------------------------------------------------------

/// Begin the mail-provider authorization flow.
pub async fn mail_auth(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.mail.auth_start().await {
        Ok(redirect) => (
            StatusCode::OK,
            Json(json!({"success": true, "auth_url": redirect.auth_url, "state": redirect.state})),
        ),
        Err(valet_auth::AuthError::NotConfigured) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": "mail provider OAuth is not configured"})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "message": e.to_string()})),
        ),
    }
}

/// Request body for the OAuth callback.
#[derive(Deserialize)]
pub struct MailCallbackBody {
    /// The authorization code from the provider.
    pub code: Option<String>,
}

/// Complete the mail-provider authorization flow.
pub async fn mail_callback(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MailCallbackBody>,
) -> (StatusCode, Json<Value>) {
    let Some(code) = body.code.filter(|c| !c.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Authorization code required"})),
        );
    };

    match state.mail.auth_complete(&code).await {
        Ok(tokens) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "authenticated": tokens.authenticated,
                "expires_at": tokens.expires_at,
            })),
        ),
        Err(e @ (valet_auth::AuthError::FlowState { .. } | valet_auth::AuthError::NotConfigured)) => {
            (StatusCode::BAD_REQUEST, Json(json!({"detail": e.to_string()})))
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({"detail": e.to_string()})),
        ),
    }
}

/// Report the mail-provider auth state.
pub async fn mail_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.mail.status().await;
    Json(json!({
        "configured": status.configured,
        "authenticated": status.authenticated,
        "redirect_uri": status.redirect_uri,
        "scopes": status.scopes,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/health
// ---------------------------------------------------------------------------

/// Overall system health: database reachability, the automation type
/// allow-list, and mail integration state.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database_ok = state
        .db
        .call(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
        .is_ok();

    let mail = state.mail.status().await;
    let automation_types: Vec<&str> =
        AutomationType::ALL.iter().map(|t| t.as_str()).collect();

    Json(json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": if database_ok { "connected" } else { "unavailable" },
        "automation": {
            "supported_types": automation_types,
        },
        "mail_integration": {
            "configured": mail.configured,
            "authenticated": mail.authenticated,
            "scopes": mail.scopes,
        },
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
