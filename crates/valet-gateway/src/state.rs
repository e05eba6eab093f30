//! Shared application state for the gateway.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers.  It holds the workflow engine, the mail auth collaborator,
//! and the database handle (for health checks).

use std::sync::Arc;

use valet_auth::MailAuth;
use valet_engine::WorkflowCoordinator;
use valet_store::Database;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// The workflow engine every chat and decision flows through.
    pub engine: Arc<WorkflowCoordinator>,

    /// Mail-provider OAuth collaborator.
    pub mail: Arc<MailAuth>,

    /// Database handle, used by the health endpoint.
    pub db: Database,
}
