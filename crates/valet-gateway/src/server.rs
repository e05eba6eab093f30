//! Gateway server setup and startup.
//!
//! [`GatewayServer`] composes the Axum router, registers all routes, and
//! starts the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;

use crate::GatewayConfig;
use crate::api;
use crate::state::AppState;

/// The Valet HTTP server.
pub struct GatewayServer {
    config: GatewayConfig,
    state: Arc<AppState>,
}

impl GatewayServer {
    /// Create a server over the shared application state.
    pub fn new(config: GatewayConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin("*".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(tower_http::cors::Any);

        Router::new()
            // Chat and approvals.
            .route("/api/chat", post(api::chat))
            .route("/api/approve", post(api::approve))
            // Session history.
            .route("/api/history/{session_id}", get(api::get_history))
            .route("/api/history/{session_id}", delete(api::clear_history))
            // Automation surface.
            .route("/api/automation", post(api::run_automation))
            .route(
                "/api/automation-history/{session_id}",
                get(api::automation_history),
            )
            .route(
                "/api/automation-status/{intent}",
                get(api::automation_status),
            )
            // Mail OAuth.
            .route("/api/mail/auth", get(api::mail_auth))
            .route("/api/mail/callback", post(api::mail_callback))
            .route("/api/mail/status", get(api::mail_status))
            // Health.
            .route("/api/health", get(api::health))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(addr = %addr, "starting gateway");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
