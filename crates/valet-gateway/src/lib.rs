//! HTTP gateway for Valet.
//!
//! Exposes the workflow engine over a REST API:
//!
//! - Chat turns and approval decisions.
//! - Session history and automation history, read and clear.
//! - The raw automation surface and the automation-status probe.
//! - Mail-provider OAuth start/callback/status.
//! - A health endpoint summarizing subsystem state.

pub mod api;
pub mod server;
pub mod state;

pub use server::GatewayServer;
pub use state::AppState;

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8080,
        }
    }
}
