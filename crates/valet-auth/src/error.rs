//! Authentication error types.

/// Unified error type for the auth crate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No OAuth client configuration is present.
    #[error("mail provider OAuth is not configured")]
    NotConfigured,

    /// The flow is in the wrong state for the requested step (e.g. a
    /// callback arrived without a pending authorization).
    #[error("invalid flow state: {reason}")]
    FlowState { reason: String },

    /// The authorization server rejected the token exchange.
    #[error("token exchange failed: {reason}")]
    TokenExchange { reason: String },

    /// A URL could not be constructed or parsed.
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP transport failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the auth crate.
pub type Result<T> = std::result::Result<T, AuthError>;
