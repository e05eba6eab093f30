//! The mail authentication manager.
//!
//! [`MailAuth`] holds the OAuth client configuration and whatever token
//! state the process has acquired.  The rest of the system asks three
//! questions: start an authorization (`auth_start`), complete one with the
//! provider's code (`auth_complete`), and is-the-mail-side-usable
//! (`status`).  Token storage stays inside this type — callers only ever
//! read the status and, for executors, borrow the current access token.

use tokio::sync::RwLock;
use tracing::{info, warn};

use serde::Serialize;

use crate::error::{AuthError, Result};
use crate::oauth::{self, OAuthConfig, OAuthTokens};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where to send the user to authorize.
#[derive(Debug, Clone, Serialize)]
pub struct AuthRedirect {
    /// The provider authorization URL (carries the PKCE challenge).
    pub auth_url: String,
    /// The CSRF `state` parameter embedded in the URL.
    pub state: String,
}

/// The token state after a completed exchange.
#[derive(Debug, Clone, Serialize)]
pub struct TokenState {
    /// Whether an access token is now held.
    pub authenticated: bool,
    /// Unix timestamp when the access token expires, if bounded.
    pub expires_at: Option<i64>,
    /// Whether a refresh token was granted.
    pub has_refresh_token: bool,
}

/// Snapshot of the mail auth state.
#[derive(Debug, Clone, Serialize)]
pub struct MailAuthStatus {
    /// Whether OAuth client credentials are configured at all.
    pub configured: bool,
    /// Whether a non-expired access token is held.
    pub authenticated: bool,
    /// The redirect URI in use, when configured.
    pub redirect_uri: Option<String>,
    /// The scopes that will be requested.
    pub scopes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// In-flight flow state: the verifier and CSRF state of a started
/// authorization, and the tokens of a completed one.
#[derive(Default)]
struct FlowState {
    pending_verifier: Option<String>,
    pending_state: Option<String>,
    tokens: Option<OAuthTokens>,
}

/// Mail-provider authentication handle.
pub struct MailAuth {
    config: Option<OAuthConfig>,
    client: reqwest::Client,
    state: RwLock<FlowState>,
}

impl MailAuth {
    /// A manager with client configuration.
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config: Some(config),
            client: reqwest::Client::new(),
            state: RwLock::new(FlowState::default()),
        }
    }

    /// A manager with no configuration. `auth_start` fails with
    /// [`AuthError::NotConfigured`]; `status` reports `configured: false`.
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            config: None,
            client: reqwest::Client::new(),
            state: RwLock::new(FlowState::default()),
        }
    }

    /// Begin an authorization: generate PKCE material and build the
    /// redirect target.
    pub async fn auth_start(&self) -> Result<AuthRedirect> {
        let config = self.config.as_ref().ok_or(AuthError::NotConfigured)?;

        let verifier = oauth::generate_verifier()?;
        let challenge = oauth::challenge_for(&verifier);
        let csrf_state = oauth::generate_state()?;

        let auth_url = oauth::authorization_url(config, &csrf_state, &challenge)?;

        let mut state = self.state.write().await;
        state.pending_verifier = Some(verifier);
        state.pending_state = Some(csrf_state.clone());

        info!("mail authorization started");
        Ok(AuthRedirect {
            auth_url,
            state: csrf_state,
        })
    }

    /// Complete an authorization with the provider's code.
    ///
    /// The flow state lock is dropped before the token-endpoint call and
    /// re-acquired to store the result.
    pub async fn auth_complete(&self, code: &str) -> Result<TokenState> {
        let config = self.config.as_ref().ok_or(AuthError::NotConfigured)?;

        if code.trim().is_empty() {
            return Err(AuthError::FlowState {
                reason: "authorization code required".into(),
            });
        }

        let verifier = {
            let mut state = self.state.write().await;
            state
                .pending_verifier
                .take()
                .ok_or_else(|| AuthError::FlowState {
                    reason: "no authorization in progress".into(),
                })?
        };

        let tokens = oauth::exchange_code(&self.client, config, code, &verifier).await?;
        let result = TokenState {
            authenticated: true,
            expires_at: tokens.expires_at,
            has_refresh_token: tokens.refresh_token.is_some(),
        };

        let mut state = self.state.write().await;
        state.pending_state = None;
        state.tokens = Some(tokens);

        info!("mail authorization completed");
        Ok(result)
    }

    /// Snapshot the current auth state.
    pub async fn status(&self) -> MailAuthStatus {
        let state = self.state.read().await;
        let authenticated = state
            .tokens
            .as_ref()
            .is_some_and(|t| !t.is_expired());

        if !authenticated && state.tokens.is_some() {
            warn!("mail access token is expired");
        }

        MailAuthStatus {
            configured: self.config.is_some(),
            authenticated,
            redirect_uri: self.config.as_ref().map(|c| c.redirect_uri.clone()),
            scopes: self
                .config
                .as_ref()
                .map(|c| c.scopes.clone())
                .unwrap_or_default(),
        }
    }

    /// The current access token, if held and not expired.
    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.read().await;
        state
            .tokens
            .as_ref()
            .filter(|t| !t.is_expired())
            .map(|t| t.access_token.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
