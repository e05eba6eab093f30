//! OAuth 2.0 authorization code flow with PKCE.
//!
//! Covers the pieces the mail integration needs: PKCE verifier/challenge
//! generation (RFC 7636, S256), authorization URL construction, and the
//! code-for-token exchange.  PKCE is mandatory — every authorization URL
//! carries a challenge.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, Result};

/// Length of the PKCE code verifier in bytes (before base64 encoding).
const PKCE_VERIFIER_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// OAuth client configuration for the mail provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// The OAuth client ID.
    pub client_id: String,
    /// The OAuth client secret (confidential clients only).
    pub client_secret: Option<String>,
    /// The authorization endpoint URL.
    pub auth_url: String,
    /// The token endpoint URL.
    pub token_url: String,
    /// The redirect URI registered with the authorization server.
    pub redirect_uri: String,
    /// The scopes to request.
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Configuration for Google's mail API with the standard mail scopes.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(client_secret.into()),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".into(),
            token_url: "https://oauth2.googleapis.com/token".into(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![
                "https://www.googleapis.com/auth/gmail.readonly".into(),
                "https://www.googleapis.com/auth/gmail.send".into(),
                "https://www.googleapis.com/auth/gmail.compose".into(),
                "https://www.googleapis.com/auth/gmail.modify".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Tokens held after a successful exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used to authenticate API requests.
    pub access_token: String,
    /// The refresh token, when the server granted one.
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) when the access token expires.
    pub expires_at: Option<i64>,
    /// The token type (typically "Bearer").
    pub token_type: String,
}

impl OAuthTokens {
    /// Whether the access token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at <= Utc::now().timestamp())
    }
}

/// Raw token endpoint response shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default = "default_token_type")]
    token_type: String,
}

fn default_token_type() -> String {
    "Bearer".into()
}

// ---------------------------------------------------------------------------
// PKCE
// ---------------------------------------------------------------------------

/// Generate a fresh PKCE code verifier (base64url, no padding).
pub fn generate_verifier() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; PKCE_VERIFIER_BYTES];
    rng.fill(&mut bytes).map_err(|_| AuthError::FlowState {
        reason: "system randomness unavailable".into(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive the S256 code challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

/// Generate a random `state` parameter for CSRF protection.
pub fn generate_state() -> Result<String> {
    generate_verifier()
}

// ---------------------------------------------------------------------------
// Flow steps
// ---------------------------------------------------------------------------

/// Build the authorization URL the user is redirected to.
pub fn authorization_url(config: &OAuthConfig, state: &str, challenge: &str) -> Result<String> {
    let mut url = Url::parse(&config.auth_url)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &config.scopes.join(" "))
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256")
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url.into())
}

/// Exchange an authorization code (plus the PKCE verifier) for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<OAuthTokens> {
    let mut form = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", config.redirect_uri.clone()),
        ("client_id", config.client_id.clone()),
        ("code_verifier", verifier.to_string()),
    ];
    if let Some(secret) = &config.client_secret {
        form.push(("client_secret", secret.clone()));
    }

    let response = client.post(&config.token_url).form(&form).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AuthError::TokenExchange {
            reason: format!("token endpoint returned {status}: {body}"),
        });
    }

    let raw: TokenResponse = response.json().await?;
    let expires_at = raw.expires_in.map(|secs| Utc::now().timestamp() + secs);

    tracing::info!(expires_at = ?expires_at, "mail provider tokens obtained");

    Ok(OAuthTokens {
        access_token: raw.access_token,
        refresh_token: raw.refresh_token,
        expires_at,
        token_type: raw.token_type,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuthConfig {
        OAuthConfig::google("client-123", "secret-xyz", "http://localhost:8080/api/mail/callback")
    }

    #[test]
    fn challenge_matches_rfc7636_vector() {
        // Appendix B of RFC 7636.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            challenge_for(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn verifiers_are_unique_and_unpadded() {
        let a = generate_verifier().unwrap();
        let b = generate_verifier().unwrap();
        assert_ne!(a, b);
        assert!(!a.contains('='));
        assert!(a.len() >= 43); // 32 bytes base64url-encoded
    }

    #[test]
    fn authorization_url_carries_required_params() {
        let config = test_config();
        let url = authorization_url(&config, "state-abc", "challenge-def").unwrap();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        for needle in [
            "client_id=client-123",
            "response_type=code",
            "state=state-abc",
            "code_challenge=challenge-def",
            "code_challenge_method=S256",
            "redirect_uri=",
            "scope=",
        ] {
            assert!(url.contains(needle), "missing {needle} in {url}");
        }
    }

    #[test]
    fn google_config_has_mail_scopes() {
        let config = test_config();
        assert_eq!(config.scopes.len(), 4);
        assert!(config.scopes.iter().any(|s| s.ends_with("gmail.send")));
    }

    #[test]
    fn token_expiry() {
        let fresh = OAuthTokens {
            access_token: "t".into(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 3600),
            token_type: "Bearer".into(),
        };
        assert!(!fresh.is_expired());

        let stale = OAuthTokens {
            expires_at: Some(Utc::now().timestamp() - 10),
            ..fresh.clone()
        };
        assert!(stale.is_expired());

        let unbounded = OAuthTokens {
            expires_at: None,
            ..fresh
        };
        assert!(!unbounded.is_expired());
    }
}
