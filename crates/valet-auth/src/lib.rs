//! Mail-provider authentication for Valet.
//!
//! Implements the OAuth 2.0 authorization code flow with PKCE against the
//! mail provider's endpoints:
//!
//! - [`oauth`] — PKCE generation, authorization URL construction, and the
//!   code-for-token exchange.
//! - [`manager`] — the [`MailAuth`] handle the rest of the system talks to:
//!   `auth_start` / `auth_complete` / `status`.  The workflow engine only
//!   ever reads `status().authenticated`.

pub mod error;
pub mod manager;
pub mod oauth;

pub use error::{AuthError, Result};
pub use manager::{AuthRedirect, MailAuth, MailAuthStatus, TokenState};
pub use oauth::{OAuthConfig, OAuthTokens};
