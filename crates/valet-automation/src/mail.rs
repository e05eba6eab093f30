//! Mail-provider executor.
//!
//! Backs the `email_automation` type.  Dispatchability is decided by the
//! OAuth collaborator's status — an unauthenticated provider produces a
//! failed outcome ("not authenticated"), and a provider-side rejection of
//! an authenticated call is likewise absorbed as data.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use valet_auth::MailAuth;

use crate::traits::{ExecutionOutcome, Executor};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Mail API base URL.
const MAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Runs inbox checks against the mail provider's REST API.
pub struct MailExecutor {
    id: String,
    client: reqwest::Client,
    auth: Arc<MailAuth>,
}

impl MailExecutor {
    /// Create a mail executor bound to the auth collaborator.
    pub fn new(id: impl Into<String>, auth: Arc<MailAuth>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            id: id.into(),
            client,
            auth,
        }
    }
}

#[async_trait]
impl Executor for MailExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, parameters: &Value) -> ExecutionOutcome {
        let Some(token) = self.auth.access_token().await else {
            return ExecutionOutcome::failed("mail provider not authenticated");
        };

        let action = parameters
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("check_inbox");

        match action {
            "check_inbox" => {
                debug!("checking mail inbox");
                let response = match self
                    .client
                    .get(format!("{MAIL_API_BASE}/messages?maxResults=10"))
                    .bearer_auth(&token)
                    .send()
                    .await
                {
                    Ok(response) => response,
                    Err(e) => {
                        return ExecutionOutcome::failed(format!("mail api unreachable: {e}"));
                    }
                };

                let status = response.status();
                if !status.is_success() {
                    return ExecutionOutcome::failed(format!("mail api returned {status}"));
                }

                let body: Value = response.json().await.unwrap_or(Value::Null);
                let count = body
                    .get("messages")
                    .and_then(Value::as_array)
                    .map(Vec::len)
                    .unwrap_or(0);

                ExecutionOutcome::ok(
                    json!({"action": action, "messages": body.get("messages").cloned().unwrap_or(Value::Null)}),
                    format!("inbox checked: {count} recent messages"),
                )
            }
            other => ExecutionOutcome::failed(format!("unsupported mail action `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unauthenticated_provider_is_failed_outcome() {
        let executor = MailExecutor::new("mail", Arc::new(MailAuth::unconfigured()));
        let outcome = executor.run(&json!({"action": "check_inbox"})).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "mail provider not authenticated");
    }
}
