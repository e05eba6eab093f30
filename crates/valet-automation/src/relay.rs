//! Workflow webhook relay executor.
//!
//! Approved assistant actions (send an email, create an event, add a todo,
//! set a reminder) are not executed in-process — they are relayed to the
//! outbound workflow webhook, which owns the actual delivery.  The relay
//! posts the effective payload and reports the webhook's answer.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::traits::{ExecutionOutcome, Executor};

/// Default webhook request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Posts approved action payloads to the configured workflow webhook.
pub struct RelayExecutor {
    id: String,
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl RelayExecutor {
    /// Create a relay executor.
    ///
    /// `webhook_url` is `None` when no webhook is configured; runs then
    /// produce a failed outcome rather than an error.
    pub fn new(id: impl Into<String>, webhook_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            id: id.into(),
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl Executor for RelayExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, parameters: &Value) -> ExecutionOutcome {
        let Some(webhook_url) = &self.webhook_url else {
            return ExecutionOutcome::failed("workflow webhook not configured");
        };

        debug!(webhook = %webhook_url, "relaying approved action");

        let response = match self.client.post(webhook_url).json(parameters).send().await {
            Ok(response) => response,
            Err(e) => return ExecutionOutcome::failed(format!("webhook unreachable: {e}")),
        };

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return ExecutionOutcome::failed(format!("webhook returned {status}"));
        }

        ExecutionOutcome::ok(
            json!({"webhook_response": body}),
            "action relayed to workflow webhook",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn unconfigured_webhook_is_failed_outcome() {
        let relay = RelayExecutor::new("relay", None);
        let outcome = relay.run(&json!({"intent": "send_email"})).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("not configured"));
    }

    #[tokio::test]
    async fn unreachable_webhook_is_failed_outcome() {
        let relay = RelayExecutor::new("relay", Some("http://127.0.0.1:1/hook".into()));
        let outcome = relay.run(&json!({"intent": "send_email"})).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("unreachable"));
    }
}
