//! Intent policy registry.
//!
//! The registry is the single table mapping every known intent label to its
//! routing policy: answer conversationally, hold for human approval, or
//! execute directly.  It replaces what would otherwise be scattered
//! per-intent branching — the rest of the codebase only ever asks the
//! registry.
//!
//! The table is built once at startup and is read-only during request
//! processing.
//!
//! # Example
//!
//! ```rust
//! # use valet_intent::policy::{IntentPolicy, PolicyRegistry};
//! let registry = PolicyRegistry::with_defaults();
//!
//! let entry = registry.resolve("send_email").unwrap();
//! assert_eq!(entry.policy, IntentPolicy::ApprovalRequired);
//! assert!(entry.required_slots.contains(&"recipient_name"));
//!
//! assert!(registry.resolve("interpretive_dance").is_err());
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{IntentError, Result};
use crate::types::SlotMap;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How an intent is routed once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentPolicy {
    /// Reply immediately; no action, no approval.
    Conversational,
    /// Create a pending action and wait for a human decision.
    ApprovalRequired,
    /// Dispatch the automation synchronously, no confirmation.
    DirectExecution,
}

/// One row of the policy table.
#[derive(Debug, Clone, Serialize)]
pub struct IntentPolicyEntry {
    /// The intent label this entry applies to.
    pub intent: &'static str,
    /// Routing policy.
    pub policy: IntentPolicy,
    /// Slot names that must be present for the intent to be actionable.
    pub required_slots: &'static [&'static str],
    /// Wire name of the automation type this intent dispatches to, for
    /// approval-required and direct-execution intents that run automation.
    /// The dispatcher re-validates this against its own allow-list.
    pub automation_type: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Immutable intent → policy table.
pub struct PolicyRegistry {
    entries: HashMap<&'static str, IntentPolicyEntry>,
}

impl PolicyRegistry {
    /// Build the default policy table.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut entries = HashMap::new();

        let table: &[IntentPolicyEntry] = &[
            // Pure conversation.
            IntentPolicyEntry {
                intent: "general_chat",
                policy: IntentPolicy::Conversational,
                required_slots: &[],
                automation_type: None,
            },
            // Approval-gated assistant actions, relayed to the outbound
            // workflow webhook on approval.
            IntentPolicyEntry {
                intent: "send_email",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["recipient_name", "subject", "body"],
                automation_type: Some("workflow_relay"),
            },
            IntentPolicyEntry {
                intent: "create_event",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["event_title", "date", "time"],
                automation_type: Some("workflow_relay"),
            },
            IntentPolicyEntry {
                intent: "add_todo",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["task"],
                automation_type: Some("workflow_relay"),
            },
            IntentPolicyEntry {
                intent: "set_reminder",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["reminder_text"],
                automation_type: Some("workflow_relay"),
            },
            // Approval-gated web automation.
            IntentPolicyEntry {
                intent: "web_scraping",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["url"],
                automation_type: Some("web_scraping"),
            },
            IntentPolicyEntry {
                intent: "data_extraction",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["url"],
                automation_type: Some("data_extraction"),
            },
            IntentPolicyEntry {
                intent: "linkedin_insights",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["email", "password"],
                automation_type: Some("linkedin_insights"),
            },
            IntentPolicyEntry {
                intent: "email_automation",
                policy: IntentPolicy::ApprovalRequired,
                required_slots: &["email", "password"],
                automation_type: Some("email_automation"),
            },
            // Direct execution — runs without confirmation.
            IntentPolicyEntry {
                intent: "check_linkedin_notifications",
                policy: IntentPolicy::DirectExecution,
                required_slots: &[],
                automation_type: Some("linkedin_notifications"),
            },
            IntentPolicyEntry {
                intent: "scrape_price",
                policy: IntentPolicy::DirectExecution,
                required_slots: &[],
                automation_type: Some("price_scrape"),
            },
            IntentPolicyEntry {
                intent: "scrape_product_listings",
                policy: IntentPolicy::DirectExecution,
                required_slots: &[],
                automation_type: Some("product_listings"),
            },
            IntentPolicyEntry {
                intent: "linkedin_job_alerts",
                policy: IntentPolicy::DirectExecution,
                required_slots: &[],
                automation_type: Some("job_alerts"),
            },
            IntentPolicyEntry {
                intent: "check_website_updates",
                policy: IntentPolicy::DirectExecution,
                required_slots: &[],
                automation_type: Some("website_updates"),
            },
            IntentPolicyEntry {
                intent: "monitor_competitors",
                policy: IntentPolicy::DirectExecution,
                required_slots: &[],
                automation_type: Some("competitor_watch"),
            },
            IntentPolicyEntry {
                intent: "scrape_news_articles",
                policy: IntentPolicy::DirectExecution,
                required_slots: &[],
                automation_type: Some("news_articles"),
            },
        ];

        for entry in table {
            entries.insert(entry.intent, entry.clone());
        }

        Self { entries }
    }

    /// Resolve an intent label to its policy entry.
    ///
    /// Returns [`IntentError::UnknownIntent`] when the label is absent.
    /// Callers must treat that as conversational-with-warning, never as a
    /// failure of the request.
    pub fn resolve(&self, intent: &str) -> Result<&IntentPolicyEntry> {
        self.entries
            .get(intent)
            .ok_or_else(|| IntentError::UnknownIntent {
                intent: intent.to_string(),
            })
    }

    /// Slot names required for an intent to be actionable.
    ///
    /// Unknown intents require nothing (they degrade to conversation).
    pub fn required_slots(&self, intent: &str) -> &'static [&'static str] {
        self.entries
            .get(intent)
            .map(|e| e.required_slots)
            .unwrap_or(&[])
    }

    /// Required slots that are absent or blank in the given slot payload.
    pub fn missing_slots(&self, intent: &str, slots: &SlotMap) -> Vec<&'static str> {
        self.required_slots(intent)
            .iter()
            .filter(|name| {
                match slots.get(**name) {
                    Some(serde_json::Value::String(s)) => s.trim().is_empty(),
                    Some(serde_json::Value::Null) | None => true,
                    Some(_) => false,
                }
            })
            .copied()
            .collect()
    }

    /// Whether the label names a known direct-execution intent.
    pub fn is_direct(&self, intent: &str) -> bool {
        self.entries
            .get(intent)
            .is_some_and(|e| e.policy == IntentPolicy::DirectExecution)
    }

    /// All registered intent labels.
    pub fn intents(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    /// Number of registered intents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty (never true for the default table).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
