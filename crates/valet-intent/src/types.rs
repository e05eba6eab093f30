//! Classifier output types shared across the workspace.

use serde::{Deserialize, Serialize};

/// Slot payload extracted from a message: named fields keyed by slot name.
///
/// Values are arbitrary JSON because slot shapes are intent-specific (a
/// recipient name is a string, a selector map is an object).
pub type SlotMap = serde_json::Map<String, serde_json::Value>;

/// The structured result of classifying one chat message.
///
/// Produced by a [`crate::Classifier`], consumed (never mutated) by the
/// workflow engine.  A copy is embedded in the chat turn's intent snapshot
/// and, for approval-required intents, in the pending action payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    /// The intent label (e.g. `"send_email"`, `"general_chat"`).
    pub intent: String,

    /// Named slots extracted from the message.
    #[serde(default)]
    pub slots: SlotMap,

    /// Target URL, when the message referenced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Conversational reply text, when the classifier produced one
    /// (populated for `general_chat` and used as the assistant response).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl IntentResult {
    /// A conversational result with no slots.
    pub fn conversational(reply: impl Into<String>) -> Self {
        Self {
            intent: "general_chat".into(),
            slots: SlotMap::new(),
            url: None,
            reply: Some(reply.into()),
        }
    }

    /// Fetch a slot value as a string, if present and a string.
    pub fn slot_str(&self, name: &str) -> Option<&str> {
        self.slots.get(name).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversational_constructor() {
        let result = IntentResult::conversational("hello there");
        assert_eq!(result.intent, "general_chat");
        assert!(result.slots.is_empty());
        assert_eq!(result.reply.as_deref(), Some("hello there"));
    }

    #[test]
    fn slot_str_accessor() {
        let mut slots = SlotMap::new();
        slots.insert("recipient_name".into(), "Sarah".into());
        slots.insert("count".into(), 3.into());

        let result = IntentResult {
            intent: "send_email".into(),
            slots,
            url: None,
            reply: None,
        };

        assert_eq!(result.slot_str("recipient_name"), Some("Sarah"));
        assert_eq!(result.slot_str("count"), None); // not a string
        assert_eq!(result.slot_str("missing"), None);
    }

    #[test]
    fn deserialize_with_missing_optionals() {
        let result: IntentResult =
            serde_json::from_str(r#"{"intent": "general_chat"}"#).unwrap();
        assert_eq!(result.intent, "general_chat");
        assert!(result.slots.is_empty());
        assert!(result.url.is_none());
        assert!(result.reply.is_none());
    }
}
