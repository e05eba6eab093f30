//! Message classifier — turns raw chat text into an [`IntentResult`].
//!
//! The default implementation uses a two-tier approach:
//!
//! 1. **Fast path**: exact phrase matching via [`aho_corasick`] plus regex
//!    patterns with named captures for well-known commands.  Captures become
//!    slots directly, no model call needed.
//! 2. **Slow path**: an OpenAI-compatible chat-completions call with a
//!    JSON-only prompt covering the full intent vocabulary.
//!
//! Transport failures, non-success statuses, and unusable model output all
//! surface as [`IntentError::Unavailable`] — the engine degrades those to a
//! conversational fallback rather than failing the turn.

use std::collections::HashMap;
use std::time::Duration;

use aho_corasick::AhoCorasick;
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::error::{IntentError, Result};
use crate::types::{IntentResult, SlotMap};

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Conversation context handed to the classifier alongside the message.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    /// The session the message belongs to.
    pub session_id: String,
    /// Recent `(user_message, assistant_response)` pairs, oldest first.
    pub recent_turns: Vec<(String, String)>,
}

impl SessionContext {
    /// Context for a session with no prior turns.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            recent_turns: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The classifier boundary.
///
/// Implementations may be arbitrarily expensive (a remote model) or trivial
/// (a test stub); the engine only depends on this trait.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one chat message into an intent with slots.
    async fn classify(&self, message: &str, context: &SessionContext) -> Result<IntentResult>;
}

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

const SYSTEM_PROMPT: &str = r#"You are an intent classifier for a personal assistant. Given a user message, respond ONLY with a JSON object:
{
  "intent": "the_intent_label",
  "slots": {"field": "value", ...},
  "url": "https://... (only when the message names one)",
  "reply": "conversational answer (only for general_chat)"
}

Intent labels and their slots:
- general_chat (no slots; put your answer in "reply")
- send_email (slots: recipient_name, subject, body — draft subject and body)
- create_event (slots: event_title, date, time)
- add_todo (slots: task)
- set_reminder (slots: reminder_text)
- web_scraping (slots: url, selectors)
- data_extraction (slots: url, selectors)
- linkedin_insights (slots: insight_type)
- email_automation (slots: provider, action)
- check_linkedin_notifications (no slots)
- scrape_price (slots: product)
- scrape_product_listings (slots: product, site)
- linkedin_job_alerts (slots: keywords)
- check_website_updates (slots: site)
- monitor_competitors (slots: target)
- scrape_news_articles (slots: topic)

Use general_chat for anything that is not clearly one of the above."#;

// ---------------------------------------------------------------------------
// Fast path
// ---------------------------------------------------------------------------

/// A regex route whose named captures become slots.
struct PatternRoute {
    intent: &'static str,
    compiled: Regex,
}

/// Local phrase/pattern matcher consulted before the model.
struct FastPath {
    /// Exact phrases (lowercased) and their intent labels.
    phrases: Vec<(&'static str, &'static str)>,
    automaton: Option<AhoCorasick>,
    patterns: Vec<PatternRoute>,
}

impl FastPath {
    fn with_defaults() -> Self {
        let phrases: Vec<(&'static str, &'static str)> = vec![
            ("check my linkedin notifications", "check_linkedin_notifications"),
            ("check linkedin notifications", "check_linkedin_notifications"),
            ("check linkedin job alerts", "linkedin_job_alerts"),
        ];

        let raw_patterns: &[(&str, &str)] = &[
            (
                r"scrape .*(?:from|at) (?P<url>https?://\S+)",
                "web_scraping",
            ),
            (
                r"(?:current )?price of (?P<product>.+?) on (?P<site>\S+)",
                "scrape_price",
            ),
            (
                r"monitor competitor pricing for (?P<target>.+)",
                "monitor_competitors",
            ),
        ];

        let patterns = raw_patterns
            .iter()
            .filter_map(|&(pattern, intent)| {
                match Regex::new(pattern) {
                    Ok(compiled) => Some(PatternRoute { intent, compiled }),
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "invalid fast-path pattern skipped");
                        None
                    }
                }
            })
            .collect();

        let automaton = AhoCorasick::new(phrases.iter().map(|(p, _)| *p)).ok();

        Self {
            phrases,
            automaton,
            patterns,
        }
    }

    /// Attempt a local match.  Returns `None` to signal model fallback.
    fn try_match(&self, message: &str) -> Option<IntentResult> {
        let lowered = message.to_lowercase();

        // Tier 1: exact phrase, longest match wins.
        if let Some(ac) = &self.automaton {
            let mut best: Option<(usize, usize)> = None;
            for mat in ac.find_overlapping_iter(&lowered) {
                let len = mat.end() - mat.start();
                if best.is_none_or(|(_, best_len)| len > best_len) {
                    best = Some((mat.pattern().as_usize(), len));
                }
            }
            if let Some((idx, _)) = best {
                let (_, intent) = self.phrases[idx];
                debug!(intent = %intent, "fast-path exact match");
                return Some(IntentResult {
                    intent: intent.to_string(),
                    slots: SlotMap::new(),
                    url: None,
                    reply: None,
                });
            }
        }

        // Tier 2: pattern with named captures.
        for route in &self.patterns {
            if let Some(caps) = route.compiled.captures(&lowered) {
                let mut slots = SlotMap::new();
                let mut url = None;
                for name in route.compiled.capture_names().flatten() {
                    if let Some(m) = caps.name(name) {
                        if name == "url" {
                            url = Some(m.as_str().to_string());
                        }
                        slots.insert(name.to_string(), m.as_str().into());
                    }
                }
                debug!(intent = %route.intent, "fast-path pattern match");
                return Some(IntentResult {
                    intent: route.intent.to_string(),
                    slots,
                    url,
                    reply: None,
                });
            }
        }

        None
    }
}

// ---------------------------------------------------------------------------
// Tiered classifier
// ---------------------------------------------------------------------------

/// Connection settings for the model tier.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// API key for the chat-completions endpoint.
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl ClassifierConfig {
    /// Configuration against an OpenAI-compatible endpoint.
    pub fn openai_compatible(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            timeout_secs: 30,
        }
    }
}

/// The default two-tier classifier: fast local matching, then the model.
pub struct TieredClassifier {
    fast_path: FastPath,
    config: Option<ClassifierConfig>,
    client: reqwest::Client,
}

impl TieredClassifier {
    /// A classifier with no model tier.  Messages the fast path cannot
    /// resolve fail with [`IntentError::Unavailable`].
    #[must_use]
    pub fn local_only() -> Self {
        Self {
            fast_path: FastPath::with_defaults(),
            config: None,
            client: reqwest::Client::new(),
        }
    }

    /// A classifier with model fallback.
    pub fn new(config: ClassifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            fast_path: FastPath::with_defaults(),
            config: Some(config),
            client,
        }
    }

    /// Call the chat-completions endpoint and parse its JSON reply.
    async fn model_classify(
        &self,
        config: &ClassifierConfig,
        message: &str,
        context: &SessionContext,
    ) -> Result<IntentResult> {
        let mut messages = vec![json!({"role": "system", "content": SYSTEM_PROMPT})];
        for (user, assistant) in &context.recent_turns {
            messages.push(json!({"role": "user", "content": user}));
            messages.push(json!({"role": "assistant", "content": assistant}));
        }
        messages.push(json!({"role": "user", "content": message}));

        let body = json!({
            "model": config.model,
            "messages": messages,
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", config.base_url))
            .bearer_auth(&config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntentError::Unavailable {
                reason: format!("classifier endpoint returned {status}"),
            });
        }

        let payload: Value = response.json().await?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| IntentError::Unavailable {
                reason: "classifier response carried no message content".into(),
            })?;

        parse_model_output(content)
    }
}

/// Parse the raw model text into an [`IntentResult`].
///
/// Handles markdown code-block wrappers that models sometimes emit.
fn parse_model_output(content: &str) -> Result<IntentResult> {
    let cleaned = content.trim();
    let cleaned = cleaned.strip_prefix("```json").unwrap_or(cleaned);
    let cleaned = cleaned.strip_prefix("```").unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    let cleaned = cleaned.trim();

    let parsed: Value = serde_json::from_str(cleaned).map_err(|e| IntentError::Unavailable {
        reason: format!("classifier output is not JSON: {e}"),
    })?;

    let intent = parsed["intent"]
        .as_str()
        .ok_or_else(|| IntentError::ParseFailed {
            reason: "missing `intent` field".into(),
        })?
        .to_string();

    let slots = parsed["slots"].as_object().cloned().unwrap_or_default();
    let url = parsed["url"].as_str().map(str::to_string);
    let reply = parsed["reply"].as_str().map(str::to_string);

    Ok(IntentResult {
        intent,
        slots,
        url,
        reply,
    })
}

#[async_trait]
impl Classifier for TieredClassifier {
    async fn classify(&self, message: &str, context: &SessionContext) -> Result<IntentResult> {
        let message = message.trim();
        if message.is_empty() {
            return Err(IntentError::ParseFailed {
                reason: "empty message".into(),
            });
        }

        if let Some(result) = self.fast_path.try_match(message) {
            info!(
                session_id = %context.session_id,
                intent = %result.intent,
                "message classified via fast path"
            );
            return Ok(result);
        }

        let Some(config) = &self.config else {
            return Err(IntentError::Unavailable {
                reason: "no model tier configured".into(),
            });
        };

        let result = self.model_classify(config, message, context).await?;
        info!(
            session_id = %context.session_id,
            intent = %result.intent,
            "message classified via model"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fast_path_exact_phrase() {
        let classifier = TieredClassifier::local_only();
        let ctx = SessionContext::new("s1");

        let result = classifier
            .classify("Check my LinkedIn notifications", &ctx)
            .await
            .unwrap();
        assert_eq!(result.intent, "check_linkedin_notifications");
    }

    #[tokio::test]
    async fn fast_path_pattern_extracts_url_slot() {
        let classifier = TieredClassifier::local_only();
        let ctx = SessionContext::new("s1");

        let result = classifier
            .classify("Scrape the title from https://example.com/page", &ctx)
            .await
            .unwrap();
        assert_eq!(result.intent, "web_scraping");
        assert_eq!(result.url.as_deref(), Some("https://example.com/page"));
        assert_eq!(result.slot_str("url"), Some("https://example.com/page"));
    }

    #[tokio::test]
    async fn fast_path_price_pattern() {
        let classifier = TieredClassifier::local_only();
        let ctx = SessionContext::new("s1");

        let result = classifier
            .classify("What's the current price of laptop on Amazon?", &ctx)
            .await
            .unwrap();
        assert_eq!(result.intent, "scrape_price");
        assert_eq!(result.slot_str("product"), Some("laptop"));
    }

    #[tokio::test]
    async fn no_model_tier_is_unavailable() {
        let classifier = TieredClassifier::local_only();
        let ctx = SessionContext::new("s1");

        let result = classifier.classify("Hello, how are you today?", &ctx).await;
        assert!(matches!(result, Err(IntentError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn empty_message_is_parse_failure() {
        let classifier = TieredClassifier::local_only();
        let ctx = SessionContext::new("s1");

        let result = classifier.classify("   ", &ctx).await;
        assert!(matches!(result, Err(IntentError::ParseFailed { .. })));
    }

    #[test]
    fn parse_model_output_plain_json() {
        let result = parse_model_output(
            r#"{"intent": "add_todo", "slots": {"task": "finish the project"}}"#,
        )
        .unwrap();
        assert_eq!(result.intent, "add_todo");
        assert_eq!(result.slot_str("task"), Some("finish the project"));
    }

    #[test]
    fn parse_model_output_fenced_json() {
        let result = parse_model_output(
            "```json\n{\"intent\": \"general_chat\", \"reply\": \"Hi!\"}\n```",
        )
        .unwrap();
        assert_eq!(result.intent, "general_chat");
        assert_eq!(result.reply.as_deref(), Some("Hi!"));
    }

    #[test]
    fn parse_model_output_garbage_is_unavailable() {
        let result = parse_model_output("I think the user wants to chat.");
        assert!(matches!(result, Err(IntentError::Unavailable { .. })));
    }

    #[test]
    fn parse_model_output_missing_intent_is_parse_failure() {
        let result = parse_model_output(r#"{"slots": {}}"#);
        assert!(matches!(result, Err(IntentError::ParseFailed { .. })));
    }
}
