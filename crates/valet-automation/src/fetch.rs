//! HTTP fetch executor — the scraping-style automation back-end.
//!
//! Fetches the target page over plain HTTP and extracts what it can without
//! a full browser:
//!
//!   - `<title>` extraction plus a tag-stripped text excerpt
//!   - In-memory LRU cache (5 min TTL) via moka so repeated checks of the
//!     same target don't hammer it
//!   - Real browser User-Agent to avoid being blocked outright
//!   - Per-request timeout owned by the client
//!
//! Every failure mode — bad URL, refused connection, non-success status —
//! is absorbed into a failed [`ExecutionOutcome`], never an error.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use regex::Regex;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::traits::{ExecutionOutcome, Executor};

// ═══════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Maximum excerpt length in characters.
const EXCERPT_MAX_CHARS: usize = 600;

/// Cache TTL in seconds.
const CACHE_TTL_SECS: u64 = 300;
/// Maximum cached entries.
const CACHE_MAX_ENTRIES: u64 = 100;

/// Realistic browser User-Agent to avoid being blocked.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

// ═══════════════════════════════════════════════════════════════════════
//  Executor
// ═══════════════════════════════════════════════════════════════════════

/// Fetch-based scraping executor with response caching.
pub struct FetchExecutor {
    id: String,
    client: reqwest::Client,
    cache: Cache<String, Value>,
}

impl FetchExecutor {
    /// Create a fetch executor.
    pub fn new(id: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_default();

        let cache = Cache::builder()
            .max_capacity(CACHE_MAX_ENTRIES)
            .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
            .build();

        Self {
            id: id.into(),
            client,
            cache,
        }
    }

    /// Pull the target URL out of the parameter payload.
    ///
    /// Scraping requests name it `url`; price checks historically used
    /// `product_url`.
    fn target_url(parameters: &Value) -> Option<&str> {
        parameters
            .get("url")
            .or_else(|| parameters.get("product_url"))
            .and_then(Value::as_str)
    }
}

#[async_trait]
impl Executor for FetchExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, parameters: &Value) -> ExecutionOutcome {
        let Some(raw_url) = Self::target_url(parameters) else {
            return ExecutionOutcome::failed("no target url in parameters");
        };

        let url = match Url::parse(raw_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => url,
            Ok(url) => {
                return ExecutionOutcome::failed(format!(
                    "unsupported url scheme `{}`",
                    url.scheme()
                ));
            }
            Err(e) => return ExecutionOutcome::failed(format!("invalid url: {e}")),
        };

        if let Some(cached) = self.cache.get(url.as_str()).await {
            debug!(url = %url, "fetch served from cache");
            return ExecutionOutcome::ok(cached, format!("fetched {url} (cached)"));
        }

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return ExecutionOutcome::failed(format!("request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return ExecutionOutcome::failed(format!("target returned {status}"));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ExecutionOutcome::failed(format!("failed to read body: {e}")),
        };

        let title = extract_title(&body);
        let excerpt = extract_excerpt(&body, EXCERPT_MAX_CHARS);

        let data = json!({
            "url": url.as_str(),
            "title": title,
            "content_length": body.len(),
            "excerpt": excerpt,
        });

        self.cache.insert(url.to_string(), data.clone()).await;

        ExecutionOutcome::ok(data, format!("fetched {url}"))
    }
}

// ── extraction helpers ───────────────────────────────────────────────

/// Pull the `<title>` text out of an HTML document.
fn extract_title(html: &str) -> Option<String> {
    let re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;
    let title = re.captures(html)?.get(1)?.as_str();
    let title = collapse_whitespace(title);
    (!title.is_empty()).then_some(title)
}

/// Strip tags and collapse whitespace to produce a plain-text excerpt.
fn extract_excerpt(html: &str, max_chars: usize) -> String {
    // Drop script/style blocks first so their contents don't leak in.
    let blocks = Regex::new(
        r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>|<noscript[^>]*>.*?</noscript>",
    )
    .map(|re| re.replace_all(html, " ").into_owned())
    .unwrap_or_else(|_| html.to_string());
    let text = Regex::new(r"(?s)<[^>]+>")
        .map(|re| re.replace_all(&blocks, " ").into_owned())
        .unwrap_or(blocks);

    let text = collapse_whitespace(&text);
    text.chars().take(max_chars).collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════
