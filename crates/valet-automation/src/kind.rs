//! The automation type allow-list.
//!
//! [`AutomationType`] is the closed vocabulary of automations the dispatcher
//! will run.  Parsing is strict: any string outside the list — including
//! types that used to exist and were removed — fails, and the dispatcher
//! surfaces that as a client error before any executor is consulted.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AutomationType
// ---------------------------------------------------------------------------

/// Every automation the system can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationType {
    /// Generic page scrape with optional selectors.
    WebScraping,
    /// Structured data extraction from a page.
    DataExtraction,
    /// LinkedIn profile/notification insights (credentialed).
    LinkedinInsights,
    /// Mail-provider automation (inbox checks etc.; credentialed).
    EmailAutomation,
    /// Relay an approved assistant action to the outbound workflow webhook.
    WorkflowRelay,
    /// Direct LinkedIn notification check.
    LinkedinNotifications,
    /// Direct price lookup for a product.
    PriceScrape,
    /// Direct product listing scrape.
    ProductListings,
    /// Direct LinkedIn job alert check.
    JobAlerts,
    /// Direct website change check.
    WebsiteUpdates,
    /// Direct competitor pricing watch.
    CompetitorWatch,
    /// Direct news article scrape.
    NewsArticles,
}

impl AutomationType {
    /// All supported types, in a stable order.
    pub const ALL: &'static [AutomationType] = &[
        Self::WebScraping,
        Self::DataExtraction,
        Self::LinkedinInsights,
        Self::EmailAutomation,
        Self::WorkflowRelay,
        Self::LinkedinNotifications,
        Self::PriceScrape,
        Self::ProductListings,
        Self::JobAlerts,
        Self::WebsiteUpdates,
        Self::CompetitorWatch,
        Self::NewsArticles,
    ];

    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WebScraping => "web_scraping",
            Self::DataExtraction => "data_extraction",
            Self::LinkedinInsights => "linkedin_insights",
            Self::EmailAutomation => "email_automation",
            Self::WorkflowRelay => "workflow_relay",
            Self::LinkedinNotifications => "linkedin_notifications",
            Self::PriceScrape => "price_scrape",
            Self::ProductListings => "product_listings",
            Self::JobAlerts => "job_alerts",
            Self::WebsiteUpdates => "website_updates",
            Self::CompetitorWatch => "competitor_watch",
            Self::NewsArticles => "news_articles",
        }
    }

    /// Parameters that must be present (and non-blank) for a request of
    /// this type to be structurally valid.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::WebScraping | Self::DataExtraction => &["url"],
            Self::LinkedinInsights | Self::EmailAutomation => &["email", "password"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for AutomationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutomationType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
