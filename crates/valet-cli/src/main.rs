//! CLI entry point for Valet.
//!
//! This binary provides the `valet` command: it assembles the classifier,
//! store, dispatcher, mail auth, and workflow engine from environment
//! configuration and serves the HTTP gateway.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use valet_automation::{
    AutomationType, Dispatcher, Executor, FetchExecutor, LinkedinExecutor, MailExecutor,
    RelayExecutor,
};
use valet_auth::{MailAuth, OAuthConfig};
use valet_engine::WorkflowCoordinator;
use valet_gateway::{AppState, GatewayConfig, GatewayServer};
use valet_intent::{Classifier, ClassifierConfig, PolicyRegistry, TieredClassifier};
use valet_store::{Database, HistoryStore};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Valet — a chat assistant with approval-gated automation.
#[derive(Parser)]
#[command(
    name = "valet",
    version,
    about = "Valet — intent routing and approval workflow engine"
)]
struct Cli {
    /// Address to bind the HTTP gateway to.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Path to the SQLite database file.
    #[arg(long, default_value = "data/valet.db")]
    db: String,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("starting valet");

    // Store.
    if let Some(parent) = std::path::Path::new(&cli.db).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    let db = Database::open_and_migrate(cli.db.clone())
        .await
        .context("failed to open database")?;
    let history = HistoryStore::new(db.clone());
    info!(path = %cli.db, "store initialized");

    // Classifier.
    let classifier: Arc<dyn Classifier> = match std::env::var("VALET_LLM_API_KEY") {
        Ok(api_key) => {
            let base_url = std::env::var("VALET_LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into());
            let model = std::env::var("VALET_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".into());
            info!(base_url = %base_url, model = %model, "classifier model tier configured");
            Arc::new(TieredClassifier::new(ClassifierConfig::openai_compatible(
                api_key, base_url, model,
            )))
        }
        Err(_) => {
            warn!("VALET_LLM_API_KEY not set; classifier runs fast path only");
            Arc::new(TieredClassifier::local_only())
        }
    };

    // Mail auth.
    let mail = match (
        std::env::var("VALET_MAIL_CLIENT_ID"),
        std::env::var("VALET_MAIL_CLIENT_SECRET"),
    ) {
        (Ok(client_id), Ok(client_secret)) => {
            let redirect_uri = std::env::var("VALET_MAIL_REDIRECT_URI").unwrap_or_else(|_| {
                format!("http://{}:{}/api/mail/callback", cli.bind, cli.port)
            });
            info!("mail provider OAuth configured");
            Arc::new(MailAuth::new(OAuthConfig::google(
                client_id,
                client_secret,
                redirect_uri,
            )))
        }
        _ => {
            warn!("mail provider OAuth not configured");
            Arc::new(MailAuth::unconfigured())
        }
    };

    // Dispatcher and executors.
    let webhook_url = std::env::var("VALET_WORKFLOW_WEBHOOK_URL").ok();
    if webhook_url.is_none() {
        warn!("VALET_WORKFLOW_WEBHOOK_URL not set; approved actions will not be relayed");
    }

    let mut dispatcher = Dispatcher::new(history.clone());

    let fetch = Arc::new(FetchExecutor::new("fetch")) as Arc<dyn Executor>;
    for kind in [
        AutomationType::WebScraping,
        AutomationType::DataExtraction,
        AutomationType::PriceScrape,
        AutomationType::ProductListings,
        AutomationType::WebsiteUpdates,
        AutomationType::CompetitorWatch,
        AutomationType::NewsArticles,
    ] {
        dispatcher.register(kind, Arc::clone(&fetch));
    }

    let linkedin = Arc::new(LinkedinExecutor::new("linkedin")) as Arc<dyn Executor>;
    for kind in [
        AutomationType::LinkedinInsights,
        AutomationType::LinkedinNotifications,
        AutomationType::JobAlerts,
    ] {
        dispatcher.register(kind, Arc::clone(&linkedin));
    }

    dispatcher.register(
        AutomationType::EmailAutomation,
        Arc::new(MailExecutor::new("mail", Arc::clone(&mail))) as Arc<dyn Executor>,
    );
    dispatcher.register(
        AutomationType::WorkflowRelay,
        Arc::new(RelayExecutor::new("relay", webhook_url)) as Arc<dyn Executor>,
    );

    // Engine and gateway.
    let engine = WorkflowCoordinator::new(
        classifier,
        PolicyRegistry::with_defaults(),
        Arc::new(dispatcher),
        history,
    );

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
        mail,
        db,
    });

    let server = GatewayServer::new(
        GatewayConfig {
            bind_addr: cli.bind,
            port: cli.port,
        },
        state,
    );

    server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("gateway failed: {e}"))
}
