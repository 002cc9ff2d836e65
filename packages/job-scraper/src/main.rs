//! Job scraper entrypoint.
//!
//! `run` drives the automated loop against a saved page; `inspect` issues
//! one command against a saved page and prints the result. Both wire the
//! same pipeline a live deployment would: panel bus, relay, page bus, agent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use page_agent::{DomAgent, StaticPage};
use relay::bus::MessageBus;
use relay::correlation::CorrelationClient;
use relay::protocol::{Action, FetchKind, Locator};
use relay::relay::Relay;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use job_scraper::{ControlPanel, HttpJobStore, Orchestrator, ScrapeConfig};

#[derive(Parser)]
#[command(name = "job-scraper", about = "Scrape job postings over the page-control protocol")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the automated scrape loop against a saved page.
    Run {
        /// Path to a saved HTML page.
        #[arg(long)]
        page: PathBuf,
        /// Optional JSON config overriding the default locators.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the submission endpoint.
        #[arg(long)]
        submit_url: Option<String>,
    },
    /// Issue one command against a saved page and print the result.
    Inspect {
        #[arg(long)]
        page: PathBuf,
        #[arg(long)]
        tag: String,
        #[arg(long)]
        attribute: String,
        #[arg(long)]
        pattern: String,
        #[arg(long, default_value_t = 0)]
        order: usize,
        #[arg(long, value_enum, default_value = "fetch-text")]
        action: InspectAction,
        /// Value for fill actions.
        #[arg(long)]
        value: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InspectAction {
    Click,
    Fill,
    FetchText,
    FetchContent,
    Highlight,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,job_scraper=debug,relay=debug,page_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
    dotenvy::dotenv().ok();

    match Cli::parse().command {
        Commands::Run {
            page,
            config,
            submit_url,
        } => run(page, config, submit_url).await,
        Commands::Inspect {
            page,
            tag,
            attribute,
            pattern,
            order,
            action,
            value,
        } => {
            let locator = Locator::new(tag, attribute, pattern).nth(order);
            inspect(page, locator, action, value).await
        }
    }
}

/// Bring up the full pipeline and loop until interrupted.
async fn run(page: PathBuf, config: Option<PathBuf>, submit_url: Option<String>) -> Result<()> {
    let mut config = match config {
        Some(path) => ScrapeConfig::from_file(&path)?,
        None => ScrapeConfig::default(),
    };
    if let Some(url) = submit_url {
        config = config.with_submit_url(url);
    }

    let (panel_bus, page_bus, client, triggers) = wire_page(&page).await?;
    tokio::spawn(Relay::new(panel_bus, page_bus).run(triggers.1));

    let panel = ControlPanel::new(client.clone(), triggers.0);
    panel.start();

    let stop_panel_flag = panel.run_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after current iteration");
            stop_panel_flag.store(false, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let store = HttpJobStore::new(config.submit_url.clone())?;
    let mut orchestrator = Orchestrator::new(client, config, store, panel.run_flag());
    let stats = orchestrator.run().await;

    tracing::info!(
        iterations = stats.iterations,
        submitted = stats.submitted,
        failed = stats.failed_submissions,
        "done"
    );
    Ok(())
}

/// One manual command through the same protocol path the loop uses.
async fn inspect(
    page: PathBuf,
    locator: Locator,
    action: InspectAction,
    value: Option<String>,
) -> Result<()> {
    let (panel_bus, page_bus, client, triggers) = wire_page(&page).await?;
    tokio::spawn(Relay::new(panel_bus, page_bus).run(triggers.1));
    let panel = ControlPanel::new(client, triggers.0);
    tokio::task::yield_now().await;

    if let InspectAction::Highlight = action {
        panel.highlight_all().await?;
        // Fire-and-forget; give the agent a beat to log its labels.
        tokio::time::sleep(Duration::from_millis(50)).await;
        return Ok(());
    }

    let (action, fetch) = match action {
        InspectAction::Click => (Action::Click, None),
        InspectAction::Fill => (Action::Fill, None),
        InspectAction::FetchText => (Action::Fetch, Some(FetchKind::Text)),
        InspectAction::FetchContent => (Action::Fetch, Some(FetchKind::Content)),
        InspectAction::Highlight => unreachable!(),
    };

    let result = panel
        .inspect(locator, action, value, fetch, Duration::from_secs(5))
        .await
        .context("no reply from page agent")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

type Wired = (
    MessageBus,
    MessageBus,
    CorrelationClient,
    (mpsc::Sender<relay::relay::RelayTrigger>, mpsc::Receiver<relay::relay::RelayTrigger>),
);

/// Load the page, start its agent, and build the panel-side client.
async fn wire_page(page: &Path) -> Result<Wired> {
    let html = std::fs::read_to_string(page)
        .with_context(|| format!("reading page from {}", page.display()))?;

    let panel_bus = MessageBus::new();
    let page_bus = MessageBus::new();

    let agent = DomAgent::new(StaticPage::from_html(&html));
    tokio::spawn(agent.run(page_bus.clone()));

    let client = CorrelationClient::new(panel_bus.clone());
    let triggers = mpsc::channel(16);
    tokio::task::yield_now().await;

    Ok((panel_bus, page_bus, client, triggers))
}
