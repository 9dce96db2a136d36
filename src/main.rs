//! Issuebot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "issuebot")]
#[command(about = "Telegram bot bridging one user to an issue tracker and task runner")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = issuebot::config::Config::load()
        .with_context(|| "failed to load configuration from environment")?;
    tracing::info!(allowed_user = config.allowed_user_id, "configuration loaded");

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .with_context(|| "failed to build HTTP client")?;

    let services = issuebot::commands::Services {
        tracker: issuebot::tracker::IssueTracker::new(http.clone(), config.tracker.clone()),
        forge: config
            .forge
            .clone()
            .map(|c| issuebot::forge::Forge::new(http.clone(), c)),
        runner: config
            .runner
            .clone()
            .map(|c| issuebot::runner::TaskRunner::new(http.clone(), c)),
        agent: Arc::new(issuebot::agent::HttpAgent::new(
            http.clone(),
            config.agent.clone(),
        )),
    };

    let pending = Arc::new(issuebot::pending::PendingCommands::new(
        config.delivery.pending_ttl,
    ));
    issuebot::bot::IssueBot::spawn_sweeper(Arc::clone(&pending), config.delivery.sweep_interval);

    let bot = Bot::new(&config.bot_token);
    let app = Arc::new(issuebot::bot::IssueBot::new(
        bot, services, pending, http, &config,
    ));

    tracing::info!("issuebot started");
    app.run().await;
    tracing::info!("issuebot stopped");

    Ok(())
}
