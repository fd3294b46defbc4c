use anyhow::{anyhow, Context};
use chrono::{DateTime, FixedOffset, Utc};
use clap::Parser;
use rss_relay::config::load_destinations;
use rss_relay::scheduler::prepare_jobs;
use rss_relay::{
    FeedPoller, FetchConfig, PollPolicy, RssFeedSource, RunMode, Scheduler, SeenDb, SendConfig,
    TelegramTransport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Relays new RSS/Atom entries to Telegram chats.
///
/// Press Ctrl-C or send SIGTERM to stop; polls already running are finished
/// first.
#[derive(Debug, Parser)]
#[command(name = "rss-relay", version, about)]
struct Cli {
    /// Your bot's token
    bot_token: String,

    /// Interval in seconds to refresh the feeds
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// YAML file containing chats and feeds
    #[arg(long, default_value = "feeds.yaml")]
    feeds: PathBuf,

    /// SQLite db for storing seen URLs
    #[arg(long, default_value = "seen_urls.sqlite")]
    seendb: PathBuf,

    /// Poll every chat once and quit
    #[arg(long)]
    runonce: bool,

    /// Never deliver entries published before this RFC 3339 instant
    #[arg(long, default_value = "2019-03-20T14:30:00+08:00", value_parser = parse_instant)]
    since: DateTime<Utc>,

    /// UTC offset used to print publication times, e.g. +08:00
    #[arg(long, default_value = "+08:00", allow_hyphen_values = true, value_parser = parse_offset)]
    utc_offset: FixedOffset,

    /// Seconds before a feed download is abandoned
    #[arg(long, default_value_t = 30)]
    fetch_timeout: u64,

    /// Seconds before a message send counts as timed out
    #[arg(long, default_value_t = 10)]
    send_timeout: u64,

    /// Base URL of the Telegram Bot API
    #[arg(long, default_value = "https://api.telegram.org")]
    api_base: String,
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn parse_offset(s: &str) -> Result<FixedOffset, String> {
    s.parse::<FixedOffset>()
        .map_err(|e| format!("expected an offset like +08:00: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if cli.interval == 0 && !cli.runonce {
        return Err(anyhow!("--interval must be at least 1 second"));
    }

    let destinations = load_destinations(&cli.feeds)
        .with_context(|| format!("Error while loading {}", cli.feeds.display()))?;

    info!("RSS relay starting up...");

    let db = SeenDb::open(&cli.seendb)
        .await
        .with_context(|| format!("opening seen database {}", cli.seendb.display()))?;
    let jobs = prepare_jobs(&db, destinations).await?;

    let source = RssFeedSource::new(FetchConfig {
        timeout_seconds: cli.fetch_timeout,
        ..FetchConfig::default()
    })?;
    let transport = TelegramTransport::new(
        cli.bot_token,
        SendConfig {
            api_base: cli.api_base,
            timeout_seconds: cli.send_timeout,
        },
    )?;
    let policy = PollPolicy {
        cutoff: cli.since,
        display_offset: cli.utc_offset,
    };
    info!(
        "Delivering entries published since {}",
        cli.since.with_timezone(&cli.utc_offset)
    );

    let poller = Arc::new(FeedPoller::new(
        Arc::new(source),
        Arc::new(transport),
        policy,
    ));

    let mode = if cli.runonce {
        RunMode::Once
    } else {
        RunMode::Every(Duration::from_secs(cli.interval))
    };
    let scheduler = Scheduler::start(poller, jobs, mode);
    info!("Started {} chat tasks", scheduler.len());

    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = wait_for_signal().await {
            error!("Failed to listen for shutdown signals: {}", e);
            return;
        }
        info!("Received shutdown signal; finishing in-flight polls");
        shutdown.trigger();
    });

    let summaries = scheduler.join().await;
    for summary in &summaries {
        info!(
            "Chat '{}': {} polls, {} sent, {} feed errors",
            summary.destination, summary.polls, summary.totals.sent, summary.totals.feed_errors
        );
    }

    db.close().await;
    info!("RSS relay stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
