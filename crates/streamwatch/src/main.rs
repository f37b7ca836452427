//! Streamwatch CLI - announce live and upcoming Holodex streams to Discord.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use streamwatch::config::{
    horizon_from_minutes, offset_from_minutes, DEFAULT_CONCURRENCY, DEFAULT_HORIZON_MINUTES,
    DEFAULT_IDENTITY_NAME, DEFAULT_TIMEOUT_SECS, DEFAULT_UTC_OFFSET_MINUTES,
};
use streamwatch::holodex::DEFAULT_API_BASE;
use streamwatch::notify::render::text_line;
use streamwatch::{
    BatchBuilder, DedupPolicy, Delivery, DiscordSink, Dispatcher, HolodexClient, Identity,
    IdentityPolicy, ItemKind, JsonFileStore, PollConfig, Poller, RenderMode, RunSummary,
    TimeWindow, TrackedChannels, WatchConfig,
};

/// Streamwatch - watch tracked channels on Holodex and announce new streams.
#[derive(Parser)]
#[command(name = "streamwatch")]
#[command(about = "Announce live and upcoming Holodex streams to a Discord webhook")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single poll cycle and send anything new (for cron use)
    Poll {
        #[command(flatten)]
        settings: Settings,

        /// Print the messages that would be sent instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print who is live and who starts soon, without notifying
    List {
        #[command(flatten)]
        settings: Settings,
    },
}

/// Settings shared by every command.
#[derive(Args, Debug)]
pub struct Settings {
    /// Holodex API key
    #[arg(long, env = "HOLODEX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Discord webhook URL
    #[arg(long, env = "DISCORD_WEBHOOK_URL", hide_env_values = true)]
    webhook_url: Option<String>,

    /// Tracked channel list (JSON array of ids or {id, nickname, avatar_url})
    #[arg(long, env = "STREAMWATCH_CHANNELS", default_value = "channels.json")]
    channels: PathBuf,

    /// Notified set state file
    #[arg(long, env = "STREAMWATCH_STATE", default_value = "notified.json")]
    state: PathBuf,

    /// Holodex API base URL
    #[arg(long, env = "HOLODEX_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Announce upcoming streams starting within this many minutes
    #[arg(long, env = "STREAMWATCH_HORIZON_MINUTES", default_value_t = DEFAULT_HORIZON_MINUTES)]
    horizon_minutes: u32,

    /// Display times at this offset from UTC, in minutes
    #[arg(
        long,
        env = "STREAMWATCH_UTC_OFFSET_MINUTES",
        default_value_t = DEFAULT_UTC_OFFSET_MINUTES,
        allow_negative_numbers = true
    )]
    utc_offset_minutes: i32,

    /// Per-request timeout in seconds
    #[arg(long, env = "STREAMWATCH_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Holodex requests in flight at once
    #[arg(long, env = "STREAMWATCH_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Which streams are deduplicated (all, upcoming-only)
    #[arg(long, env = "STREAMWATCH_DEDUP", default_value = "all")]
    dedup: DedupPolicy,

    /// How the message identity is picked (latest-direct-live, latest-any, first-tracked)
    #[arg(long, env = "STREAMWATCH_IDENTITY", default_value = "latest-direct-live")]
    identity: IdentityPolicy,

    /// Message layout (embeds, text)
    #[arg(long, env = "STREAMWATCH_RENDER", default_value = "embeds")]
    render: RenderMode,

    /// Webhook name used when no channel identity applies
    #[arg(long, env = "STREAMWATCH_DEFAULT_NAME", default_value = DEFAULT_IDENTITY_NAME)]
    default_name: String,

    /// Webhook avatar used when no channel avatar applies
    #[arg(long, env = "STREAMWATCH_DEFAULT_AVATAR")]
    default_avatar: Option<String>,
}

impl Settings {
    fn into_config(self) -> Result<WatchConfig> {
        let tracked = TrackedChannels::load(&self.channels)?;
        let mut config = WatchConfig::new(self.api_key, tracked)?;

        config.api_base = self.api_base;
        config.webhook_url = self.webhook_url;
        config.state_path = self.state;
        config.horizon = horizon_from_minutes(self.horizon_minutes);
        config.display_offset = offset_from_minutes(self.utc_offset_minutes)?;
        config.request_timeout = Duration::from_secs(self.timeout_secs.max(1));
        config.concurrency = self.concurrency.max(1);
        config.dedup_policy = self.dedup;
        config.identity_policy = self.identity;
        config.render_mode = self.render;
        config.default_identity = Identity::new(self.default_name, self.default_avatar);

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("streamwatch=debug,info")
    } else {
        EnvFilter::new("streamwatch=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Poll { settings, dry_run } => {
            let config = settings.into_config()?;
            tracing::info!(
                channels = config.tracked.len(),
                state = %config.state_path.display(),
                horizon_minutes = config.horizon.num_minutes(),
                dedup = %config.dedup_policy,
                dry_run,
                "Starting poll cycle"
            );
            run_poll(config, dry_run).await
        }
        Commands::List { settings } => run_list(settings.into_config()?).await,
    }
}

async fn run_poll(config: WatchConfig, dry_run: bool) -> Result<()> {
    // Fail on a missing webhook before any network activity.
    let webhook_url = if dry_run {
        config.webhook_url.clone().unwrap_or_default()
    } else {
        config.webhook_url()?.to_string()
    };

    let source = HolodexClient::new(&config.api_base, &config.api_key, config.request_timeout)
        .context("Failed to create Holodex client")?;
    let sink = DiscordSink::new(
        webhook_url,
        config.render_mode,
        config.display_offset,
        config.request_timeout,
    )
    .context("Failed to create Discord client")?;
    let store = JsonFileStore::new(&config.state_path);

    let sink = Arc::new(sink);
    let dispatcher = Dispatcher::new(config, Arc::new(source), sink.clone(), Arc::new(store));

    if dry_run {
        let plan = dispatcher.plan(Utc::now()).await?;
        print_summary(&plan.summary);
        match &plan.batch {
            Some(batch) => {
                for message in sink.render(batch) {
                    println!("{}", serde_json::to_string_pretty(&message)?);
                }
            }
            None => println!("\n📭 Nothing new to announce"),
        }
        return Ok(());
    }

    let summary = dispatcher.run_once(Utc::now()).await?;
    print_summary(&summary);

    if let Delivery::Failed(reason) = &summary.delivery {
        bail!("Notification was not delivered: {reason}");
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Poll Cycle Summary");
    println!("   Queries: {}", summary.queries);
    if summary.failed_queries > 0 {
        println!("   Failed queries: {}", summary.failed_queries);
    }
    println!("   Fetched: {}", summary.fetched);
    println!("   Announced: {}", summary.announced);
    println!("   Delivery: {}", summary.delivery);
    if summary.delivered > 0 {
        println!("   Delivered: {}", summary.delivered);
        println!("   State saved: {}", summary.persisted);
    }
}

async fn run_list(config: WatchConfig) -> Result<()> {
    let source = HolodexClient::new(&config.api_base, &config.api_key, config.request_timeout)
        .context("Failed to create Holodex client")?;
    let poller = Poller::new(Arc::new(source), PollConfig::from(&config));
    let snapshot = poller.poll(&config.tracked).await;

    let builder = BatchBuilder::new(
        &config.tracked,
        TimeWindow::starting_at(Utc::now(), config.horizon),
        config.identity_policy,
        &config.default_identity,
    );
    let (live, upcoming): (Vec<_>, Vec<_>) = builder
        .items(snapshot.into_inputs())
        .into_iter()
        .partition(|item| item.is_live());

    println!("🔴 Live now\n");
    if live.is_empty() {
        println!("   Nobody is live right now");
    }
    for item in &live {
        println!("   {}", text_line(item, config.display_offset));
    }

    println!(
        "\n⏰ Starting within {} minutes\n",
        config.horizon.num_minutes()
    );
    if upcoming.is_empty() {
        println!("   Nothing starting soon");
    }
    for item in &upcoming {
        println!("   {}", text_line(item, config.display_offset));
    }

    let collabs = live
        .iter()
        .chain(&upcoming)
        .filter(|item| item.kind == ItemKind::Mentioned)
        .count();
    println!(
        "\nTotal: {} streams ({collabs} collaborations)",
        live.len() + upcoming.len()
    );

    Ok(())
}
