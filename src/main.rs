//! # Starwatch
//!
//! Watches GitHub repositories and messages Telegram subscribers whenever one
//! of them gains stars.
//!
//! Usage:
//!   starwatch                      # Run the poller, bot and gateway
//!   starwatch serve --no-gateway   # Poller and bot only
//!   starwatch check                # Run one star check and print the outcome
//!   starwatch init                 # Write a default config file

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use starwatch_channels::{CommandHandler, TelegramChannel, run_bot};
use starwatch_core::StarwatchConfig;
use starwatch_github::GitHubClient;
use starwatch_scheduler::{BatchSettings, CycleOutcome, StarScheduler};
use starwatch_store::SqliteStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "starwatch",
    version,
    about = "⭐ Starwatch: Telegram alerts for new GitHub stars"
)]
struct Cli {
    /// Config file (default: ~/.starwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the recurring star poller, the Telegram bot and the HTTP gateway
    Serve {
        /// Don't start the HTTP gateway
        #[arg(long)]
        no_gateway: bool,
    },
    /// Run a single star check and exit
    Check,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(path: Option<&str>) -> Result<StarwatchConfig> {
    let config = match path {
        Some(p) => {
            let mut config = StarwatchConfig::load_from(&expand_path(p))?;
            config.apply_env();
            config.validate()?;
            config
        }
        None => StarwatchConfig::load()?,
    };
    Ok(config)
}

/// Everything the poller needs, wired from config.
struct Services {
    store: Arc<SqliteStore>,
    github: Arc<GitHubClient>,
    telegram: Arc<TelegramChannel>,
    scheduler: Arc<StarScheduler>,
}

fn build_services(config: &StarwatchConfig) -> Result<Services> {
    if config.telegram.bot_token.trim().is_empty() {
        bail!("telegram.bot_token is not set (config file or TELEGRAM_BOT_TOKEN)");
    }

    let db_path = config.store.expanded_path();
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("opening store at {}", db_path.display()))?,
    );
    tracing::info!("💾 Store: {}", db_path.display());

    let github = Arc::new(GitHubClient::new(config.github.clone())?);
    let telegram = Arc::new(TelegramChannel::new(config.telegram.clone())?);

    let scheduler = Arc::new(StarScheduler::new(
        store.clone(),
        github.clone(),
        telegram.clone(),
        BatchSettings::from_config(&config.poller),
    ));

    Ok(Services {
        store,
        github,
        telegram,
        scheduler,
    })
}

async fn serve(config: StarwatchConfig, no_gateway: bool) -> Result<()> {
    let services = build_services(&config)?;
    let scheduler = services.scheduler.clone();

    scheduler.start_recurring(config.poller.interval_minutes);
    if config.poller.run_on_start {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler.run_once().await;
        });
    }

    if config.telegram.enabled {
        let handler = Arc::new(CommandHandler::new(
            services.store.clone(),
            services.github.clone(),
        ));
        tokio::spawn(run_bot(services.telegram.clone(), handler));
    } else {
        tracing::info!("Telegram commands disabled, alerts only");
    }

    if config.gateway.enabled && !no_gateway {
        let state = starwatch_gateway::AppState::new(
            scheduler.clone(),
            &config.gateway,
            config.poller.interval_minutes,
        );
        starwatch_gateway::start(&config.gateway, state, async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    } else {
        tokio::signal::ctrl_c().await?;
    }

    tracing::info!("👋 Shutting down");
    scheduler.stop_recurring();
    Ok(())
}

async fn check_once(config: StarwatchConfig) -> Result<()> {
    let services = build_services(&config)?;
    let outcome = services.scheduler.run_once().await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    match outcome {
        CycleOutcome::Completed(_) => Ok(()),
        CycleOutcome::QuotaExhausted { reset_at, .. } => {
            bail!("GitHub quota exhausted until {}", reset_at.to_rfc3339())
        }
        CycleOutcome::Failed { error } => bail!("star check failed: {error}"),
        CycleOutcome::Skipped => Ok(()),
    }
}

fn init(path: Option<&str>, force: bool) -> Result<()> {
    let path = path
        .map(expand_path)
        .unwrap_or_else(StarwatchConfig::default_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    StarwatchConfig::default().save_to(&path)?;
    println!("✅ Wrote {}", path.display());
    println!("   Set telegram.bot_token and github.token, then run `starwatch serve`.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "starwatch=debug,starwatch_scheduler=debug,starwatch_channels=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    match cli.command.unwrap_or(Commands::Serve { no_gateway: false }) {
        Commands::Serve { no_gateway } => {
            let config = load_config(cli.config.as_deref())?;
            tracing::info!("⭐ Starwatch v{}", env!("CARGO_PKG_VERSION"));
            serve(config, no_gateway).await
        }
        Commands::Check => check_once(load_config(cli.config.as_deref())?).await,
        Commands::Init { force } => init(cli.config.as_deref(), force),
    }
}
