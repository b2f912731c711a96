//! CLI administration tool for verified-shortener.
//!
//! Inspects records, requeues verifications and manages the dead letter
//! list without requiring HTTP API access.
//!
//! # Usage
//!
//! ```bash
//! # Show a record and its verification state
//! cargo run --bin admin -- link show 2a1b4024
//!
//! # List records still awaiting a verdict
//! cargo run --bin admin -- link pending --limit 20
//!
//! # Queue a fresh verification for a record
//! cargo run --bin admin -- link reverify 2a1b4024
//!
//! # Inspect and replay dead-lettered verification messages
//! cargo run --bin admin -- queue dead-letters
//! cargo run --bin admin -- queue replay
//!
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required): PostgreSQL connection string
//! - `REDIS_URL` (required for `link reverify` and `queue`): Redis broker
//! - `VERIFICATION_TOPIC` (default `safe`): verification queue name

use verified_shortener::config::{self, Config};
use verified_shortener::domain::entities::{Safety, ShortUrl};
use verified_shortener::domain::repositories::{ClickRepository, ShortUrlRepository};
use verified_shortener::domain::verification_request::VerificationRequest;
use verified_shortener::infrastructure::cache::MemoryCache;
use verified_shortener::infrastructure::messaging::{MessageBroker, RedisBroker};
use verified_shortener::infrastructure::persistence::{PgClickRepository, PgShortUrlRepository};
use verified_shortener::state::{AppState, ServiceSettings};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;

/// CLI tool for managing verified-shortener.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect and re-verify short URLs
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Verification queue maintenance
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Show statistics
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Show a record
    Show { hash: String },

    /// List records awaiting a verdict, oldest first
    Pending {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Publish a fresh verification request for a record
    Reverify {
        hash: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// List dead-lettered verification messages
    DeadLetters,

    /// Move dead-lettered messages back to the queue with a fresh attempt budget
    Replay {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env()?;

    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL must be set")?;

    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    let pool = Arc::new(pool);

    match cli.command {
        Commands::Link { action } => handle_link_action(action, &config, pool).await?,
        Commands::Queue { action } => handle_queue_action(action, &config).await?,
        Commands::Stats => handle_stats(pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

async fn connect_broker(config: &Config) -> Result<RedisBroker> {
    let redis_url = config
        .redis_url
        .as_deref()
        .context("REDIS_URL must be set for queue operations")?;

    RedisBroker::connect(redis_url, config.broker_poll_interval())
        .await
        .context("Failed to connect to Redis")
}

/// Dispatches record commands.
async fn handle_link_action(action: LinkAction, config: &Config, pool: Arc<PgPool>) -> Result<()> {
    let repo = PgShortUrlRepository::new(pool.clone());

    match action {
        LinkAction::Show { hash } => {
            let record = repo
                .find_by_hash(&hash)
                .await
                .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
                .context("Short URL not found")?;

            println!("{}", "🔗 Short URL".bright_blue().bold());
            println!();
            print_record(&record);
            println!();
        }
        LinkAction::Pending { limit } => list_pending(&repo, limit).await?,
        LinkAction::Reverify { hash, yes } => reverify(pool, config, &hash, yes).await?,
    }

    Ok(())
}

fn print_record(record: &ShortUrl) {
    println!("  Hash:      {}", record.hash.cyan());
    println!("  Target:    {}", record.target.bright_white());
    println!("  Safety:    {}", colored_safety(record.safety));
    println!("  Redirect:  {}", record.mode.status_code());
    if let Some(sponsor) = &record.sponsor {
        println!("  Sponsor:   {}", sponsor);
    }
    println!(
        "  Created:   {}",
        record
            .created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .bright_black()
    );
    if let Some(verified_at) = record.verified_at {
        println!(
            "  Verified:  {}",
            verified_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
                .bright_black()
        );
    }
}

fn colored_safety(safety: Safety) -> ColoredString {
    match safety {
        Safety::Unknown => "UNKNOWN".yellow(),
        Safety::Safe => "SAFE".green(),
        Safety::Unsafe => "UNSAFE".red(),
    }
}

/// Lists records still marked `unknown`.
///
/// # Output Format
///
/// ```text
/// ⏳ Pending Verification
///
///   Hash      Created              Target
///   ─────────────────────────────────────────────────────────
///   2a1b4024  2024-01-15 10:30     http://example.com/
/// ```
async fn list_pending(repo: &PgShortUrlRepository, limit: i64) -> Result<()> {
    println!("{}", "⏳ Pending Verification".bright_blue().bold());
    println!();

    let records = repo
        .list_pending(limit)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list pending records: {}", e))?;

    if records.is_empty() {
        println!("{}", "  No records awaiting verification".green());
        return Ok(());
    }

    println!(
        "  {:<9} {:<20} {}",
        "Hash".bright_white().bold(),
        "Created".bright_white().bold(),
        "Target".bright_white().bold()
    );
    println!("  {}", "─".repeat(75).bright_black());

    for record in &records {
        println!(
            "  {:<9} {:<20} {}",
            record.hash.cyan(),
            record
                .created_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black(),
            record.target
        );
    }

    println!();
    println!(
        "  Shown: {}",
        records.len().to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

/// Publishes a first-attempt verification request for a record.
///
/// A resolved record is re-checked too; the new verdict replaces the old one.
async fn reverify(
    pool: Arc<PgPool>,
    config: &Config,
    hash: &str,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🔁 Re-verify Short URL".bright_blue().bold());
    println!();

    let short_urls = Arc::new(PgShortUrlRepository::new(pool.clone()));
    let record = short_urls
        .find_by_hash(hash)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("Short URL not found")?;

    print_record(&record);
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Queue a new verification?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    // Same wiring as the server; nothing is sent on the click channel.
    let (click_tx, _click_rx) = mpsc::channel(1);
    let state = AppState::new(
        short_urls,
        Arc::new(PgClickRepository::new(pool)),
        Arc::new(connect_broker(config).await?),
        Arc::new(MemoryCache::new(config.cache_ttl_seconds)),
        click_tx,
        ServiceSettings::from(config),
    );

    state
        .creation_service
        .request_verification(hash)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to queue verification: {}", e))?;

    println!("{}", "✅ Verification queued".green().bold());
    println!();

    Ok(())
}

/// Dispatches verification queue commands.
async fn handle_queue_action(action: QueueAction, config: &Config) -> Result<()> {
    let broker = connect_broker(config).await?;
    let topic = config.verification_topic.as_str();

    match action {
        QueueAction::DeadLetters => {
            println!("{}", "☠️  Dead Letters".bright_blue().bold());
            println!();

            let payloads = broker
                .dead_letters(topic)
                .await
                .context("Failed to read dead letters")?;

            if payloads.is_empty() {
                println!("{}", "  Dead letter list is empty".green());
                return Ok(());
            }

            for payload in &payloads {
                match VerificationRequest::decode(payload) {
                    Ok(request) => println!(
                        "  {:<9} attempt {:<3} {}",
                        request.hash.cyan(),
                        request.attempt,
                        request.target
                    ),
                    Err(_) => println!("  {} {}", "UNDECODABLE".red(), payload.bright_black()),
                }
            }

            println!();
            println!(
                "  Total: {}",
                payloads.len().to_string().bright_white().bold()
            );
            println!();
        }
        QueueAction::Replay { yes } => replay_dead_letters(&broker, topic, yes).await?,
    }

    Ok(())
}

/// Requeues every decodable dead letter with its attempt counter reset.
///
/// Undecodable payloads are reported and discarded.
async fn replay_dead_letters(broker: &RedisBroker, topic: &str, skip_confirm: bool) -> Result<()> {
    println!("{}", "♻️  Replay Dead Letters".bright_blue().bold());
    println!();

    let pending = broker
        .dead_letters(topic)
        .await
        .context("Failed to read dead letters")?;

    if pending.is_empty() {
        println!("{}", "  Dead letter list is empty".green());
        return Ok(());
    }

    println!(
        "  {} message(s) in {}",
        pending.len().to_string().bright_white().bold(),
        format!("{topic}:dead").cyan()
    );
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Replay all dead letters?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let payloads = broker
        .take_dead_letters(topic)
        .await
        .context("Failed to take dead letters")?;

    let mut replayed = 0usize;
    let mut discarded = 0usize;
    for payload in payloads {
        match VerificationRequest::decode(&payload) {
            Ok(request) => {
                let fresh = VerificationRequest::new(request.target, request.hash);
                broker
                    .publish(topic, &fresh.encode())
                    .await
                    .context("Failed to republish verification request")?;
                replayed += 1;
            }
            Err(e) => {
                println!("  {} {} ({})", "DISCARDED".red(), payload.bright_black(), e);
                discarded += 1;
            }
        }
    }

    println!();
    println!(
        "{} {} replayed, {} discarded",
        "✅".green(),
        replayed.to_string().bright_green().bold(),
        discarded.to_string().bright_red()
    );
    println!();

    Ok(())
}

/// Displays system statistics.
///
/// Shows:
/// - Records per safety state
/// - Total number of recorded clicks
async fn handle_stats(pool: Arc<PgPool>) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let short_urls = PgShortUrlRepository::new(pool.clone());
    let clicks = PgClickRepository::new(pool);

    for safety in [Safety::Unknown, Safety::Safe, Safety::Unsafe] {
        let count = short_urls
            .count_by_safety(safety)
            .await
            .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

        println!(
            "  {:<14} {}",
            format!("{}:", safety),
            count.to_string().bright_green().bold()
        );
    }

    let clicks_count = clicks
        .count()
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

    println!(
        "  {:<14} {}",
        "clicks:",
        clicks_count.to_string().bright_green().bold()
    );
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!();
        }
    }

    Ok(())
}
