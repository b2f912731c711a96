//! HTTP server initialization and runtime setup.
//!
//! Selects the store, broker, cache and reputation backends, spawns the
//! click and verification workers and runs the Axum server until a
//! shutdown signal arrives.

use crate::config::Config;
use crate::domain::click_worker::run_click_worker;
use crate::domain::repositories::{ClickRepository, ShortUrlRepository};
use crate::domain::verification_worker::VerificationWorker;
use crate::infrastructure::cache::{CacheService, MemoryCache, RedisCache};
use crate::infrastructure::messaging::{MemoryBroker, MessageBroker, RedisBroker};
use crate::infrastructure::persistence::{
    MemoryClickRepository, MemoryShortUrlRepository, PgClickRepository, PgShortUrlRepository,
};
use crate::infrastructure::safety::{BlocklistChecker, SafeBrowsingClient, SafetyChecker};
use crate::routes::app_router;
use crate::state::{AppState, ServiceSettings};

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Upper bound on how long shutdown waits for background workers.
const WORKER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Record and click storage selected at startup.
struct Store {
    short_urls: Arc<dyn ShortUrlRepository>,
    clicks: Arc<dyn ClickRepository>,
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool and migrations (or the in-memory store)
/// - Redis broker and QR cache (or their in-memory counterparts)
/// - Reputation checker (Safe Browsing or static blocklist)
/// - Background click worker and verification consumers
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - Redis is configured but unreachable
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let store = connect_store(&config).await?;
    let (broker, cache) = connect_redis_backends(&config).await?;
    let checker = build_checker(&config)?;

    let (click_tx, click_rx) = mpsc::channel(config.click_queue_capacity);
    let click_worker = tokio::spawn(run_click_worker(
        click_rx,
        store.clicks.clone(),
        config.click_worker_concurrency,
    ));

    let recovered = broker
        .recover_in_flight(&config.verification_topic)
        .await
        .context("Failed to recover in-flight verification messages")?;
    if recovered > 0 {
        tracing::warn!(
            recovered,
            topic = %config.verification_topic,
            "Requeued verification messages left in flight"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Arc::new(VerificationWorker::new(
        store.short_urls.clone(),
        checker,
        broker.clone(),
        cache.clone(),
        config.verification_topic.clone(),
        config.verification_policy(),
    ));
    let consumers = worker.spawn(config.verification_consumers, shutdown_rx);
    tracing::info!(
        consumers = consumers.len(),
        topic = %worker.topic(),
        "Verification workers started"
    );

    let state = AppState::new(
        store.short_urls,
        store.clicks,
        broker,
        cache,
        click_tx,
        ServiceSettings::from(&config),
    );

    let app = app_router(state, config.behind_proxy);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("HTTP server stopped, draining workers");
    let _ = shutdown_tx.send(true);

    let drain = async {
        for consumer in consumers {
            let _ = consumer.await;
        }
        // the router owned the last click sender
        let _ = click_worker.await;
    };
    if tokio::time::timeout(WORKER_SHUTDOWN_TIMEOUT, drain)
        .await
        .is_err()
    {
        tracing::warn!("Workers did not stop within {:?}", WORKER_SHUTDOWN_TIMEOUT);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Connects PostgreSQL and applies migrations, or falls back to the
/// in-memory store when no database is configured.
async fn connect_store(config: &Config) -> Result<Store> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("No database configured, records are kept in memory only");
        return Ok(Store {
            short_urls: Arc::new(MemoryShortUrlRepository::new()),
            clicks: Arc::new(MemoryClickRepository::new()),
        });
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to migrate")?;

    let pool = Arc::new(pool);
    Ok(Store {
        short_urls: Arc::new(PgShortUrlRepository::new(pool.clone())),
        clicks: Arc::new(PgClickRepository::new(pool)),
    })
}

/// Connects the Redis broker and QR cache, or uses in-process ones.
///
/// A configured but unreachable Redis is a startup error: silently falling
/// back to an in-memory queue would strand messages other instances publish.
async fn connect_redis_backends(
    config: &Config,
) -> Result<(Arc<dyn MessageBroker>, Arc<dyn CacheService>)> {
    let poll_interval = config.broker_poll_interval();

    let Some(redis_url) = &config.redis_url else {
        tracing::info!("Redis disabled, using in-memory broker and QR cache");
        return Ok((
            Arc::new(MemoryBroker::new(poll_interval)),
            Arc::new(MemoryCache::new(config.cache_ttl_seconds)),
        ));
    };

    let broker = RedisBroker::connect(redis_url, poll_interval)
        .await
        .context("Failed to connect broker to Redis")?;
    let cache = RedisCache::connect(redis_url, config.cache_ttl_seconds)
        .await
        .context("Failed to connect QR cache to Redis")?;

    Ok((Arc::new(broker), Arc::new(cache)))
}

fn build_checker(config: &Config) -> Result<Arc<dyn SafetyChecker>> {
    let timeout = Duration::from_secs(config.safety_check_timeout_secs);

    match &config.safe_browsing_api_key {
        Some(api_key) => {
            let client =
                SafeBrowsingClient::new(config.safe_browsing_endpoint.clone(), api_key, timeout)
                    .context("Failed to build Safe Browsing client")?;
            Ok(Arc::new(client))
        }
        None => {
            tracing::warn!(
                hosts = config.safety_blocklist.len(),
                "No Safe Browsing API key, using the static blocklist"
            );
            Ok(Arc::new(BlocklistChecker::new(
                config.safety_blocklist.iter().cloned(),
            )))
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
