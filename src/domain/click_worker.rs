use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info};

use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::ClickRepository;

const MAX_RETRIES: usize = 3;

/// Drains the click channel and persists each event.
///
/// At most `concurrency` inserts run at once; each one is retried a few times
/// with jittered backoff before the click is given up. Returns when every
/// sender has been dropped and in-flight inserts have finished.
pub async fn run_click_worker(
    mut rx: mpsc::Receiver<ClickEvent>,
    repository: Arc<dyn ClickRepository>,
    concurrency: usize,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    info!(concurrency, "Click worker started");

    while let Some(event) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let repository = repository.clone();

        tokio::spawn(async move {
            let _permit = permit;
            let click = event.into_new_click();
            let hash = click.hash.clone();

            let strategy = ExponentialBackoff::from_millis(10)
                .map(jitter)
                .take(MAX_RETRIES);

            match Retry::spawn(strategy, || repository.record(click.clone())).await {
                Ok(()) => debug!(hash = %hash, "Click recorded"),
                Err(e) => {
                    metrics::counter!("shortener_clicks_dropped_total").increment(1);
                    error!(hash = %hash, "Failed to record click: {}", e);
                }
            }
        });
    }

    // wait for in-flight inserts
    let _ = permits.acquire_many(concurrency.max(1) as u32).await;
    info!("Click worker stopped");
}
