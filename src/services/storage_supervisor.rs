use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{stats_store::StatsStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a statistics store installed while the backend is reachable.
///
/// Connects with exponential backoff, then polls health. A failed health check removes the
/// store (degraded mode) until a reconnect succeeds; once reconnects are exhausted the whole
/// connection is rebuilt from scratch.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn StatsStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "statistics store connection attempt failed");
                sleep(delay).await;
                delay = next_delay(delay);
                continue;
            }
        };

        state.install_stats_store(store.clone()).await;
        info!("statistics store connected; leaving degraded mode");
        delay = INITIAL_DELAY;

        supervise(&state, &store).await;

        state.clear_stats_store().await;
        warn!("statistics store lost; reconnecting from scratch");
        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll health until the store is beyond repair.
async fn supervise(state: &SharedState, store: &Arc<dyn StatsStore>) {
    loop {
        if store.health_check().await.is_ok() {
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        let mut reconnect_delay = INITIAL_DELAY;
        let mut recovered = false;
        for attempt in 0..MAX_RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    recovered = true;
                    break;
                }
                Err(err) => {
                    if attempt == 0 {
                        warn!(attempt, error = %err, "statistics store reconnect failed; entering degraded mode");
                        state.clear_stats_store().await;
                    } else {
                        warn!(attempt, error = %err, "statistics store reconnect attempt failed");
                    }
                    sleep(reconnect_delay).await;
                    reconnect_delay = next_delay(reconnect_delay);
                }
            }
        }

        if !recovered {
            warn!("exhausted statistics store reconnect attempts");
            return;
        }

        if state.is_degraded() {
            state.install_stats_store(store.clone()).await;
            info!("statistics store healthy again; leaving degraded mode");
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}
