//! Periodic removal of expired tokens.
//!
//! Reads already ignore dead tokens; this keeps the tables from growing.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::service::AuthService;

/// Run `AuthService::purge_expired` every `every` until `cancel` fires.
pub fn spawn_purge_task(
    service: Arc<AuthService>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = every.as_secs(), "token purge task started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match service.purge_expired().await {
                    Ok(stats) => debug!(
                        refresh_tokens = stats.refresh_tokens,
                        reset_tokens = stats.reset_tokens,
                        "purged expired tokens"
                    ),
                    Err(e) => warn!(error = %e, "token purge failed"),
                },
            }
        }
        info!("token purge task stopped");
    })
}
