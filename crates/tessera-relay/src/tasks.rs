//! Background tasks run alongside the relay loop.

use std::sync::Arc;
use std::time::Duration;

use tessera_outbox::{MessagePublisher, OutboxRelay, OutboxRepository};
use tokio::sync::watch;
use tracing::{info, warn};

/// Deletes expired dispatched rows every `every` until `shutdown` turns
/// `true` or its sender is dropped. The first cleanup runs immediately.
pub async fn run_cleanup<R, P>(
    relay: Arc<OutboxRelay<R, P>>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    R: OutboxRepository,
    P: MessagePublisher,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    while !*shutdown.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = relay.cleanup().await {
                    warn!(error = %e, "outbox cleanup failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    info!("outbox cleanup stopped");
}
