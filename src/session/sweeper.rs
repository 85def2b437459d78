use super::lobby::ExpiryLimits;
use super::router::SessionHub;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Spawns the periodic expiry task. It stops once the hub is dropped.
pub fn spawn_sweeper(hub: &Arc<SessionHub>, every: Duration, limits: ExpiryLimits) {
    if limits.room_idle.is_none() && limits.queue_wait.is_none() {
        debug!("Room and queue expiry disabled, not starting sweeper");
        return;
    }

    let hub: Weak<SessionHub> = Arc::downgrade(hub);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(hub) = hub.upgrade() else {
                debug!("Session hub dropped, stopping sweeper");
                return;
            };
            hub.sweep(limits);
        }
    });
}
