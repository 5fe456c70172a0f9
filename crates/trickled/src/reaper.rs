//! Liveness reaper: evicts sessions whose heartbeats have stopped.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;

use trickle_services::PeerRegistry;

/// Scan the registry every `interval`, evicting sessions silent for longer
/// than `timeout`. Eviction is silent: nobody is notified.
///
/// Runs until a shutdown signal arrives.
pub async fn reap_loop(
    registry: PeerRegistry,
    interval: Duration,
    timeout: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    tracing::info!(
        ?interval,
        ?timeout,
        "liveness reaper starting"
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("liveness reaper shutting down");
                return;
            }
            _ = ticker.tick() => {
                reap_once(&registry, timeout).await;
            }
        }
    }
}

/// One eviction pass. Returns the usernames removed.
pub async fn reap_once(registry: &PeerRegistry, timeout: Duration) -> Vec<String> {
    let evicted = registry.evict_stale(Instant::now(), timeout).await;
    for username in &evicted {
        tracing::info!(username = %username, "session expired");
    }
    evicted
}
