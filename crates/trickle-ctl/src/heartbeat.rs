//! Heartbeat emitter.

use std::time::Duration;

use trickle_core::Request;

use crate::client::ControlClient;

/// Send `HBT <username>` every `interval`. No reply is expected; a failed
/// send is logged and the next beat goes out on schedule.
///
/// Runs until the task is aborted.
pub async fn heartbeat_loop(client: ControlClient, username: String, interval: Duration) {
    let request = Request::Heartbeat { username };
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = client.send(&request).await {
            tracing::warn!(error = %e, "heartbeat send failed");
        }
    }
}
