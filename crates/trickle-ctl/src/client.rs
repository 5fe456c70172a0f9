//! Control channel client: one outstanding request at a time.
//!
//! By default a request waits forever for its reply, since the transport is
//! plain UDP with no acknowledgements. With a timeout configured, each attempt
//! waits at most that long and the request is resent up to `retries` times.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::Instant;

use trickle_core::wire::MAX_DATAGRAM;
use trickle_core::Request;

#[derive(Clone)]
pub struct ControlClient {
    socket: Arc<UdpSocket>,
    /// Serialises request/reply round trips. Holds the number of replies
    /// still owed to earlier requests whose attempts timed out.
    stale_replies: Arc<Mutex<u32>>,
    timeout: Option<Duration>,
    retries: u32,
}

impl ControlClient {
    /// Bind an ephemeral local port and connect it to `server`.
    pub async fn connect(server: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if server.is_ipv4() {
            "0.0.0.0:0".parse()?
        } else {
            "[::]:0".parse()?
        };
        let socket = UdpSocket::bind(local)
            .await
            .context("failed to bind control socket")?;
        socket
            .connect(server)
            .await
            .with_context(|| format!("failed to connect control socket to {server}"))?;
        Ok(Self {
            socket: Arc::new(socket),
            stale_replies: Arc::new(Mutex::new(0)),
            timeout: None,
            retries: 0,
        })
    }

    /// Per-attempt timeout and retry budget. `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>, retries: u32) -> Self {
        self.timeout = timeout;
        self.retries = retries;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("control socket has no local address")
    }

    /// Fire-and-forget send. Used for heartbeats.
    pub async fn send(&self, request: &Request) -> Result<()> {
        self.socket
            .send(request.to_string().as_bytes())
            .await
            .context("failed to send control datagram")?;
        Ok(())
    }

    /// Send `request` and wait for the reply text.
    ///
    /// Replies carry no request id. A reply that arrives while earlier
    /// requests still owe replies is taken to be one of those and dropped.
    pub async fn request(&self, request: &Request) -> Result<String> {
        let mut stale = self.stale_replies.lock().await;
        let payload = request.to_string();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        while *stale > 0 && self.socket.try_recv(&mut buf).is_ok() {
            *stale -= 1;
        }

        let attempts = match self.timeout {
            Some(_) => self.retries + 1,
            None => 1,
        };

        for attempt in 1..=attempts {
            self.socket
                .send(payload.as_bytes())
                .await
                .context("failed to send control request")?;
            let deadline = self.timeout.map(|limit| Instant::now() + limit);

            loop {
                let received = match deadline {
                    None => self.socket.recv(&mut buf).await,
                    Some(deadline) => {
                        match tokio::time::timeout_at(deadline, self.socket.recv(&mut buf)).await {
                            Ok(r) => r,
                            Err(_) => break,
                        }
                    }
                };
                let len = received.context("failed to receive control reply")?;
                if *stale > 0 {
                    *stale -= 1;
                    tracing::debug!(remaining = *stale, "dropping late reply to an earlier request");
                    continue;
                }
                // Earlier attempts of this request may still be answered.
                *stale += attempt - 1;
                return Ok(String::from_utf8_lossy(&buf[..len]).into_owned());
            }
            tracing::debug!(attempt, attempts, "control request timed out");
        }

        *stale += attempts;
        bail!("no reply from server after {attempts} attempt(s)")
    }
}
