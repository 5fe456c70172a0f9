//! BitTrickle integration test harness.
//!
//! Every test runs a real control server and real peers on loopback sockets
//! inside the test process, so no external setup is needed:
//!
//!   cargo test --test integration
//!
//! Each test starts its own server on an OS-assigned port and shuts it down
//! at the end; tests never share registry or directory state.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::UdpSocket;

use trickle_core::CredentialStore;
use trickle_ctl::{start_client, AuthOutcome, Peer, PeerSettings};
use trickled::{start_server, MemoryJournal, ServerHandle, ServerSettings};

mod files;
mod sessions;
mod transfer;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Users known to every test server.
pub const USERS: [(&str, &str); 4] = [
    ("alice", "alice-pw"),
    ("bob", "bob-pw"),
    ("carol", "carol-pw"),
    ("dave", "dave-pw"),
];

/// How long a test waits for a reply before declaring it lost.
pub const REPLY_WAIT: Duration = Duration::from_secs(5);

pub fn password(username: &str) -> &'static str {
    USERS
        .iter()
        .find(|(u, _)| *u == username)
        .map(|(_, p)| *p)
        .unwrap_or("no-such-user")
}

pub fn credentials() -> CredentialStore {
    USERS.into_iter().collect()
}

/// Server with the default 3s timeout / 1s reap interval.
pub async fn spawn_server() -> (ServerHandle, Arc<MemoryJournal>) {
    spawn_server_with(ServerSettings::default()).await
}

pub async fn spawn_server_with(settings: ServerSettings) -> (ServerHandle, Arc<MemoryJournal>) {
    let journal = Arc::new(MemoryJournal::new());
    let server = start_server(
        "127.0.0.1:0".parse().unwrap(),
        settings,
        credentials(),
        journal.clone(),
    )
    .await
    .expect("server should start");
    (server, journal)
}

/// Short timings for liveness tests.
pub fn fast_settings() -> ServerSettings {
    ServerSettings {
        liveness_timeout: Duration::from_millis(300),
        reap_interval: Duration::from_millis(50),
    }
}

/// A bare UDP socket speaking raw protocol text.
pub struct RawClient {
    socket: UdpSocket,
}

impl RawClient {
    pub async fn connect(server: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        socket.connect(server).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr().unwrap()
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        self.socket.send(text.as_bytes()).await?;
        Ok(())
    }

    pub async fn request(&self, text: &str) -> Result<String> {
        self.send(text).await?;
        self.recv().await
    }

    pub async fn recv(&self) -> Result<String> {
        let mut buf = vec![0u8; 65_536];
        let n = tokio::time::timeout(REPLY_WAIT, self.socket.recv(&mut buf))
            .await
            .context("no reply within deadline")??;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    /// True if nothing arrives within `wait`.
    pub async fn silent_for(&self, wait: Duration) -> bool {
        let mut buf = vec![0u8; 1024];
        tokio::time::timeout(wait, self.socket.recv(&mut buf))
            .await
            .is_err()
    }

    /// AUTH as a known user, advertising `transfer_port`.
    pub async fn login(&self, username: &str, transfer_port: u16) -> Result<()> {
        let reply = self
            .request(&format!("AUTH {username} {} {transfer_port}", password(username)))
            .await?;
        if reply != "OK" {
            bail!("login as {username} failed: {reply}");
        }
        Ok(())
    }
}

/// A full peer serving and downloading from `share_dir`.
pub async fn spawn_peer(server: SocketAddr, share_dir: &Path, heartbeat: Duration) -> Peer {
    let settings = PeerSettings {
        heartbeat_interval: heartbeat,
        request_timeout: Some(REPLY_WAIT),
        request_retries: 0,
        share_dir: share_dir.to_path_buf(),
        ..PeerSettings::default()
    };
    start_client(server, settings)
        .await
        .expect("peer should start")
}

/// Start a peer and log it in.
pub async fn logged_in_peer(
    server: SocketAddr,
    share_dir: &Path,
    username: &str,
    heartbeat: Duration,
) -> Peer {
    let mut peer = spawn_peer(server, share_dir, heartbeat).await;
    let outcome = peer
        .authenticate(username, password(username))
        .await
        .expect("auth round trip");
    assert_eq!(outcome, AuthOutcome::Accepted, "{username} should log in");
    peer
}

/// Poll `check` until it holds or `deadline` passes.
pub async fn eventually<F, Fut>(deadline: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    loop {
        if check().await {
            return true;
        }
        if start.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
