//! Peer registry: the table of currently authenticated peers.
//!
//! One session per username. A session is created by a successful AUTH,
//! refreshed by heartbeats arriving from its control address, and removed by
//! the reaper once it has been silent for longer than the liveness timeout
//! (or at once on XIT).
//!
//! Every operation holds the table lock for its whole duration, so
//! check-and-insert in `register` is a single critical section. The lock is
//! never held across socket I/O.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// A live, authenticated peer.
#[derive(Debug, Clone)]
pub struct PeerSession {
    pub username: String,
    /// Source address of the AUTH datagram. Heartbeats are matched against it.
    pub control_addr: SocketAddr,
    /// TCP port of the peer's transfer endpoint.
    pub transfer_port: u16,
    /// Refreshed by every heartbeat. Drives eviction.
    pub last_heartbeat: Instant,
}

impl PeerSession {
    /// Where other peers connect to download from this one.
    pub fn transfer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.control_addr.ip(), self.transfer_port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("user {0} already has an active session")]
    AlreadyActive(String),
}

/// Shared handle to the session table. Cloning shares the same table.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    sessions: Arc<Mutex<BTreeMap<String, PeerSession>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh session unless `username` already has one.
    pub async fn register(
        &self,
        username: &str,
        control_addr: SocketAddr,
        transfer_port: u16,
    ) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(username) {
            return Err(RegistryError::AlreadyActive(username.to_string()));
        }
        sessions.insert(
            username.to_string(),
            PeerSession {
                username: username.to_string(),
                control_addr,
                transfer_port,
                last_heartbeat: Instant::now(),
            },
        );
        Ok(())
    }

    /// Refresh the session registered from `control_addr`.
    /// Returns the username if one matched; unknown senders are ignored.
    pub async fn touch(&self, control_addr: SocketAddr) -> Option<String> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .values_mut()
            .find(|s| s.control_addr == control_addr)?;
        session.last_heartbeat = Instant::now();
        Some(session.username.clone())
    }

    /// Usernames of all live sessions other than `excluding`.
    pub async fn list_active(&self, excluding: &str) -> Vec<String> {
        self.sessions
            .lock()
            .await
            .keys()
            .filter(|u| u.as_str() != excluding)
            .cloned()
            .collect()
    }

    /// Transfer address of `username`'s session, if it is live.
    pub async fn lookup_for_transfer(&self, username: &str) -> Option<SocketAddr> {
        self.sessions
            .lock()
            .await
            .get(username)
            .map(PeerSession::transfer_addr)
    }

    /// Unconditional removal. Returns whether a session existed.
    pub async fn evict(&self, username: &str) -> bool {
        self.sessions.lock().await.remove(username).is_some()
    }

    /// Remove `username` only if its session was registered from `control_addr`.
    pub async fn remove_if_addr(&self, username: &str, control_addr: SocketAddr) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(username) {
            Some(s) if s.control_addr == control_addr => {
                sessions.remove(username);
                true
            }
            _ => false,
        }
    }

    /// One reaper pass: drop every session whose last heartbeat is more than
    /// `timeout` before `now`. Returns the evicted usernames.
    pub async fn evict_stale(&self, now: Instant, timeout: Duration) -> Vec<String> {
        let mut sessions = self.sessions.lock().await;
        let stale: Vec<String> = sessions
            .values()
            .filter(|s| now.saturating_duration_since(s.last_heartbeat) > timeout)
            .map(|s| s.username.clone())
            .collect();
        for username in &stale {
            sessions.remove(username);
        }
        stale
    }

    pub async fn session(&self, username: &str) -> Option<PeerSession> {
        self.sessions.lock().await.get(username).cloned()
    }

    pub async fn is_active(&self, username: &str) -> bool {
        self.sessions.lock().await.contains_key(username)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
