//! A BitTrickle peer: control client, heartbeat, and transfer endpoint.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::task::JoinHandle;

use trickle_core::config::PeerConfig;
use trickle_core::wire::{parse_peer_address, REPLY_FILE_NOT_FOUND, REPLY_OK};
use trickle_core::Request;
use trickle_services::{fetch_file, TransferEndpoint};

use crate::client::ControlClient;
use crate::heartbeat::heartbeat_loop;

/// Runtime settings for a peer.
#[derive(Debug, Clone)]
pub struct PeerSettings {
    pub heartbeat_interval: Duration,
    pub request_timeout: Option<Duration>,
    pub request_retries: u32,
    /// Host the transfer listener binds to and advertises.
    pub transfer_host: IpAddr,
    /// Served files are read from here and downloads land here.
    pub share_dir: PathBuf,
}

impl PeerSettings {
    pub fn from_config(config: &PeerConfig) -> Result<Self> {
        Ok(Self {
            heartbeat_interval: config.heartbeat_interval(),
            request_timeout: config.request_timeout(),
            request_retries: config.request_retries,
            transfer_host: config
                .transfer_bind_addr
                .parse()
                .context("peer.transfer_bind_addr must be an IP address")?,
            share_dir: config.share_dir.clone(),
        })
    }
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(trickle_core::wire::HEARTBEAT_INTERVAL_MS),
            request_timeout: None,
            request_retries: 0,
            transfer_host: IpAddr::from([127, 0, 0, 1]),
            share_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Accepted,
    /// Server's refusal text.
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    NotFound,
    Downloaded {
        path: PathBuf,
        bytes: u64,
        from: SocketAddr,
    },
}

pub struct Peer {
    client: ControlClient,
    settings: PeerSettings,
    transfer_addr: SocketAddr,
    username: Option<String>,
    endpoint_task: JoinHandle<Result<()>>,
    heartbeat_task: Option<JoinHandle<()>>,
}

/// Bind the control socket and the transfer endpoint. The endpoint starts
/// accepting immediately; heartbeats start once `authenticate` succeeds.
pub async fn start_client(server: SocketAddr, settings: PeerSettings) -> Result<Peer> {
    let client = ControlClient::connect(server)
        .await?
        .with_timeout(settings.request_timeout, settings.request_retries);

    let endpoint = TransferEndpoint::bind(settings.transfer_host, settings.share_dir.clone()).await?;
    let transfer_addr = endpoint.local_addr()?;
    let endpoint_task = tokio::spawn(endpoint.run());

    tracing::info!(server = %server, transfer = %transfer_addr, "peer started");

    Ok(Peer {
        client,
        settings,
        transfer_addr,
        username: None,
        endpoint_task,
        heartbeat_task: None,
    })
}

impl Peer {
    pub fn transfer_addr(&self) -> SocketAddr {
        self.transfer_addr
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        self.client.local_addr()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// AUTH with the server. On success the heartbeat task starts.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<AuthOutcome> {
        if self.username.is_some() {
            bail!("already authenticated");
        }
        let reply = self
            .client
            .request(&Request::Auth {
                username: username.to_string(),
                password: password.to_string(),
                transfer_port: self.transfer_addr.port(),
            })
            .await?;
        if reply != REPLY_OK {
            return Ok(AuthOutcome::Rejected(reply));
        }

        self.username = Some(username.to_string());
        self.heartbeat_task = Some(tokio::spawn(heartbeat_loop(
            self.client.clone(),
            username.to_string(),
            self.settings.heartbeat_interval,
        )));
        Ok(AuthOutcome::Accepted)
    }

    fn user(&self) -> Result<String> {
        self.username
            .clone()
            .context("not authenticated")
    }

    pub async fn list_active_peers(&self) -> Result<String> {
        let username = self.user()?;
        self.client.request(&Request::ListActive { username }).await
    }

    pub async fn list_published(&self) -> Result<String> {
        let username = self.user()?;
        self.client.request(&Request::ListPublished { username }).await
    }

    pub async fn publish(&self, filename: &str) -> Result<String> {
        let username = self.user()?;
        let filename = filename.to_string();
        self.client.request(&Request::Publish { username, filename }).await
    }

    pub async fn search(&self, substring: &str) -> Result<String> {
        let username = self.user()?;
        let substring = substring.to_string();
        self.client.request(&Request::Search { username, substring }).await
    }

    pub async fn unpublish(&self, filename: &str) -> Result<String> {
        let username = self.user()?;
        let filename = filename.to_string();
        self.client.request(&Request::Unpublish { username, filename }).await
    }

    /// Resolve who publishes `filename`, then download it into the share dir.
    pub async fn get(&self, filename: &str) -> Result<GetOutcome> {
        let username = self.user()?;
        let reply = self
            .client
            .request(&Request::Get {
                username,
                filename: filename.to_string(),
            })
            .await?;
        if reply == REPLY_FILE_NOT_FOUND {
            return Ok(GetOutcome::NotFound);
        }
        let Some(from) = parse_peer_address(&reply) else {
            bail!("unexpected reply to GET: {reply}");
        };

        let (path, bytes) = fetch_file(from, filename, &self.settings.share_dir).await?;
        Ok(GetOutcome::Downloaded { path, bytes, from })
    }

    /// Tell the server we are leaving and stop background tasks.
    pub async fn exit(mut self) -> Result<String> {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
        let username = self.user()?;
        self.client.request(&Request::Exit { username }).await
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        if let Some(task) = self.heartbeat_task.take() {
            task.abort();
        }
        self.endpoint_task.abort();
    }
}
