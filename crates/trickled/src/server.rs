//! Control server: UDP receive loop plus the liveness reaper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use trickle_core::config::ServerConfig;
use trickle_core::wire::MAX_DATAGRAM;
use trickle_core::CredentialStore;

use crate::dispatch::{Dispatcher, ServerState};
use crate::journal::TransactionLog;
use crate::reaper;

/// Liveness timing for a running server.
#[derive(Debug, Clone, Copy)]
pub struct ServerSettings {
    pub liveness_timeout: Duration,
    pub reap_interval: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ServerSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            liveness_timeout: config.liveness_timeout(),
            reap_interval: config.reap_interval(),
        }
    }
}

/// A running control server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    state: ServerState,
    shutdown: broadcast::Sender<()>,
    receive_task: JoinHandle<Result<()>>,
    reaper_task: JoinHandle<()>,
}

/// Bind the control socket and start serving.
pub async fn start_server(
    bind_addr: SocketAddr,
    settings: ServerSettings,
    credentials: CredentialStore,
    journal: Arc<dyn TransactionLog>,
) -> Result<ServerHandle> {
    let socket = Arc::new(
        UdpSocket::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind control socket on {bind_addr}"))?,
    );
    let local_addr = socket.local_addr()?;

    let state = ServerState::new(credentials);
    let dispatcher = Arc::new(Dispatcher::new(state.clone(), journal));
    let (shutdown, _) = broadcast::channel::<()>(1);

    let reaper_task = tokio::spawn(reaper::reap_loop(
        state.registry.clone(),
        settings.reap_interval,
        settings.liveness_timeout,
        shutdown.subscribe(),
    ));
    let receive_task = tokio::spawn(receive_loop(socket, dispatcher, shutdown.subscribe()));

    tracing::info!(addr = %local_addr, "control server listening");

    Ok(ServerHandle {
        local_addr,
        state,
        shutdown,
        receive_task,
        reaper_task,
    })
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Shared tables, for inspection.
    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Stop both tasks and wait for them.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.reaper_task.await.context("reaper task panicked")?;
        self.receive_task.await.context("receive task panicked")?
    }

    /// Wait for ctrl-c, or for either task to exit on its own.
    pub async fn run_until_ctrl_c(self) -> Result<()> {
        let ServerHandle {
            shutdown,
            mut receive_task,
            mut reaper_task,
            ..
        } = self;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                let _ = shutdown.send(());
                reaper_task.await.ok();
                receive_task.await.context("receive task panicked")?
            }
            r = &mut receive_task => {
                tracing::error!("receive loop exited: {:?}", r);
                r.context("receive task panicked")?
            }
            r = &mut reaper_task => {
                tracing::error!("reaper exited: {:?}", r);
                Ok(())
            }
        }
    }
}

/// Receive datagrams and hand each to its own task.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("control server shutting down");
                return Ok(());
            }

            result = socket.recv_from(&mut buf) => {
                let (len, from) = match result {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error = %e, "recv_from failed");
                        continue;
                    }
                };

                let datagram = buf[..len].to_vec();
                let socket = socket.clone();
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.serve_datagram(&socket, &datagram, from).await;
                });
            }
        }
    }
}
