//! Control protocol dispatcher.
//!
//! Parses one datagram, runs exactly one handler against the registry and
//! directory, and sends at most one reply (HBT gets none) to the sender.
//! Registry and directory locks are taken inside the handlers and released
//! before the reply goes out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use trickle_core::{Command, CredentialStore, Reply, Request};
use trickle_services::{PeerRegistry, PublicationDirectory};

use crate::journal::{Transaction, TransactionLog};

/// Everything a handler may touch. Cloning shares the same tables.
#[derive(Clone)]
pub struct ServerState {
    pub credentials: Arc<CredentialStore>,
    pub registry: PeerRegistry,
    pub directory: PublicationDirectory,
}

impl ServerState {
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            credentials: Arc::new(credentials),
            registry: PeerRegistry::new(),
            directory: PublicationDirectory::new(),
        }
    }
}

pub struct Dispatcher {
    state: ServerState,
    journal: Arc<dyn TransactionLog>,
}

impl Dispatcher {
    pub fn new(state: ServerState, journal: Arc<dyn TransactionLog>) -> Self {
        Self { state, journal }
    }

    /// Parse, handle, reply, and journal one datagram.
    pub async fn serve_datagram(&self, socket: &UdpSocket, datagram: &[u8], from: SocketAddr) {
        let (label, username, reply) = match Request::from_datagram(datagram) {
            Ok(request) => {
                let label = request_label(&request);
                let username = request.username().map(str::to_string);
                self.journal
                    .record(&Transaction::received(from, &label, username.as_deref()));
                (label, username, self.handle(&request, from).await)
            }
            Err(e) => {
                tracing::debug!(from = %from, error = %e, "malformed control request");
                let label = e.command().map_or("?", |c| c.as_str()).to_string();
                self.journal
                    .record(&Transaction::received(from, &label, None));
                let reply = match e.command() {
                    Some(Command::Heartbeat) => None,
                    Some(command) => Some(Reply::Malformed(command)),
                    None => Some(Reply::InvalidCommand),
                };
                (label, None, reply)
            }
        };

        let Some(reply) = reply else {
            return;
        };

        match socket.send_to(reply.to_string().as_bytes(), from).await {
            Ok(_) => self.journal.record(&Transaction::sent(
                from,
                &label,
                username.as_deref(),
                reply.is_success(),
            )),
            Err(e) => tracing::warn!(to = %from, error = %e, "failed to send reply"),
        }
    }

    /// Run the handler for one request. `None` means no reply is sent.
    pub async fn handle(&self, request: &Request, from: SocketAddr) -> Option<Reply> {
        let state = &self.state;
        let reply = match request {
            Request::Auth {
                username,
                password,
                transfer_port,
            } => self.authenticate(username, password, *transfer_port, from).await,

            Request::Heartbeat { .. } => {
                if state.registry.touch(from).await.is_none() {
                    tracing::trace!(from = %from, "heartbeat from unregistered address");
                }
                return None;
            }

            Request::ListActive { username } => {
                Reply::ActivePeers(state.registry.list_active(username).await)
            }

            Request::ListPublished { username } => {
                Reply::PublishedFiles(state.directory.list_published(username).await)
            }

            Request::Publish { username, filename } => {
                if state.directory.publish(username, filename).await {
                    tracing::info!(username = %username, filename = %filename, "file published");
                }
                Reply::Published(filename.clone())
            }

            Request::Search {
                username,
                substring,
            } => Reply::SearchResults(state.directory.search(substring, username).await),

            Request::Unpublish { username, filename } => {
                match state.directory.unpublish(username, filename).await {
                    Ok(()) => Reply::Unpublished(filename.clone()),
                    Err(e) => {
                        tracing::debug!(error = %e, "unpublish failed");
                        Reply::UnpublishFailed
                    }
                }
            }

            Request::Get { username, filename } => self.resolve_owner(username, filename).await,

            Request::Exit { username } => {
                if state.registry.remove_if_addr(username, from).await {
                    tracing::info!(username = %username, "session closed by peer");
                }
                Reply::Goodbye
            }

            Request::Unrecognized { command, .. } => {
                tracing::debug!(from = %from, command = %command, "unrecognized command");
                Reply::InvalidCommand
            }
        };
        Some(reply)
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
        transfer_port: u16,
        from: SocketAddr,
    ) -> Reply {
        if !self.state.credentials.verify(username, password) {
            tracing::info!(username, from = %from, "authentication failed");
            return Reply::AuthenticationFailed;
        }
        match self.state.registry.register(username, from, transfer_port).await {
            Ok(()) => {
                tracing::info!(username, from = %from, transfer_port, "peer authenticated");
                Reply::Ok
            }
            Err(e) => {
                tracing::info!(error = %e, "duplicate session refused");
                Reply::UserAlreadyActive
            }
        }
    }

    /// Another user publishing `filename`, then that user's live transfer
    /// address. Either lookup failing is reported the same way.
    async fn resolve_owner(&self, requester: &str, filename: &str) -> Reply {
        let Some(owner) = self.state.directory.find_owner(filename, requester).await else {
            return Reply::FileNotFound;
        };
        match self.state.registry.lookup_for_transfer(&owner).await {
            Some(addr) => Reply::PeerAddress(addr),
            None => {
                tracing::debug!(owner = %owner, filename, "owner of file is not active");
                Reply::FileNotFound
            }
        }
    }
}

fn request_label(request: &Request) -> String {
    match request {
        Request::Unrecognized { command, .. } => command.clone(),
        other => other
            .command()
            .map(|c| c.as_str().to_string())
            .unwrap_or_default(),
    }
}
