//! Transaction journal: one record per received request and per sent reply.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Mutex;

/// Which way a control datagram travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Received,
    Sent,
}

/// A single logged control-channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Source port of the client's control socket.
    pub client_port: u16,
    /// Command token as received, e.g. "AUTH" or an unrecognized word.
    pub command: String,
    pub username: Option<String>,
    pub direction: Direction,
    /// Reply outcome. Always true for `Received`.
    pub ok: bool,
}

impl Transaction {
    pub fn received(from: SocketAddr, command: &str, username: Option<&str>) -> Self {
        Self {
            client_port: from.port(),
            command: command.to_string(),
            username: username.map(str::to_string),
            direction: Direction::Received,
            ok: true,
        }
    }

    pub fn sent(from: SocketAddr, command: &str, username: Option<&str>, ok: bool) -> Self {
        Self {
            direction: Direction::Sent,
            ok,
            ..Self::received(from, command, username)
        }
    }
}

/// "40321: Received LAP from alice" / "40321: Sent ERR to alice"
impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = self.username.as_deref().unwrap_or("-");
        match self.direction {
            Direction::Received => {
                write!(f, "{}: Received {} from {user}", self.client_port, self.command)
            }
            Direction::Sent => {
                let outcome = if self.ok { "OK" } else { "ERR" };
                write!(f, "{}: Sent {outcome} to {user}", self.client_port)
            }
        }
    }
}

/// Sink for control-channel transactions.
pub trait TransactionLog: Send + Sync {
    fn record(&self, tx: &Transaction);
}

/// Default journal: one `tracing` event per transaction.
/// Timestamps come from the installed subscriber.
pub struct TracingJournal;

impl TransactionLog for TracingJournal {
    fn record(&self, tx: &Transaction) {
        tracing::info!(
            port = tx.client_port,
            command = %tx.command,
            username = tx.username.as_deref().unwrap_or("-"),
            ok = tx.ok,
            "{tx}"
        );
    }
}

/// Keeps every transaction in memory, for inspection.
#[derive(Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<Transaction>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Transaction> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl TransactionLog for MemoryJournal {
    fn record(&self, tx: &Transaction) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(tx.clone());
        }
    }
}
