//! trickled: the BitTrickle coordination server.
//!
//! Peers authenticate over UDP, heartbeat to stay listed, publish and search
//! filenames, and ask where to fetch a file from. File bytes never pass
//! through the server.

pub mod dispatch;
pub mod journal;
pub mod reaper;
pub mod server;

pub use dispatch::{Dispatcher, ServerState};
pub use journal::{MemoryJournal, TracingJournal, Transaction, TransactionLog};
pub use server::{start_server, ServerHandle, ServerSettings};
