//! trickle-ctl: the BitTrickle peer.
//!
//! Talks to the coordination server over UDP, keeps its session alive with
//! heartbeats, and serves its own files to other peers over TCP.

pub mod client;
pub mod command;
pub mod heartbeat;
pub mod peer;

pub use client::ControlClient;
pub use command::{UsageError, UserCommand};
pub use peer::{start_client, AuthOutcome, GetOutcome, Peer, PeerSettings};
