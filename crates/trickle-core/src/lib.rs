//! trickle-core: wire protocol, credentials, and configuration.
//! All other BitTrickle crates depend on this one.

pub mod config;
pub mod credentials;
pub mod wire;

pub use credentials::{CredentialError, CredentialStore};
pub use wire::{Command, Reply, Request, WireError};
