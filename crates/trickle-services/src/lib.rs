//! trickle-services: shared server state and the peer transfer endpoint.

pub mod directory;
pub mod registry;
pub mod transfer;

pub use directory::{DirectoryError, PublicationDirectory};
pub use registry::{PeerRegistry, PeerSession, RegistryError};
pub use transfer::{fetch_file, TransferEndpoint};
