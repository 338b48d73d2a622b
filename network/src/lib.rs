//! Networking contract for chain synchronization.
//!
//! Defines what the synchronization engine asks of a remote peer
//! ([`SyncConnector`]) and a channel-based connector that hands those requests
//! to an async transport task.

pub mod connector;
pub mod error;
pub mod peer;
pub mod sync;

pub use connector::{ChainRequest, SyncConnector, BLOCKS_LIMIT, TRANSACTIONS_LIMIT};
pub use error::NetworkError;
pub use peer::Peer;
pub use sync::{ChannelSyncConnector, SyncEnvelope, SyncHandle, SyncRequest, SyncResponse};
