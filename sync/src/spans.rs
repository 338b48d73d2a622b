//! [`tracing::Span`] constructors for synchronization operations.
//!
//! Consistent span names and fields make it easy to filter and correlate the
//! log lines of one attempt.

use nis_network::Peer;
use nis_types::{BlockHash, BlockHeight};
use tracing::{info_span, Span};

/// Span covering one `update_chain` attempt against a peer.
pub fn sync_span(peer: &Peer) -> Span {
    info_span!("sync", peer = %peer)
}

/// Span covering one announced block through `update_block`.
pub fn block_update_span(hash: &BlockHash, height: BlockHeight) -> Span {
    info_span!("block_update", hash = %hash, height = %height)
}

/// Span covering a rollback to `common`.
pub fn rollback_span(common: BlockHeight, depth: u64) -> Span {
    info_span!("rollback", common = %common, depth)
}
