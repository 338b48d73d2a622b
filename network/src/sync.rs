//! Channel bridge between the blocking synchronization engine and an async
//! transport task.
//!
//! [`ChannelSyncConnector`] implements [`SyncConnector`] by sending each
//! request, together with a oneshot reply channel, to the transport task that
//! owns the companion [`SyncHandle`]. The engine runs on tokio's blocking
//! pool, so the connector may block on the reply.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use nis_types::{Block, BlockHeight, ChainScore, HashChain, Transaction, TxHash};

use crate::connector::{ChainRequest, SyncConnector};
use crate::{NetworkError, Peer};

/// Channel buffer size for sync requests.
const CHANNEL_BUFFER: usize = 64;

/// Default time to wait for a peer's reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A request addressed to a peer.
#[derive(Debug, Clone)]
pub enum SyncRequest {
    LastBlock,
    HashesFrom(BlockHeight),
    BlockAt(BlockHeight),
    ChainAfter(ChainRequest),
    ChainScore,
    UnconfirmedTransactions(Vec<TxHash>),
}

impl SyncRequest {
    fn name(&self) -> &'static str {
        match self {
            Self::LastBlock => "last_block",
            Self::HashesFrom(_) => "hashes_from",
            Self::BlockAt(_) => "block_at",
            Self::ChainAfter(_) => "chain_after",
            Self::ChainScore => "chain_score",
            Self::UnconfirmedTransactions(_) => "unconfirmed_transactions",
        }
    }
}

/// A peer's reply.
#[derive(Debug, Clone)]
pub enum SyncResponse {
    Block(Option<Block>),
    Hashes(HashChain),
    Blocks(Vec<Block>),
    Score(ChainScore),
    Transactions(Vec<Transaction>),
    /// An error reported by the remote peer or the transport layer.
    Error(String),
}

/// A request in flight, carrying the channel its reply goes back on.
#[derive(Debug)]
pub struct SyncEnvelope {
    pub peer: Peer,
    pub request: SyncRequest,
    pub reply: oneshot::Sender<SyncResponse>,
}

/// Handle given to the transport task. It reads envelopes from
/// `request_rx`, performs the network I/O and answers on each envelope's
/// reply channel.
pub struct SyncHandle {
    pub request_rx: mpsc::Receiver<SyncEnvelope>,
}

impl SyncHandle {
    /// Answer every request from `connector` until all senders are dropped.
    pub async fn serve<C: SyncConnector + ?Sized>(mut self, connector: Arc<C>) {
        while let Some(envelope) = self.request_rx.recv().await {
            let response = dispatch(connector.as_ref(), &envelope.peer, envelope.request);
            if envelope.reply.send(response).is_err() {
                debug!(peer = %envelope.peer, "requester went away before reply");
            }
        }
    }
}

/// Run `request` against `connector`, folding errors into
/// [`SyncResponse::Error`].
pub fn dispatch<C: SyncConnector + ?Sized>(
    connector: &C,
    peer: &Peer,
    request: SyncRequest,
) -> SyncResponse {
    let result = match request {
        SyncRequest::LastBlock => connector.last_block(peer).map(SyncResponse::Block),
        SyncRequest::HashesFrom(height) => {
            connector.hashes_from(peer, height).map(SyncResponse::Hashes)
        }
        SyncRequest::BlockAt(height) => connector.block_at(peer, height).map(SyncResponse::Block),
        SyncRequest::ChainAfter(request) => {
            connector.chain_after(peer, &request).map(SyncResponse::Blocks)
        }
        SyncRequest::ChainScore => connector.chain_score(peer).map(SyncResponse::Score),
        SyncRequest::UnconfirmedTransactions(known) => connector
            .unconfirmed_transactions(peer, &known)
            .map(SyncResponse::Transactions),
    };
    result.unwrap_or_else(|e| SyncResponse::Error(e.to_string()))
}

/// [`SyncConnector`] that forwards every call to an async transport task.
///
/// Must not be called from inside an async task: each call blocks the current
/// thread on the runtime until the reply arrives or the timeout elapses.
#[derive(Clone)]
pub struct ChannelSyncConnector {
    request_tx: mpsc::Sender<SyncEnvelope>,
    runtime: Handle,
    timeout: Duration,
}

impl ChannelSyncConnector {
    /// Create a connector bound to `runtime` and its companion [`SyncHandle`].
    pub fn new(runtime: Handle) -> (Self, SyncHandle) {
        let (request_tx, request_rx) = mpsc::channel(CHANNEL_BUFFER);
        let connector = Self {
            request_tx,
            runtime,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        };
        (connector, SyncHandle { request_rx })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn call(&self, peer: &Peer, request: SyncRequest) -> Result<SyncResponse, NetworkError> {
        let name = request.name();
        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = SyncEnvelope {
            peer: peer.clone(),
            request,
            reply: reply_tx,
        };

        let response = self.runtime.block_on(async {
            self.request_tx
                .send(envelope)
                .await
                .map_err(|_| NetworkError::ChannelClosed)?;
            match tokio::time::timeout(self.timeout, reply_rx).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(_)) => Err(NetworkError::ChannelClosed),
                Err(_) => Err(NetworkError::Timeout {
                    peer: peer.to_string(),
                    millis: self.timeout.as_millis() as u64,
                }),
            }
        })?;

        match response {
            SyncResponse::Error(e) => {
                warn!(%peer, request = name, error = %e, "peer request failed");
                Err(NetworkError::SyncFailed(e))
            }
            other => Ok(other),
        }
    }
}

impl SyncConnector for ChannelSyncConnector {
    fn last_block(&self, peer: &Peer) -> Result<Option<Block>, NetworkError> {
        match self.call(peer, SyncRequest::LastBlock)? {
            SyncResponse::Block(block) => Ok(block),
            _ => Err(NetworkError::UnexpectedResponse("Block")),
        }
    }

    fn hashes_from(&self, peer: &Peer, height: BlockHeight) -> Result<HashChain, NetworkError> {
        match self.call(peer, SyncRequest::HashesFrom(height))? {
            SyncResponse::Hashes(hashes) => Ok(hashes),
            _ => Err(NetworkError::UnexpectedResponse("Hashes")),
        }
    }

    fn block_at(&self, peer: &Peer, height: BlockHeight) -> Result<Option<Block>, NetworkError> {
        match self.call(peer, SyncRequest::BlockAt(height))? {
            SyncResponse::Block(block) => Ok(block),
            _ => Err(NetworkError::UnexpectedResponse("Block")),
        }
    }

    fn chain_after(&self, peer: &Peer, request: &ChainRequest) -> Result<Vec<Block>, NetworkError> {
        match self.call(peer, SyncRequest::ChainAfter(*request))? {
            SyncResponse::Blocks(blocks) => Ok(blocks),
            _ => Err(NetworkError::UnexpectedResponse("Blocks")),
        }
    }

    fn chain_score(&self, peer: &Peer) -> Result<ChainScore, NetworkError> {
        match self.call(peer, SyncRequest::ChainScore)? {
            SyncResponse::Score(score) => Ok(score),
            _ => Err(NetworkError::UnexpectedResponse("Score")),
        }
    }

    fn unconfirmed_transactions(
        &self,
        peer: &Peer,
        known: &[TxHash],
    ) -> Result<Vec<Transaction>, NetworkError> {
        match self.call(peer, SyncRequest::UnconfirmedTransactions(known.to_vec()))? {
            SyncResponse::Transactions(txs) => Ok(txs),
            _ => Err(NetworkError::UnexpectedResponse("Transactions")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nis_types::BlockHash;

    /// Answers from fixed data; `chain_score` always fails.
    struct FixedConnector;

    impl SyncConnector for FixedConnector {
        fn last_block(&self, _peer: &Peer) -> Result<Option<Block>, NetworkError> {
            Ok(None)
        }

        fn hashes_from(&self, _peer: &Peer, height: BlockHeight) -> Result<HashChain, NetworkError> {
            Ok(HashChain::new(vec![BlockHash::new([height.raw() as u8; 32])]))
        }

        fn block_at(&self, _peer: &Peer, _height: BlockHeight) -> Result<Option<Block>, NetworkError> {
            Ok(None)
        }

        fn chain_after(
            &self,
            _peer: &Peer,
            _request: &ChainRequest,
        ) -> Result<Vec<Block>, NetworkError> {
            Ok(Vec::new())
        }

        fn chain_score(&self, peer: &Peer) -> Result<ChainScore, NetworkError> {
            Err(NetworkError::PeerNotFound(peer.id.clone()))
        }

        fn unconfirmed_transactions(
            &self,
            _peer: &Peer,
            _known: &[TxHash],
        ) -> Result<Vec<Transaction>, NetworkError> {
            Ok(Vec::new())
        }
    }

    fn peer() -> Peer {
        Peer::new("alpha", "10.0.0.1:7890")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn requests_roundtrip_through_transport_task() {
        let (connector, handle) = ChannelSyncConnector::new(Handle::current());
        tokio::spawn(handle.serve(Arc::new(FixedConnector)));

        let result = tokio::task::spawn_blocking(move || {
            let hashes = connector.hashes_from(&peer(), BlockHeight::new(7)).unwrap();
            let last = connector.last_block(&peer()).unwrap();
            (hashes, last)
        })
        .await
        .unwrap();

        assert_eq!(result.0.len(), 1);
        assert_eq!(result.0.first(), Some(&BlockHash::new([7u8; 32])));
        assert!(result.1.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn remote_errors_surface_as_sync_failed() {
        let (connector, handle) = ChannelSyncConnector::new(Handle::current());
        tokio::spawn(handle.serve(Arc::new(FixedConnector)));

        let result = tokio::task::spawn_blocking(move || connector.chain_score(&peer()))
            .await
            .unwrap();
        assert!(matches!(result, Err(NetworkError::SyncFailed(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn silent_transport_times_out() {
        let (connector, handle) = ChannelSyncConnector::new(Handle::current());
        let connector = connector.with_timeout(Duration::from_millis(20));
        // Keep the receiver alive without ever answering.
        let _handle = handle;

        let result = tokio::task::spawn_blocking(move || connector.last_block(&peer()))
            .await
            .unwrap();
        assert!(matches!(result, Err(NetworkError::Timeout { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_transport_reports_channel_closed() {
        let (connector, handle) = ChannelSyncConnector::new(Handle::current());
        drop(handle);

        let result = tokio::task::spawn_blocking(move || connector.block_at(&peer(), BlockHeight::ONE))
            .await
            .unwrap();
        assert!(matches!(result, Err(NetworkError::ChannelClosed)));
    }
}
