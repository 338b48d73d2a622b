use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("peer {0} not found")]
    PeerNotFound(String),

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("request to {peer} timed out after {millis}ms")]
    Timeout { peer: String, millis: u64 },

    #[error("transport channel closed")]
    ChannelClosed,

    #[error("unexpected response: expected {0}")]
    UnexpectedResponse(&'static str),
}
