//! Remote peer identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote node the synchronization engine talks to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Stable identity, e.g. the node's public key in hex.
    pub id: String,
    /// Transport endpoint, e.g. `host:port`.
    pub endpoint: String,
}

impl Peer {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.endpoint)
    }
}
