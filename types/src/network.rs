//! Network identifier.

use serde::{Deserialize, Serialize};

/// Identifies which network a node participates in. The network's version
/// byte is mixed into every address so addresses never collide across networks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Main,
    Test,
    Mijin,
}

impl NetworkId {
    /// Version byte prepended to addresses on this network.
    pub fn version(&self) -> u8 {
        match self {
            Self::Main => 0x68,
            Self::Test => 0x98,
            Self::Mijin => 0x60,
        }
    }

    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
            Self::Mijin => "mijin",
        }
    }
}

impl Default for NetworkId {
    fn default() -> Self {
        Self::Test
    }
}
