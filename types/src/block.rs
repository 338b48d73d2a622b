//! Harvested blocks.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::difficulty::BlockDifficulty;
use crate::hash::BlockHash;
use crate::height::BlockHeight;
use crate::keys::{PublicKey, Signature};
use crate::time::Timestamp;
use crate::transaction::Transaction;

/// A block as transported between peers and persisted by the block store.
///
/// `previous_generation_hash` and `difficulty` are not covered by the
/// signature. A receiving node overwrites both with values it derives from
/// its own view of the parent chain before validating the block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: BlockHeight,
    pub timestamp: Timestamp,
    pub signer: PublicKey,
    pub previous_block_hash: BlockHash,
    #[serde(default)]
    pub previous_generation_hash: BlockHash,
    #[serde(default)]
    pub difficulty: BlockDifficulty,
    pub transactions: Vec<Transaction>,
    pub signature: Signature,
}

impl Block {
    /// Canonical bytes covered by the harvester signature and the block hash.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 8 + 32 + 32 + 4 + self.transactions.len() * 200);
        buf.extend_from_slice(&self.height.raw().to_le_bytes());
        buf.extend_from_slice(&self.timestamp.as_secs().to_le_bytes());
        buf.extend_from_slice(self.signer.as_bytes());
        buf.extend_from_slice(self.previous_block_hash.as_bytes());
        buf.extend_from_slice(&(self.transactions.len() as u32).to_le_bytes());
        for tx in &self.transactions {
            let tx_bytes = tx.signing_bytes();
            buf.extend_from_slice(&(tx_bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(&tx_bytes);
            buf.extend_from_slice(tx.signature.as_bytes());
        }
        buf
    }

    /// Sum of the fees of all contained transactions, saturating.
    pub fn total_fee(&self) -> Amount {
        self.transactions
            .iter()
            .fold(Amount::ZERO, |acc, tx| acc.checked_add(tx.fee).unwrap_or(acc))
    }

    pub fn is_nemesis(&self) -> bool {
        self.height == BlockHeight::ONE
    }
}
