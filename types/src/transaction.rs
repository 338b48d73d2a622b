//! Transfer transactions.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::amount::Amount;
use crate::keys::{PublicKey, Signature};
use crate::time::Timestamp;

/// A signed transfer of `amount` from the signer's account to `recipient`.
///
/// The signer pays `amount + fee`; the fee goes to the harvester of the block
/// that includes the transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: Timestamp,
    /// The transaction may not be included in a block timestamped after this.
    pub deadline: Timestamp,
    pub signer: PublicKey,
    pub recipient: Address,
    pub amount: Amount,
    pub fee: Amount,
    pub signature: Signature,
}

impl Transaction {
    /// Canonical bytes covered by the signature and the transaction hash.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let recipient = self.recipient.as_str().as_bytes();
        let mut buf = Vec::with_capacity(8 + 8 + 32 + 4 + recipient.len() + 8 + 8);
        buf.extend_from_slice(&self.timestamp.as_secs().to_le_bytes());
        buf.extend_from_slice(&self.deadline.as_secs().to_le_bytes());
        buf.extend_from_slice(self.signer.as_bytes());
        buf.extend_from_slice(&(recipient.len() as u32).to_le_bytes());
        buf.extend_from_slice(recipient);
        buf.extend_from_slice(&self.amount.raw().to_le_bytes());
        buf.extend_from_slice(&self.fee.raw().to_le_bytes());
        buf
    }

    /// Whether the deadline has passed at `at`.
    pub fn is_expired(&self, at: Timestamp) -> bool {
        at > self.deadline
    }

    /// Total debited from the signer: amount plus fee. `None` on overflow.
    pub fn total_debit(&self) -> Option<Amount> {
        self.amount.checked_add(self.fee)
    }
}
