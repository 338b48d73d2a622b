//! Applies and reverts the effects of blocks on a state snapshot.

use nis_crypto::{derive_address, hash_transaction};
use nis_types::{Block, NetworkId};
use tracing::trace;

use crate::error::LedgerError;
use crate::state::StateSnapshot;

/// Executes blocks forwards and backwards.
///
/// For every transfer the signer pays `amount + fee`, the recipient receives
/// `amount` and the harvester receives `fee`. `undo` is the exact inverse of
/// `execute`: balances, harvest counts and the transaction hash cache return
/// to their previous values.
#[derive(Clone, Copy, Debug)]
pub struct BlockExecutor {
    network: NetworkId,
}

impl BlockExecutor {
    pub fn new(network: NetworkId) -> Self {
        Self { network }
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn execute(&self, snapshot: &mut StateSnapshot, block: &Block) -> Result<(), LedgerError> {
        let harvester = derive_address(self.network, &block.signer);

        for tx in &block.transactions {
            let hash = hash_transaction(tx);
            let signer = derive_address(self.network, &tx.signer);
            let debit = tx
                .total_debit()
                .ok_or_else(|| LedgerError::BalanceOverflow(signer.clone()))?;

            snapshot.hashes_mut().put(hash, block.height)?;
            let accounts = snapshot.accounts_mut();
            accounts.debit(&signer, debit)?;
            accounts.credit(&tx.recipient, tx.amount)?;
            accounts.credit(&harvester, tx.fee)?;
        }

        snapshot.accounts_mut().increment_harvested(&harvester)?;
        trace!(height = %block.height, txs = block.transactions.len(), "executed block");
        Ok(())
    }

    pub fn undo(&self, snapshot: &mut StateSnapshot, block: &Block) -> Result<(), LedgerError> {
        let harvester = derive_address(self.network, &block.signer);
        snapshot.accounts_mut().decrement_harvested(&harvester)?;

        for tx in block.transactions.iter().rev() {
            let hash = hash_transaction(tx);
            let signer = derive_address(self.network, &tx.signer);
            let debit = tx
                .total_debit()
                .ok_or_else(|| LedgerError::BalanceOverflow(signer.clone()))?;

            let accounts = snapshot.accounts_mut();
            accounts.debit(&harvester, tx.fee)?;
            accounts.debit(&tx.recipient, tx.amount)?;
            accounts.credit(&signer, debit)?;
            snapshot.hashes_mut().remove(&hash)?;
        }

        snapshot.importances_mut().invalidate_from(block.height);
        trace!(height = %block.height, txs = block.transactions.len(), "undid block");
        Ok(())
    }
}
