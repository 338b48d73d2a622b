use nis_types::{Address, Amount, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance in {account}: needed {needed}, available {available}")]
    InsufficientBalance {
        account: Address,
        needed: Amount,
        available: Amount,
    },

    #[error("balance overflow in {0}")]
    BalanceOverflow(Address),

    #[error("transaction {0} already executed")]
    DuplicateTransaction(TxHash),

    #[error("transaction {0} not found in hash cache")]
    UnknownTransaction(TxHash),

    #[error("account {0} has no harvested blocks to undo")]
    HarvestUnderflow(Address),

    #[error("storage error: {0}")]
    Storage(#[from] nis_store::StoreError),
}
