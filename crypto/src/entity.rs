//! Hashing and signing of blocks and transactions.

use nis_types::{Block, BlockHash, KeyPair, PublicKey, Transaction, TxHash};

use crate::hash::{blake2b_256, blake2b_256_multi};
use crate::sign::{sign_message, verify_signature};

/// Hash of a transaction's signed content.
pub fn hash_transaction(tx: &Transaction) -> TxHash {
    TxHash::new(blake2b_256(&tx.signing_bytes()))
}

/// Hash of a block: its signed content followed by the harvester signature.
pub fn hash_block(block: &Block) -> BlockHash {
    BlockHash::new(blake2b_256_multi(&[
        block.signing_bytes().as_slice(),
        block.signature.as_bytes().as_slice(),
    ]))
}

/// Generation hash of a block harvested by `signer` on top of a parent whose
/// generation hash is `previous`.
pub fn generation_hash(previous: &BlockHash, signer: &PublicKey) -> BlockHash {
    BlockHash::new(blake2b_256_multi(&[
        previous.as_bytes().as_slice(),
        signer.as_bytes().as_slice(),
    ]))
}

/// Sign `tx` in place with `keys`. The signer field is overwritten.
pub fn sign_transaction(tx: &mut Transaction, keys: &KeyPair) {
    tx.signer = keys.public;
    tx.signature = sign_message(&tx.signing_bytes(), &keys.private);
}

pub fn verify_transaction(tx: &Transaction) -> bool {
    verify_signature(&tx.signing_bytes(), &tx.signature, &tx.signer)
}

/// Sign `block` in place with `keys`. The signer field is overwritten.
pub fn sign_block(block: &mut Block, keys: &KeyPair) {
    block.signer = keys.public;
    block.signature = sign_message(&block.signing_bytes(), &keys.private);
}

/// Whether the harvester signature of `block` is valid. Contained
/// transactions are not checked.
pub fn verify_block(block: &Block) -> bool {
    verify_signature(&block.signing_bytes(), &block.signature, &block.signer)
}
