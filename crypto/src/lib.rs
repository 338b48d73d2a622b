//! Cryptographic primitives for the NIS ledger.
//!
//! - **Ed25519** for block and transaction signatures
//! - **Blake2b** for block, transaction and generation hashes
//! - Address derivation: network version byte, Blake2b-160 of the public key
//!   and a checksum, base32 encoded

pub mod address;
pub mod entity;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::{derive_address, validate_address};
pub use entity::{
    generation_hash, hash_block, hash_transaction, sign_block, sign_transaction, verify_block,
    verify_transaction,
};
pub use hash::{blake2b_160, blake2b_256, blake2b_256_multi};
pub use keys::{keypair_from_private, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
