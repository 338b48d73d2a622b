//! Account address.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A base32-encoded account address (40 characters).
///
/// Derived from a public key by `nis_crypto::derive_address`; this type only
/// carries the encoded form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Length of a well-formed encoded address.
    pub const ENCODED_LEN: usize = 40;

    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the address has the expected length and alphabet. Checksum
    /// validation lives in `nis_crypto::validate_address`.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::ENCODED_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
