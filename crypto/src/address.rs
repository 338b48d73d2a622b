//! Account address derivation from public keys.
//!
//! Decoded layout (25 bytes): `version || blake2b_160(public_key) || checksum`
//! where `checksum` is the first 4 bytes of `blake2b_256(version || hash160)`.
//! The 25 bytes are encoded with the RFC 4648 base32 alphabet, giving exactly
//! 40 characters and no padding.

use nis_types::{Address, NetworkId, PublicKey};

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Reverse lookup table: ASCII byte to 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[BASE32_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

const DECODED_LEN: usize = 25;
const CHECKSUM_LEN: usize = 4;

fn encode_base32(bytes: &[u8]) -> String {
    let mut result = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }
    result
}

fn decode_base32(s: &str) -> Option<[u8; DECODED_LEN]> {
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = [0u8; DECODED_LEN];
    let mut pos = 0;

    for c in s.bytes() {
        let val = *BASE32_DECODE.get(c as usize)?;
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            if pos == DECODED_LEN {
                return None;
            }
            result[pos] = (buffer >> bits_in_buffer) as u8;
            pos += 1;
        }
    }

    (pos == DECODED_LEN).then_some(result)
}

fn checksum(versioned_hash: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = crate::blake2b_256(versioned_hash);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

/// Derive the address of `public_key` on `network`.
pub fn derive_address(network: NetworkId, public_key: &PublicKey) -> Address {
    let mut decoded = [0u8; DECODED_LEN];
    decoded[0] = network.version();
    decoded[1..21].copy_from_slice(&crate::blake2b_160(public_key.as_bytes()));
    let sum = checksum(&decoded[..21]);
    decoded[21..].copy_from_slice(&sum);
    Address::new(encode_base32(&decoded))
}

/// Whether `address` is well formed, carries `network`'s version byte and
/// has a valid checksum.
pub fn validate_address(network: NetworkId, address: &Address) -> bool {
    if address.as_str().len() != Address::ENCODED_LEN {
        return false;
    }
    let Some(decoded) = decode_base32(address.as_str()) else {
        return false;
    };
    decoded[0] == network.version() && decoded[21..] == checksum(&decoded[..21])
}
