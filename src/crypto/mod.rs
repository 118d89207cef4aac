//! Hashing and signing primitives.
//!
//! Every digest is computed with a fresh `Sha256` instance, so the helpers here are safe to call
//! concurrently from the sync worker and from whichever task is signing an outgoing transaction.

/// Nxt KCDSA key derivation, signing and verification on Curve25519
pub mod signer;

use sha2::{Digest, Sha256};

pub use signer::{SigningError, public_key, sign, verify};

/// SHA-256 of a single buffer.
pub fn single_digest(data: &[u8]) -> [u8; 32] {
	Sha256::digest(data).into()
}

/// SHA-256 of two buffers hashed back to back.
pub fn digest_pair(first: &[u8], second: &[u8]) -> [u8; 32] {
	let mut hasher = Sha256::new();
	hasher.update(first);
	hasher.update(second);
	hasher.finalize().into()
}

/// Derive the 64-bit identifier from a 32-byte hash (first 8 bytes, little-endian).
pub fn full_hash_to_id(full_hash: &[u8; 32]) -> u64 {
	let mut id = [0u8; 8];
	id.copy_from_slice(&full_hash[..8]);
	u64::from_le_bytes(id)
}

/// Account identifier owned by a public key.
pub fn account_id(public_key: &[u8; 32]) -> u64 {
	full_hash_to_id(&single_digest(public_key))
}
