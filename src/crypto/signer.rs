//! Deterministic Curve25519 signatures.
//!
//! Keys and signatures follow the Nxt KCDSA construction: the private scalar is the clamped
//! SHA-256 of the secret phrase, the public key is the Montgomery u-coordinate of the matching
//! point, and a signature is the pair `(v, h)` where `h` commits to the message and the nonce
//! point. No external randomness is involved, so the same phrase and message always produce the
//! same signature.

use curve25519_dalek::{
	constants::ED25519_BASEPOINT_POINT, edwards::EdwardsPoint, montgomery::MontgomeryPoint,
	scalar::Scalar,
};
use num_bigint::BigUint;
use thiserror::Error;

use super::{digest_pair, single_digest};

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;

const MONTGOMERY_A: u32 = 486_662;
const BASE_U: u32 = 9;
/// Square of the base point's Montgomery y.
const BASE_Y_SQUARED: u32 = 39_420_360;
/// `1 / (2 * y)` for the base point, little-endian.
const BASE_R2Y: [u8; 32] = [
	0x70, 0x16, 0x00, 0x40, 0x19, 0xf2, 0x69, 0xd3, 0x48, 0x22, 0x45, 0x48, 0x9a, 0x67, 0x4d, 0x88,
	0x19, 0x5d, 0xbf, 0x16, 0x74, 0xda, 0x7d, 0xe5, 0x53, 0x5e, 0x05, 0x37, 0x26, 0x35, 0xc0, 0x17,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
	#[error("Secret phrase is empty")]
	EmptySecretPhrase,

	#[error("Public key is not canonical")]
	NonCanonicalPublicKey,

	#[error("Signature is not canonical")]
	NonCanonicalSignature,
}

struct KeyPair {
	public_key: [u8; PUBLIC_KEY_LENGTH],
	/// Inverse of the private scalar, negated when the public point's Montgomery y is odd.
	signing_scalar: Scalar,
}

fn clamp(mut bytes: [u8; 32]) -> [u8; 32] {
	bytes[0] &= 248;
	bytes[31] &= 127;
	bytes[31] |= 64;
	bytes
}

/// Montgomery u-coordinate and private scalar for a 32-byte seed.
fn keygen(seed: [u8; 32]) -> (MontgomeryPoint, EdwardsPoint, Scalar) {
	let scalar = Scalar::from_bytes_mod_order(clamp(seed));
	let point = EdwardsPoint::mul_base(&scalar);
	(point.to_montgomery(), point, scalar)
}

fn derive_key_pair(secret_phrase: &str) -> Result<KeyPair, SigningError> {
	if secret_phrase.is_empty() {
		return Err(SigningError::EmptySecretPhrase);
	}
	let (public_point, edwards, scalar) = keygen(single_digest(secret_phrase.as_bytes()));
	let inverse = scalar.invert();
	let signing_scalar = if has_positive_y(&edwards) {
		inverse
	} else {
		-inverse
	};

	let public_key = public_point.to_bytes();
	if !is_canonical_public_key(&public_key) {
		return Err(SigningError::NonCanonicalPublicKey);
	}
	Ok(KeyPair {
		public_key,
		signing_scalar,
	})
}

/// Whether the point's Montgomery y, taken against the base point `(9, y)`, is even.
///
/// Only the u-coordinates of `P` and `P + G` are needed: the chord through them gives
/// `-2 * y(P) * y(G)`, and scaling by `1 / (2 * y(G))` leaves `-y(P)`.
fn has_positive_y(point: &EdwardsPoint) -> bool {
	let prime = (BigUint::from(1u32) << 255u32) - 19u32;
	let coordinate = |point: &EdwardsPoint| BigUint::from_bytes_le(point.to_montgomery().as_bytes());
	let u = coordinate(point);
	let u_sum = coordinate(&(point + &ED25519_BASEPOINT_POINT));

	let y_squared = (&u * &u * &u + &u * &u * MONTGOMERY_A + &u) % &prime;
	let gap = (BigUint::from(BASE_U) + &prime - &u) % &prime;
	let chord = (u_sum + BASE_U + &u + MONTGOMERY_A) * &gap * &gap % &prime;
	let cross = (chord + &prime + &prime - y_squared - BASE_Y_SQUARED) % &prime;
	let negated_y = cross * BigUint::from_bytes_le(&BASE_R2Y) % &prime;
	negated_y.bit(0)
}

/// Public key for a secret phrase.
pub fn public_key(secret_phrase: &str) -> Result<[u8; PUBLIC_KEY_LENGTH], SigningError> {
	derive_key_pair(secret_phrase).map(|pair| pair.public_key)
}

/// Sign a message with the key derived from `secret_phrase`.
///
/// # Arguments
/// * `message` - The bytes to sign. For transactions this is the unsigned transaction bytes.
/// * `secret_phrase` - The account secret phrase.
///
/// # Returns
/// The 64-byte signature, or a `SigningError` if the key or signature is not canonical.
pub fn sign(message: &[u8], secret_phrase: &str) -> Result<[u8; SIGNATURE_LENGTH], SigningError> {
	let pair = derive_key_pair(secret_phrase)?;
	let message_hash = single_digest(message);
	let (nonce_point, _, nonce) =
		keygen(digest_pair(&message_hash, &pair.signing_scalar.to_bytes()));
	let h = digest_pair(&message_hash, nonce_point.as_bytes());
	let v = (nonce - Scalar::from_bytes_mod_order(h)) * pair.signing_scalar;
	finish_signature(v.to_bytes(), h)
}

fn finish_signature(v: [u8; 32], h: [u8; 32]) -> Result<[u8; SIGNATURE_LENGTH], SigningError> {
	let mut signature = [0u8; SIGNATURE_LENGTH];
	signature[..32].copy_from_slice(&v);
	signature[32..].copy_from_slice(&h);
	ensure_canonical_signature(&signature)?;
	Ok(signature)
}

/// Check a signature against a message and public key.
pub fn verify(
	signature: &[u8; SIGNATURE_LENGTH],
	message: &[u8],
	public_key: &[u8; PUBLIC_KEY_LENGTH],
) -> bool {
	if !is_canonical_public_key(public_key) {
		return false;
	}
	let (v, h) = split_signature(signature);
	let Some(v) = Option::<Scalar>::from(Scalar::from_canonical_bytes(v)) else {
		return false;
	};
	let Some(mut public_point) = MontgomeryPoint(*public_key).to_edwards(0) else {
		return false;
	};
	if !has_positive_y(&public_point) {
		public_point = -public_point;
	}
	let nonce_point = EdwardsPoint::vartime_double_scalar_mul_basepoint(
		&v,
		&public_point,
		&Scalar::from_bytes_mod_order(h),
	);
	digest_pair(&single_digest(message), nonce_point.to_montgomery().as_bytes()) == h
}

/// A public key is canonical when its field element is below 2^255 - 19.
pub fn is_canonical_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> bool {
	if public_key[31] & 0x80 != 0 {
		return false;
	}
	let at_or_above_prime = public_key[31] == 0x7f
		&& public_key[1..31].iter().all(|byte| *byte == 0xff)
		&& public_key[0] >= 0xed;
	!at_or_above_prime
}

/// A signature is canonical when its `v` half is a reduced scalar.
pub fn ensure_canonical_signature(signature: &[u8; SIGNATURE_LENGTH]) -> Result<(), SigningError> {
	let (v, _) = split_signature(signature);
	if bool::from(Scalar::from_canonical_bytes(v).is_some()) {
		Ok(())
	} else {
		Err(SigningError::NonCanonicalSignature)
	}
}

fn split_signature(signature: &[u8; SIGNATURE_LENGTH]) -> ([u8; 32], [u8; 32]) {
	let mut v = [0u8; 32];
	let mut h = [0u8; 32];
	v.copy_from_slice(&signature[..32]);
	h.copy_from_slice(&signature[32..]);
	(v, h)
}
