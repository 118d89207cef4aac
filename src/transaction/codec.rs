//! Binary and JSON transaction codec.
//!
//! Signed transactions use a fixed little-endian header followed by the type-specific
//! attachment at [`BASE_LENGTH`]:
//!
//! ```text
//!   0  chain id            4     45  recipient id        8    133  EC block height  4
//!   4  type                1     53  amount              8    137  EC block id      8
//!   5  subtype             1     61  fee                 8    145  flags            4
//!   6  version             1     69  signature          64    149  attachment
//!   7  timestamp           4
//!  11  deadline            2
//!  13  sender public key  32
//! ```
//!
//! The full hash is `sha256(bytes with the signature zeroed || sha256(signature))` and the
//! transaction id is its first eight bytes read little-endian.

use serde::Deserialize;
use thiserror::Error;

use super::attachment::Attachment;
use super::chain::NodeConstants;
use super::Transaction;
use crate::crypto::{self, signer::SIGNATURE_LENGTH};
use crate::utils::json::{i64_flexible, u32_flexible, u64_flexible};

pub const SIGNATURE_OFFSET: usize = 69;
pub const BASE_LENGTH: usize = 149;
/// Height the node reports for a transaction that is not in a block yet.
const UNCONFIRMED_HEIGHT: u64 = i32::MAX as u64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
	#[error("Transaction buffer too short: {needed} bytes needed at offset {offset}, {available} available")]
	Truncated {
		offset: usize,
		needed: usize,
		available: usize,
	},

	#[error("Transaction has {0} unexpected trailing bytes")]
	TrailingBytes(usize),

	#[error("Chain {0} is not defined")]
	UnknownChain(i64),

	#[error("Attachment version {0} is not supported")]
	UnsupportedAttachmentVersion(u8),

	#[error("Invalid value for '{field}': {reason}")]
	InvalidField { field: &'static str, reason: String },

	#[error("Malformed transaction JSON: {0}")]
	Json(String),

	#[error("Transaction id {reported} does not match full hash id {derived}")]
	IdMismatch { reported: u64, derived: u64 },
}

/// Bounds-checked little-endian reader.
pub(crate) struct ByteReader<'a> {
	bytes: &'a [u8],
	position: usize,
}

impl<'a> ByteReader<'a> {
	pub(crate) fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, position: 0 }
	}

	fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
		let end = self.position + N;
		let slice = self.bytes.get(self.position..end).ok_or(CodecError::Truncated {
			offset: self.position,
			needed: N,
			available: self.bytes.len().saturating_sub(self.position),
		})?;
		let mut out = [0u8; N];
		out.copy_from_slice(slice);
		self.position = end;
		Ok(out)
	}

	pub(crate) fn read_u8(&mut self) -> Result<u8, CodecError> {
		Ok(self.take::<1>()?[0])
	}

	pub(crate) fn read_i8(&mut self) -> Result<i8, CodecError> {
		Ok(self.read_u8()? as i8)
	}

	pub(crate) fn read_u16(&mut self) -> Result<u16, CodecError> {
		Ok(u16::from_le_bytes(self.take()?))
	}

	pub(crate) fn read_u32(&mut self) -> Result<u32, CodecError> {
		Ok(u32::from_le_bytes(self.take()?))
	}

	pub(crate) fn read_i32(&mut self) -> Result<i32, CodecError> {
		Ok(i32::from_le_bytes(self.take()?))
	}

	pub(crate) fn read_u64(&mut self) -> Result<u64, CodecError> {
		Ok(u64::from_le_bytes(self.take()?))
	}

	pub(crate) fn read_i64(&mut self) -> Result<i64, CodecError> {
		Ok(i64::from_le_bytes(self.take()?))
	}

	pub(crate) fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
		self.take()
	}

	/// Consume and return everything not read yet.
	pub(crate) fn remaining(&mut self) -> &'a [u8] {
		let rest = &self.bytes[self.position.min(self.bytes.len())..];
		self.position = self.bytes.len();
		rest
	}
}

/// Fixed header of a binary transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHeader {
	pub chain_id: u32,
	pub tx_type: i8,
	pub subtype: i8,
	pub version: u8,
	/// Seconds since the ledger epoch.
	pub timestamp: u32,
	/// Minutes the transaction stays valid. Not interpreted by the wallet.
	pub deadline: u16,
	pub sender_public_key: [u8; 32],
	pub recipient_id: u64,
	pub amount: i64,
	pub fee: i64,
	pub signature: [u8; SIGNATURE_LENGTH],
	pub ec_block_height: u32,
	pub ec_block_id: u64,
	/// Bitmap of appendices following the attachment.
	pub flags: u32,
}

impl TransactionHeader {
	fn read(reader: &mut ByteReader<'_>) -> Result<Self, CodecError> {
		Ok(Self {
			chain_id: reader.read_u32()?,
			tx_type: reader.read_i8()?,
			subtype: reader.read_i8()?,
			version: reader.read_u8()?,
			timestamp: reader.read_u32()?,
			deadline: reader.read_u16()?,
			sender_public_key: reader.read_array()?,
			recipient_id: reader.read_u64()?,
			amount: reader.read_i64()?,
			fee: reader.read_i64()?,
			signature: reader.read_array()?,
			ec_block_height: reader.read_u32()?,
			ec_block_id: reader.read_u64()?,
			flags: reader.read_u32()?,
		})
	}

	fn write(&self, out: &mut Vec<u8>) {
		out.extend_from_slice(&self.chain_id.to_le_bytes());
		out.push(self.tx_type as u8);
		out.push(self.subtype as u8);
		out.push(self.version);
		out.extend_from_slice(&self.timestamp.to_le_bytes());
		out.extend_from_slice(&self.deadline.to_le_bytes());
		out.extend_from_slice(&self.sender_public_key);
		out.extend_from_slice(&self.recipient_id.to_le_bytes());
		out.extend_from_slice(&self.amount.to_le_bytes());
		out.extend_from_slice(&self.fee.to_le_bytes());
		out.extend_from_slice(&self.signature);
		out.extend_from_slice(&self.ec_block_height.to_le_bytes());
		out.extend_from_slice(&self.ec_block_id.to_le_bytes());
		out.extend_from_slice(&self.flags.to_le_bytes());
	}

	pub fn sender_id(&self) -> u64 {
		crypto::account_id(&self.sender_public_key)
	}

	pub fn is_signed(&self) -> bool {
		self.signature.iter().any(|byte| *byte != 0)
	}
}

/// A decoded binary transaction: header, attachment and any appendix bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionBytes {
	header: TransactionHeader,
	attachment: Attachment,
	appendix: Vec<u8>,
}

impl TransactionBytes {
	pub fn new(header: TransactionHeader, attachment: Attachment) -> Self {
		Self {
			header,
			attachment,
			appendix: Vec::new(),
		}
	}

	/// Decode a signed or unsigned transaction.
	pub fn parse(bytes: &[u8], constants: &NodeConstants) -> Result<Self, CodecError> {
		if bytes.len() < BASE_LENGTH {
			return Err(CodecError::Truncated {
				offset: 0,
				needed: BASE_LENGTH,
				available: bytes.len(),
			});
		}
		let mut reader = ByteReader::new(bytes);
		let header = TransactionHeader::read(&mut reader)?;
		constants.require_chain(header.chain_id as i64)?;

		let attachment = Attachment::read(&mut reader, header.tx_type, header.subtype, constants)?;
		let appendix = reader.remaining().to_vec();
		if header.flags == 0 && !appendix.is_empty() {
			return Err(CodecError::TrailingBytes(appendix.len()));
		}
		Ok(Self {
			header,
			attachment,
			appendix,
		})
	}

	pub fn header(&self) -> &TransactionHeader {
		&self.header
	}

	pub fn attachment(&self) -> &Attachment {
		&self.attachment
	}

	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(BASE_LENGTH + self.attachment.len() + self.appendix.len());
		self.header.write(&mut out);
		self.attachment.write(&mut out);
		out.extend_from_slice(&self.appendix);
		out
	}

	/// Bytes covered by the signature: the transaction with a zeroed signature.
	pub fn unsigned_bytes(&self) -> Vec<u8> {
		let mut bytes = self.to_bytes();
		bytes[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LENGTH].fill(0);
		bytes
	}

	pub fn set_signature(&mut self, signature: [u8; SIGNATURE_LENGTH]) {
		self.header.signature = signature;
	}

	pub fn full_hash(&self) -> [u8; 32] {
		hash_parts(&self.unsigned_bytes(), &self.header.signature)
	}

	pub fn id(&self) -> u64 {
		compute_id(&self.full_hash())
	}

	/// Unconfirmed ledger entry for this transaction.
	pub fn to_transaction(&self, constants: &NodeConstants) -> Transaction {
		let header = &self.header;
		let full_hash = self.full_hash();
		Transaction {
			id: compute_id(&full_hash),
			full_hash,
			version: header.version,
			chain_id: header.chain_id,
			sender_id: header.sender_id(),
			recipient_id: header.recipient_id,
			amount: header.amount,
			fee: header.fee,
			timestamp: constants.to_time(header.timestamp),
			tx_type: header.tx_type,
			subtype: header.subtype,
			type_label: constants.type_label(header.tx_type, header.subtype).to_string(),
			block_id: 0,
			height: 0,
		}
	}
}

/// Derived identifier of a full hash.
pub fn compute_id(full_hash: &[u8; 32]) -> u64 {
	crypto::full_hash_to_id(full_hash)
}

/// Full hash of a serialized transaction without decoding it.
pub fn compute_full_hash(bytes: &[u8]) -> Result<[u8; 32], CodecError> {
	let end = SIGNATURE_OFFSET + SIGNATURE_LENGTH;
	if bytes.len() < end {
		return Err(CodecError::Truncated {
			offset: SIGNATURE_OFFSET,
			needed: SIGNATURE_LENGTH,
			available: bytes.len().saturating_sub(SIGNATURE_OFFSET),
		});
	}
	let mut signature = [0u8; SIGNATURE_LENGTH];
	signature.copy_from_slice(&bytes[SIGNATURE_OFFSET..end]);
	let mut unsigned = bytes.to_vec();
	unsigned[SIGNATURE_OFFSET..end].fill(0);
	Ok(hash_parts(&unsigned, &signature))
}

/// Overwrite the signature range of a serialized transaction in place.
pub fn insert_signature(
	bytes: &mut [u8],
	signature: &[u8; SIGNATURE_LENGTH],
) -> Result<(), CodecError> {
	let available = bytes.len();
	let slot = bytes
		.get_mut(SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LENGTH)
		.ok_or(CodecError::Truncated {
			offset: SIGNATURE_OFFSET,
			needed: SIGNATURE_LENGTH,
			available: available.saturating_sub(SIGNATURE_OFFSET),
		})?;
	slot.copy_from_slice(signature);
	Ok(())
}

fn hash_parts(unsigned: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> [u8; 32] {
	crypto::digest_pair(unsigned, &crypto::single_digest(signature))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionJson {
	full_hash: String,
	#[serde(default, rename = "transaction", deserialize_with = "u64_flexible")]
	id: u64,
	#[serde(default)]
	version: u8,
	#[serde(deserialize_with = "u32_flexible")]
	chain: u32,
	#[serde(rename = "type")]
	tx_type: i8,
	subtype: i8,
	#[serde(deserialize_with = "u32_flexible")]
	timestamp: u32,
	#[serde(deserialize_with = "u64_flexible")]
	sender: u64,
	#[serde(default, deserialize_with = "u64_flexible")]
	recipient: u64,
	#[serde(rename = "amountNQT", deserialize_with = "i64_flexible")]
	amount: i64,
	#[serde(rename = "feeNQT", deserialize_with = "i64_flexible")]
	fee: i64,
	#[serde(default, deserialize_with = "u64_flexible")]
	block: u64,
	#[serde(default, deserialize_with = "u64_flexible")]
	height: u64,
}

/// Decode the JSON form returned by `getTransaction` and the transaction list requests.
pub fn parse_json(
	value: &serde_json::Value,
	constants: &NodeConstants,
) -> Result<Transaction, CodecError> {
	let raw = TransactionJson::deserialize(value).map_err(|e| CodecError::Json(e.to_string()))?;

	let full_hash = parse_full_hash(&raw.full_hash)?;
	let id = compute_id(&full_hash);
	if raw.id != 0 && raw.id != id {
		return Err(CodecError::IdMismatch {
			reported: raw.id,
			derived: id,
		});
	}
	constants.require_chain(raw.chain as i64)?;

	let confirmed = raw.block != 0 && raw.height != 0 && raw.height < UNCONFIRMED_HEIGHT;
	let (block_id, height) = if confirmed {
		(raw.block, raw.height as u32)
	} else {
		(0, 0)
	};

	Ok(Transaction {
		id,
		full_hash,
		version: raw.version,
		chain_id: raw.chain,
		sender_id: raw.sender,
		recipient_id: raw.recipient,
		amount: raw.amount,
		fee: raw.fee,
		timestamp: constants.to_time(raw.timestamp),
		tx_type: raw.tx_type,
		subtype: raw.subtype,
		type_label: constants.type_label(raw.tx_type, raw.subtype).to_string(),
		block_id,
		height,
	})
}

/// Decode a 64-character hex full hash.
pub fn parse_full_hash(hex_hash: &str) -> Result<[u8; 32], CodecError> {
	let bytes = hex::decode(hex_hash).map_err(|e| CodecError::InvalidField {
		field: "fullHash",
		reason: e.to_string(),
	})?;
	<[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| CodecError::InvalidField {
		field: "fullHash",
		reason: format!("expected 32 bytes, got {}", bytes.len()),
	})
}
