//! Transactions: the ledger model, the binary/JSON codec, attachments, local construction and
//! the validate-sign-broadcast flow for outgoing transactions.

/// Type-specific attachments
pub mod attachment;
/// Builder for unsigned transaction bytes
pub mod builder;
/// Chain and transaction type tables
pub mod chain;
/// Binary and JSON transaction codec
pub mod codec;
/// Validation, signing and broadcasting of node-built transactions
pub mod sender;

use chrono::{DateTime, Utc};
use std::fmt;
use std::hash::{Hash, Hasher};

pub use attachment::{Attachment, OrderIssueAttachment};
pub use builder::{TransactionBuilder, TransactionError};
pub use chain::{Chain, NodeConstants};
pub use codec::{BASE_LENGTH, CodecError, SIGNATURE_OFFSET, TransactionBytes, TransactionHeader};
pub use sender::{ExchangeOrder, Payment, TransactionSender};

/// Blocks on top of a transaction's block before it counts as confirmed.
pub const CONFIRMATION_DEPTH: u32 = 5;

/// Where a transaction stands relative to the chain tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationState {
	/// Not in a block.
	Unconfirmed,
	/// In a block fewer than [`CONFIRMATION_DEPTH`] blocks below the tip.
	Building,
	Confirmed,
}

impl ConfirmationState {
	pub fn label(&self) -> &'static str {
		match self {
			ConfirmationState::Unconfirmed => "Pending",
			ConfirmationState::Building => "Building",
			ConfirmationState::Confirmed => "Confirmed",
		}
	}
}

impl fmt::Display for ConfirmationState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

/// A ledger transaction, confirmed or not.
///
/// Equality and hashing use the full hash only. After construction only the block id and height
/// change, as the transaction moves between confirmation states.
#[derive(Debug, Clone)]
pub struct Transaction {
	id: u64,
	full_hash: [u8; 32],
	version: u8,
	chain_id: u32,
	sender_id: u64,
	recipient_id: u64,
	amount: i64,
	fee: i64,
	timestamp: DateTime<Utc>,
	tx_type: i8,
	subtype: i8,
	type_label: String,
	block_id: u64,
	height: u32,
}

impl Transaction {
	/// Decode a binary transaction. The result is unconfirmed.
	pub fn from_bytes(bytes: &[u8], constants: &NodeConstants) -> Result<Self, CodecError> {
		TransactionBytes::parse(bytes, constants).map(|tx| tx.to_transaction(constants))
	}

	/// Decode a transaction from its node JSON representation.
	pub fn from_json(
		value: &serde_json::Value,
		constants: &NodeConstants,
	) -> Result<Self, CodecError> {
		codec::parse_json(value, constants)
	}

	/// Same transaction placed at a different block, e.g. as reported again after a reorg.
	pub fn with_confirmation(mut self, block_id: u64, height: u32) -> Self {
		self.set_confirmation(block_id, height);
		self
	}

	pub(crate) fn set_confirmation(&mut self, block_id: u64, height: u32) {
		if block_id == 0 {
			self.block_id = 0;
			self.height = 0;
		} else {
			self.block_id = block_id;
			self.height = height;
		}
	}

	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn full_hash(&self) -> &[u8; 32] {
		&self.full_hash
	}

	pub fn full_hash_hex(&self) -> String {
		hex::encode(self.full_hash)
	}

	pub fn version(&self) -> u8 {
		self.version
	}

	pub fn chain_id(&self) -> u32 {
		self.chain_id
	}

	pub fn sender_id(&self) -> u64 {
		self.sender_id
	}

	pub fn recipient_id(&self) -> u64 {
		self.recipient_id
	}

	pub fn amount(&self) -> i64 {
		self.amount
	}

	pub fn fee(&self) -> i64 {
		self.fee
	}

	pub fn timestamp(&self) -> DateTime<Utc> {
		self.timestamp
	}

	pub fn tx_type(&self) -> i8 {
		self.tx_type
	}

	pub fn subtype(&self) -> i8 {
		self.subtype
	}

	pub fn type_label(&self) -> &str {
		&self.type_label
	}

	pub fn block_id(&self) -> u64 {
		self.block_id
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	pub fn is_confirmed(&self) -> bool {
		self.block_id != 0
	}

	pub fn confirmation_state(&self, tip: u32) -> ConfirmationState {
		if self.block_id == 0 {
			ConfirmationState::Unconfirmed
		} else if tip.saturating_sub(self.height) < CONFIRMATION_DEPTH {
			ConfirmationState::Building
		} else {
			ConfirmationState::Confirmed
		}
	}
}

impl PartialEq for Transaction {
	fn eq(&self, other: &Self) -> bool {
		self.full_hash == other.full_hash
	}
}

impl Eq for Transaction {}

impl Hash for Transaction {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.full_hash.hash(state);
	}
}

#[cfg(test)]
pub(crate) mod fixtures {
	use super::*;
	use std::collections::HashMap;

	pub const EPOCH_MILLIS: i64 = 1_514_296_800_000;

	pub fn constants() -> NodeConstants {
		let epoch = DateTime::from_timestamp_millis(EPOCH_MILLIS).unwrap();
		let types: HashMap<(i8, i8), String> = [
			((0, 0), "OrdinaryPayment"),
			((11, 0), "ExchangeOrderIssue"),
			((-4, 0), "FxtExchangeOrderIssue"),
		]
		.into_iter()
		.map(|(key, name)| (key, name.to_string()))
		.collect();
		NodeConstants::new(
			epoch,
			[Chain::new(1, "ARDR", 8), Chain::new(2, "IGNIS", 8)],
			types,
		)
	}

	/// Unconfirmed IGNIS payment whose full hash is `[seed; 32]`.
	pub fn transaction(seed: u8, timestamp: u32) -> Transaction {
		let full_hash = [seed; 32];
		Transaction {
			id: codec::compute_id(&full_hash),
			full_hash,
			version: 1,
			chain_id: 2,
			sender_id: 1,
			recipient_id: 2,
			amount: 100,
			fee: 1,
			timestamp: constants().to_time(timestamp),
			tx_type: 0,
			subtype: 0,
			type_label: "OrdinaryPayment".to_string(),
			block_id: 0,
			height: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_confirmation_state() {
		let tx = fixtures::transaction(1, 10);
		assert_eq!(tx.confirmation_state(100), ConfirmationState::Unconfirmed);

		let tx = tx.with_confirmation(55, 96);
		assert_eq!(tx.confirmation_state(100), ConfirmationState::Building);
		assert_eq!(tx.confirmation_state(101), ConfirmationState::Confirmed);
		// The tip may lag behind a freshly reported block.
		assert_eq!(tx.confirmation_state(90), ConfirmationState::Building);
		assert_eq!(tx.confirmation_state(101).label(), "Confirmed");
	}

	#[test]
	fn test_equality_uses_full_hash() {
		let a = fixtures::transaction(4, 10);
		let b = fixtures::transaction(4, 99).with_confirmation(7, 8);
		assert_eq!(a, b);
		assert_ne!(a, fixtures::transaction(5, 10));
	}

	#[test]
	fn test_zero_block_clears_height() {
		let tx = fixtures::transaction(1, 10).with_confirmation(0, 44);
		assert_eq!((tx.block_id(), tx.height()), (0, 0));
	}
}
