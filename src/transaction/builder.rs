//! Transaction builder
//!
//! Builds unsigned transaction bytes locally. The wallet normally lets the node build
//! transactions and only validates them; the builder is used for offline construction and to
//! produce reference bytes to compare against.

use chrono::Utc;
use thiserror::Error;

use super::attachment::{
	Attachment, OrderIssueAttachment, SUBTYPE_ORDER_ISSUE, SUBTYPE_ORDINARY_PAYMENT,
	TYPE_COIN_EXCHANGE, TYPE_FXT_COIN_EXCHANGE, TYPE_PAYMENT,
};
use super::chain::{NodeConstants, PARENT_CHAIN_ID};
use super::codec::{CodecError, TransactionBytes, TransactionHeader};
use crate::crypto::SigningError;
use crate::crypto::signer::SIGNATURE_LENGTH;
use crate::node::NodeError;

/// Deadline in minutes used for every transaction the wallet creates.
pub const DEFAULT_DEADLINE: u16 = 30;
const TRANSACTION_VERSION: u8 = 1;

#[derive(Error, Debug)]
pub enum TransactionError {
	#[error("Transaction validation error: {0}")]
	ValidationError(String),

	#[error("Insufficient balance: {0}")]
	InsufficientBalance(String),

	#[error("Transaction codec error: {0}")]
	CodecError(#[from] CodecError),

	#[error("Signing error: {0}")]
	SigningError(#[from] SigningError),

	#[error("Node error: {0}")]
	NodeError(#[from] NodeError),
}

enum Payload {
	Payment { recipient_id: u64, amount: i64 },
	ExchangeOrder(OrderIssueAttachment),
}

/// Builder for unsigned transactions.
pub struct TransactionBuilder<'a> {
	constants: &'a NodeConstants,
	/// Chain the transaction is submitted on
	chain_id: Option<u32>,
	sender_public_key: Option<[u8; 32]>,
	/// Seconds since the ledger epoch, defaults to now
	timestamp: Option<u32>,
	deadline: u16,
	fee: i64,
	ec_block: (u32, u64),
	payload: Option<Payload>,
}

impl<'a> TransactionBuilder<'a> {
	pub fn new(constants: &'a NodeConstants) -> Self {
		Self {
			constants,
			chain_id: None,
			sender_public_key: None,
			timestamp: None,
			deadline: DEFAULT_DEADLINE,
			fee: 0,
			ec_block: (0, 0),
			payload: None,
		}
	}

	pub fn with_chain(mut self, chain_id: u32) -> Self {
		self.chain_id = Some(chain_id);
		self
	}

	pub fn with_sender_public_key(mut self, public_key: [u8; 32]) -> Self {
		self.sender_public_key = Some(public_key);
		self
	}

	pub fn with_timestamp(mut self, epoch_seconds: u32) -> Self {
		self.timestamp = Some(epoch_seconds);
		self
	}

	pub fn with_deadline(mut self, minutes: u16) -> Self {
		self.deadline = minutes;
		self
	}

	pub fn with_fee(mut self, fee: i64) -> Self {
		self.fee = fee;
		self
	}

	/// Sets the economic clustering block the transaction references
	pub fn with_ec_block(mut self, height: u32, block_id: u64) -> Self {
		self.ec_block = (height, block_id);
		self
	}

	pub fn ordinary_payment(mut self, recipient_id: u64, amount: i64) -> Self {
		self.payload = Some(Payload::Payment {
			recipient_id,
			amount,
		});
		self
	}

	pub fn exchange_order(mut self, order: OrderIssueAttachment) -> Self {
		self.payload = Some(Payload::ExchangeOrder(order));
		self
	}

	/// Builds the unsigned transaction
	pub fn build(self) -> Result<TransactionBytes, TransactionError> {
		let chain_id = self
			.chain_id
			.ok_or_else(|| TransactionError::ValidationError("Chain not set".to_string()))?;
		self.constants.require_chain(chain_id as i64)?;
		let sender_public_key = self.sender_public_key.ok_or_else(|| {
			TransactionError::ValidationError("Sender public key not set".to_string())
		})?;
		if self.fee < 0 {
			return Err(TransactionError::ValidationError(format!(
				"Fee {} is negative",
				self.fee
			)));
		}
		let payload = self
			.payload
			.ok_or_else(|| TransactionError::ValidationError("Nothing to build".to_string()))?;

		let (tx_type, subtype, recipient_id, amount, attachment) = match payload {
			Payload::Payment {
				recipient_id,
				amount,
			} => {
				if amount <= 0 {
					return Err(TransactionError::ValidationError(format!(
						"Payment amount {} must be positive",
						amount
					)));
				}
				(
					TYPE_PAYMENT,
					SUBTYPE_ORDINARY_PAYMENT,
					recipient_id,
					amount,
					Attachment::OrdinaryPayment,
				)
			}
			Payload::ExchangeOrder(order) => {
				if order.chain_id != chain_id {
					return Err(TransactionError::ValidationError(format!(
						"Order chain {} does not match transaction chain {}",
						order.chain_id, chain_id
					)));
				}
				self.constants.require_chain(order.exchange_chain_id as i64)?;
				if order.quantity <= 0 || order.price <= 0 {
					return Err(TransactionError::ValidationError(
						"Order quantity and price must be positive".to_string(),
					));
				}
				let tx_type = if chain_id == PARENT_CHAIN_ID {
					TYPE_FXT_COIN_EXCHANGE
				} else {
					TYPE_COIN_EXCHANGE
				};
				(
					tx_type,
					SUBTYPE_ORDER_ISSUE,
					0,
					0,
					Attachment::ExchangeOrderIssue(order),
				)
			}
		};

		let timestamp = self
			.timestamp
			.unwrap_or_else(|| self.constants.to_epoch_seconds(Utc::now()));
		let header = TransactionHeader {
			chain_id,
			tx_type,
			subtype,
			version: TRANSACTION_VERSION,
			timestamp,
			deadline: self.deadline,
			sender_public_key,
			recipient_id,
			amount,
			fee: self.fee,
			signature: [0u8; SIGNATURE_LENGTH],
			ec_block_height: self.ec_block.0,
			ec_block_id: self.ec_block.1,
			flags: 0,
		};
		Ok(TransactionBytes::new(header, attachment))
	}
}
