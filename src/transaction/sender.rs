//! Validation, signing and broadcasting of outgoing transactions.
//!
//! The node builds the unsigned transaction; the wallet decodes the returned bytes, checks them
//! against what was asked for, signs locally and broadcasts the signed bytes. The secret phrase
//! never leaves the process.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::attachment::{
	Attachment, SUBTYPE_ORDINARY_PAYMENT, TYPE_COIN_EXCHANGE, TYPE_FXT_COIN_EXCHANGE, TYPE_PAYMENT,
};
use super::builder::TransactionError;
use super::chain::{Chain, NodeConstants, PARENT_CHAIN_ID};
use super::codec::TransactionBytes;
use crate::crypto;
use crate::node::{ExchangeParams, NodeClient, PaymentParams};
use crate::utils::format_amount;

/// A payment to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
	pub chain_id: u32,
	pub recipient_id: u64,
	pub amount: i64,
	/// 0 accepts whatever fee the node computes from the bundler rate.
	pub fee: i64,
}

/// An order to buy `quantity` coins of `exchange_chain_id` paying `price` per whole coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOrder {
	pub chain_id: u32,
	pub exchange_chain_id: u32,
	pub quantity: i64,
	pub price: i64,
	/// 0 accepts whatever fee the node computes from the bundler rate.
	pub fee: i64,
}

/// Submits transactions for the session's account.
#[derive(Clone)]
pub struct TransactionSender {
	client: NodeClient,
	constants: Arc<NodeConstants>,
}

impl TransactionSender {
	pub fn new(client: NodeClient, constants: Arc<NodeConstants>) -> Self {
		Self { client, constants }
	}

	/// Send coins to another account.
	///
	/// # Arguments
	/// * `payment` - Chain, recipient, amount and fee.
	/// * `secret_phrase` - Secret phrase of the sending account.
	///
	/// # Returns
	/// The signed transaction as broadcast.
	pub async fn send_money(
		&self,
		payment: &Payment,
		secret_phrase: &str,
	) -> Result<TransactionBytes, TransactionError> {
		let chain = self.constants.require_chain(payment.chain_id as i64)?;
		if payment.amount <= 0 {
			return Err(TransactionError::ValidationError(format!(
				"Payment amount {} must be positive",
				payment.amount
			)));
		}
		check_fee(payment.fee)?;

		let public_key = crypto::public_key(secret_phrase)?;
		let sender_id = crypto::account_id(&public_key);
		self.ensure_sufficient_balance(sender_id, chain, payment.amount, payment.fee)
			.await?;
		let fee_rate = self.fee_rate(chain, payment.fee).await?;

		let unsigned = self
			.client
			.send_money(&PaymentParams {
				chain: &chain.name,
				recipient_id: payment.recipient_id,
				amount: payment.amount,
				fee: payment.fee,
				fee_rate,
				public_key,
			})
			.await?;
		let tx = self.decode_unsigned(&unsigned.bytes_hex)?;
		validate_payment(&tx, payment, &public_key)?;

		self.sign_and_broadcast(tx, secret_phrase).await
	}

	/// Place a coin exchange order.
	///
	/// # Arguments
	/// * `order` - Chains, quantity, price and fee.
	/// * `secret_phrase` - Secret phrase of the ordering account.
	///
	/// # Returns
	/// The signed transaction as broadcast.
	pub async fn exchange_coins(
		&self,
		order: &ExchangeOrder,
		secret_phrase: &str,
	) -> Result<TransactionBytes, TransactionError> {
		let chain = self.constants.require_chain(order.chain_id as i64)?;
		let exchange_chain = self.constants.require_chain(order.exchange_chain_id as i64)?;
		if chain.id == exchange_chain.id {
			return Err(TransactionError::ValidationError(format!(
				"Cannot exchange {} for itself",
				chain.name
			)));
		}
		if order.quantity <= 0 || order.price <= 0 {
			return Err(TransactionError::ValidationError(
				"Order quantity and price must be positive".to_string(),
			));
		}
		check_fee(order.fee)?;

		let public_key = crypto::public_key(secret_phrase)?;
		let sender_id = crypto::account_id(&public_key);
		let cost = order_cost(order.quantity, order.price, exchange_chain)?;
		self.ensure_sufficient_balance(sender_id, chain, cost, order.fee)
			.await?;
		// The parent chain takes no bundler rate.
		let fee_rate = if exchange_chain.id == PARENT_CHAIN_ID {
			0
		} else {
			self.fee_rate(chain, order.fee).await?
		};

		let unsigned = self
			.client
			.exchange_coins(&ExchangeParams {
				chain: &chain.name,
				exchange_chain: &exchange_chain.name,
				quantity: order.quantity,
				price: order.price,
				fee: order.fee,
				fee_rate,
				public_key,
			})
			.await?;
		let tx = self.decode_unsigned(&unsigned.bytes_hex)?;
		validate_exchange(&tx, order, &public_key)?;

		self.sign_and_broadcast(tx, secret_phrase).await
	}

	/// Reject a spend of `amount + fee` above the unconfirmed balance.
	async fn ensure_sufficient_balance(
		&self,
		account_id: u64,
		chain: &Chain,
		amount: i64,
		fee: i64,
	) -> Result<(), TransactionError> {
		let balance = self.client.get_balance(account_id, chain).await?;
		let required = amount.saturating_add(fee);
		if required > balance.unconfirmed {
			return Err(TransactionError::InsufficientBalance(format!(
				"{} {} required, {} {} available",
				display_amount(required, chain.decimals),
				chain.name,
				display_amount(balance.unconfirmed, chain.decimals),
				chain.name
			)));
		}
		Ok(())
	}

	/// Bundler fee rate for a child chain transaction whose fee the node should compute.
	async fn fee_rate(&self, chain: &Chain, fee: i64) -> Result<u64, TransactionError> {
		if chain.id == PARENT_CHAIN_ID || fee != 0 {
			return Ok(0);
		}
		let rate = self
			.client
			.get_bundler_rates()
			.await?
			.into_iter()
			.find(|rate| rate.chain == chain.id)
			.map(|rate| rate.min_rate)
			.unwrap_or(0);
		if rate == 0 {
			warn!("No bundler rate available for {}", chain.name);
		}
		debug!("Using fee rate {} for {}", rate, chain.name);
		Ok(rate)
	}

	fn decode_unsigned(&self, bytes_hex: &str) -> Result<TransactionBytes, TransactionError> {
		let bytes = hex::decode(bytes_hex).map_err(|e| {
			TransactionError::ValidationError(format!("Unsigned transaction is not hex: {}", e))
		})?;
		let tx = TransactionBytes::parse(&bytes, &self.constants)?;
		if tx.header().is_signed() {
			return Err(TransactionError::ValidationError(
				"Node returned a signed transaction".to_string(),
			));
		}
		Ok(tx)
	}

	async fn sign_and_broadcast(
		&self,
		mut tx: TransactionBytes,
		secret_phrase: &str,
	) -> Result<TransactionBytes, TransactionError> {
		let signature = crypto::sign(&tx.unsigned_bytes(), secret_phrase)?;
		tx.set_signature(signature);
		let full_hash = hex::encode(tx.full_hash());

		let result = self.client.broadcast_transaction(&tx.to_bytes()).await?;
		if !result.full_hash.eq_ignore_ascii_case(&full_hash) {
			return Err(TransactionError::ValidationError(format!(
				"Node reported full hash {} for transaction {}",
				result.full_hash, full_hash
			)));
		}
		info!(
			"Broadcast transaction {} ({})",
			tx.id(),
			self.constants
				.type_label(tx.header().tx_type, tx.header().subtype)
		);
		Ok(tx)
	}
}

fn display_amount(amount: i64, decimals: u32) -> String {
	format_amount(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

fn check_fee(fee: i64) -> Result<(), TransactionError> {
	if fee < 0 {
		return Err(TransactionError::ValidationError(format!(
			"Fee {} is negative",
			fee
		)));
	}
	Ok(())
}

/// Coins of the order's chain paid for `quantity` minor units of the exchange chain.
fn order_cost(quantity: i64, price: i64, exchange_chain: &Chain) -> Result<i64, TransactionError> {
	let one_coin = exchange_chain.one_coin().ok_or_else(|| {
		TransactionError::ValidationError(format!(
			"Chain {} has too many decimal places",
			exchange_chain.name
		))
	})?;
	let cost = quantity as i128 * price as i128 / one_coin as i128;
	i64::try_from(cost)
		.map_err(|_| TransactionError::ValidationError("Order cost overflows".to_string()))
}

fn mismatch(
	field: &str,
	expected: impl std::fmt::Display,
	actual: impl std::fmt::Display,
) -> TransactionError {
	TransactionError::ValidationError(format!(
		"Transaction {} is {}, expected {}",
		field, actual, expected
	))
}

fn validate_common(
	tx: &TransactionBytes,
	chain_id: u32,
	fee: i64,
	public_key: &[u8; 32],
) -> Result<(), TransactionError> {
	let header = tx.header();
	if header.chain_id != chain_id {
		return Err(mismatch("chain", chain_id, header.chain_id));
	}
	if &header.sender_public_key != public_key {
		return Err(mismatch(
			"sender",
			crypto::account_id(public_key),
			header.sender_id(),
		));
	}
	if fee != 0 && header.fee != fee {
		return Err(mismatch("fee", fee, header.fee));
	}
	Ok(())
}

/// Check a node-built payment against the request.
pub(crate) fn validate_payment(
	tx: &TransactionBytes,
	payment: &Payment,
	public_key: &[u8; 32],
) -> Result<(), TransactionError> {
	validate_common(tx, payment.chain_id, payment.fee, public_key)?;
	let header = tx.header();
	if (header.tx_type, header.subtype) != (TYPE_PAYMENT, SUBTYPE_ORDINARY_PAYMENT) {
		return Err(mismatch(
			"type",
			format!("{}/{}", TYPE_PAYMENT, SUBTYPE_ORDINARY_PAYMENT),
			format!("{}/{}", header.tx_type, header.subtype),
		));
	}
	if header.recipient_id != payment.recipient_id {
		return Err(mismatch("recipient", payment.recipient_id, header.recipient_id));
	}
	if header.amount != payment.amount {
		return Err(mismatch("amount", payment.amount, header.amount));
	}
	Ok(())
}

/// Check a node-built exchange order against the request.
pub(crate) fn validate_exchange(
	tx: &TransactionBytes,
	order: &ExchangeOrder,
	public_key: &[u8; 32],
) -> Result<(), TransactionError> {
	validate_common(tx, order.chain_id, order.fee, public_key)?;
	let header = tx.header();
	if !matches!(header.tx_type, TYPE_COIN_EXCHANGE | TYPE_FXT_COIN_EXCHANGE) {
		return Err(mismatch("type", TYPE_COIN_EXCHANGE, header.tx_type));
	}
	let Attachment::ExchangeOrderIssue(attachment) = tx.attachment() else {
		return Err(TransactionError::ValidationError(
			"Transaction has no order issue attachment".to_string(),
		));
	};
	if attachment.chain_id != order.chain_id {
		return Err(mismatch("order chain", order.chain_id, attachment.chain_id));
	}
	if attachment.exchange_chain_id != order.exchange_chain_id {
		return Err(mismatch(
			"exchange chain",
			order.exchange_chain_id,
			attachment.exchange_chain_id,
		));
	}
	if attachment.quantity != order.quantity {
		return Err(mismatch("quantity", order.quantity, attachment.quantity));
	}
	if attachment.price != order.price {
		return Err(mismatch("price", order.price, attachment.price));
	}
	Ok(())
}
