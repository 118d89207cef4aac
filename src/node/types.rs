//! Types for the node HTTP/JSON API

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::json::{i64_flexible, u32_flexible, u64_flexible};

/// Failure to obtain a well-formed response from the node.
#[derive(Error, Debug)]
pub enum TransportError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("Response code {status} for {request_type} request")]
	StatusError { status: u16, request_type: String },

	#[error("Malformed JSON response for {request_type} request: {message}")]
	JsonError {
		request_type: String,
		message: String,
	},

	#[error("Server response for {0} request is not a JSON object")]
	NotAnObject(String),

	#[error("Unexpected response for {request_type} request: {message}")]
	UnexpectedResponse {
		request_type: String,
		message: String,
	},
}

/// An `errorCode` returned by the node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error {code} returned for {request_type} request: {description}")]
pub struct ApplicationError {
	pub request_type: String,
	pub code: i64,
	pub description: String,
}

/// Error codes the wallet reacts to.
pub mod error_codes {
	/// Account, transaction or block does not exist.
	pub const UNKNOWN_OBJECT: i64 = 5;
}

#[derive(Error, Debug)]
pub enum NodeError {
	#[error(transparent)]
	Transport(#[from] TransportError),

	#[error(transparent)]
	Application(#[from] ApplicationError),
}

impl NodeError {
	/// The node's error code when this is an application error.
	pub fn application_code(&self) -> Option<i64> {
		match self {
			NodeError::Application(error) => Some(error.code),
			NodeError::Transport(_) => None,
		}
	}
}

impl From<reqwest::Error> for NodeError {
	fn from(error: reqwest::Error) -> Self {
		NodeError::Transport(TransportError::HttpError(error))
	}
}

/// How an `eventRegister` call treats an existing subscription.
///
/// Adding and removing in the same call is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterMode {
	/// Replace the subscription's events, or create a subscription when the token is 0.
	Create,
	/// Add events to an existing subscription.
	Add,
	/// Remove events from an existing subscription. With no events, removes all of them and
	/// releases a pending `eventWait`.
	Remove,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventRegistration {
	#[serde(default, deserialize_with = "u64_flexible")]
	pub token: u64,
	#[serde(default)]
	pub registered: bool,
}

/// One event as reported by `eventWait`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEvent {
	pub name: String,
	#[serde(default)]
	pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventWaitResponse {
	#[serde(default)]
	pub events: Vec<ServerEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainStatus {
	#[serde(default)]
	pub application: String,
	#[serde(default)]
	pub version: String,
	#[serde(deserialize_with = "u32_flexible")]
	pub number_of_blocks: u32,
}

impl BlockchainStatus {
	/// Height of the last block.
	pub fn height(&self) -> u32 {
		self.number_of_blocks.saturating_sub(1)
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
	#[serde(default)]
	pub name: String,
	#[serde(rename = "accountRS", default)]
	pub account_rs: String,
}

/// Balance of an account on one chain, in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
	#[serde(rename = "balanceNQT", deserialize_with = "i64_flexible")]
	pub confirmed: i64,
	#[serde(rename = "unconfirmedBalanceNQT", deserialize_with = "i64_flexible")]
	pub unconfirmed: i64,
}

/// Minimum fee rate a bundler accepts for a child chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlerRate {
	#[serde(deserialize_with = "u32_flexible")]
	pub chain: u32,
	#[serde(rename = "minRateNQTPerFXT", deserialize_with = "u64_flexible")]
	pub min_rate: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BundlerRatesResponse {
	#[serde(default)]
	pub rates: Vec<BundlerRate>,
}

/// Open coin exchange order, as listed by `getCoinExchangeOrders`.
///
/// The order offers `quantity` minor units of the `exchange` chain and pays `bid` minor units of
/// `chain` for each whole coin. `ask` is the inverse price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinExchangeOrder {
	#[serde(default, deserialize_with = "u64_flexible")]
	pub order: u64,
	#[serde(deserialize_with = "u32_flexible")]
	pub chain: u32,
	#[serde(default, deserialize_with = "u32_flexible")]
	pub exchange: u32,
	#[serde(rename = "accountRS", default)]
	pub account_rs: String,
	#[serde(rename = "quantityQNT", deserialize_with = "i64_flexible")]
	pub quantity: i64,
	#[serde(rename = "bidNQT", deserialize_with = "i64_flexible")]
	pub bid: i64,
	#[serde(rename = "askNQT", deserialize_with = "i64_flexible")]
	pub ask: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CoinExchangeOrdersResponse {
	#[serde(default)]
	pub orders: Vec<CoinExchangeOrder>,
}

/// Transaction bytes built by the node but not signed or broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsignedTransaction {
	#[serde(rename = "unsignedTransactionBytes")]
	pub bytes_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
	pub full_hash: String,
}

/// Parameters of a `sendMoney` request.
#[derive(Debug, Clone)]
pub struct PaymentParams<'a> {
	pub chain: &'a str,
	pub recipient_id: u64,
	pub amount: i64,
	/// 0 lets the node compute the fee from `fee_rate`.
	pub fee: i64,
	pub fee_rate: u64,
	pub public_key: [u8; 32],
}

/// Parameters of an `exchangeCoins` request.
#[derive(Debug, Clone)]
pub struct ExchangeParams<'a> {
	pub chain: &'a str,
	pub exchange_chain: &'a str,
	pub quantity: i64,
	pub price: i64,
	pub fee: i64,
	pub fee_rate: u64,
	pub public_key: [u8; 32],
}
