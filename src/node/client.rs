//! HTTP client for the node API.
//!
//! Every request is a form-encoded POST of `requestType=<name>&<params>` to the `/nxt` endpoint.
//! Responses are JSON objects; an `errorCode` field turns the response into an
//! [`ApplicationError`], anything that is not a well-formed object is a [`TransportError`].

use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::*;
use crate::config::NodeConfig;
use crate::transaction::chain::{Chain, NodeConstants};

/// Extra read time granted to `eventWait` beyond the server-side hold time.
pub const EVENT_WAIT_MARGIN: Duration = Duration::from_secs(5);
/// Transactions requested per `getBlockchainTransactions` page.
pub const TRANSACTION_PAGE_SIZE: usize = 50;
/// Deadline in minutes for transactions the node builds on our behalf.
const TRANSACTION_DEADLINE: &str = "30";

/// Client for a single trusted node.
#[derive(Clone)]
pub struct NodeClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Full URL of the API endpoint.
	api_url: String,
	/// Read timeout for ordinary requests.
	read_timeout: Duration,
}

impl NodeClient {
	/// Create a new node client.
	///
	/// # Arguments
	/// * `config` - Host, port, TLS and timeout settings.
	///
	/// # Returns
	/// A new `NodeClient`, or a `NodeError` if the HTTP client cannot be built.
	pub fn new(config: &NodeConfig) -> Result<Self, NodeError> {
		let mut headers = HeaderMap::new();
		headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));

		if config.accept_any_certificate || config.allow_name_mismatch {
			warn!(
				"TLS verification relaxed for {} (any certificate: {}, name mismatch: {})",
				config.host, config.accept_any_certificate, config.allow_name_mismatch
			);
		}

		let http_client = Client::builder()
			.connect_timeout(config.connect_timeout())
			.default_headers(headers)
			.gzip(true)
			.danger_accept_invalid_certs(config.accept_any_certificate)
			.danger_accept_invalid_hostnames(config.allow_name_mismatch)
			.build()?;

		Ok(Self {
			http_client,
			api_url: config.api_url(),
			read_timeout: config.read_timeout(),
		})
	}

	pub fn api_url(&self) -> &str {
		&self.api_url
	}

	/// Issue a request and return the decoded JSON object.
	///
	/// # Arguments
	/// * `request_type` - The API request name.
	/// * `params` - Form parameters; keys may repeat.
	/// * `read_timeout` - Time allowed for the whole request.
	///
	/// # Errors
	/// `TransportError` for connection failures, non-200 responses and malformed bodies;
	/// `ApplicationError` when the response carries an `errorCode`.
	pub async fn issue_request(
		&self,
		request_type: &str,
		params: &[(&str, String)],
		read_timeout: Duration,
	) -> Result<Value, NodeError> {
		let mut form: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
		form.push(("requestType", request_type));
		form.extend(params.iter().map(|(key, value)| (*key, value.as_str())));

		debug!("Issuing {} request", request_type);
		let response = self
			.http_client
			.post(&self.api_url)
			.timeout(read_timeout)
			.form(&form)
			.send()
			.await?;

		let status = response.status();
		if status != StatusCode::OK {
			return Err(TransportError::StatusError {
				status: status.as_u16(),
				request_type: request_type.to_string(),
			}
			.into());
		}

		let body = response.bytes().await?;
		let value: Value = serde_json::from_slice(&body).map_err(|e| TransportError::JsonError {
			request_type: request_type.to_string(),
			message: e.to_string(),
		})?;
		if !value.is_object() {
			return Err(TransportError::NotAnObject(request_type.to_string()).into());
		}

		if let Some(code) = value.get("errorCode") {
			let code = code
				.as_i64()
				.or_else(|| code.as_str().and_then(|s| s.parse().ok()))
				.unwrap_or(-1);
			let description = value
				.get("errorDescription")
				.and_then(Value::as_str)
				.unwrap_or("")
				.to_string();
			debug!(
				"{} request failed with error {}: {}",
				request_type, code, description
			);
			return Err(ApplicationError {
				request_type: request_type.to_string(),
				code,
				description,
			}
			.into());
		}

		Ok(value)
	}

	async fn request<T: DeserializeOwned>(
		&self,
		request_type: &str,
		params: &[(&str, String)],
	) -> Result<T, NodeError> {
		let value = self
			.issue_request(request_type, params, self.read_timeout)
			.await?;
		decode(request_type, value)
	}

	/// Create, extend or shrink an event subscription.
	///
	/// # Arguments
	/// * `events` - Event names, already parameterized where needed.
	/// * `token` - 0 to create a subscription, otherwise the token of an existing one.
	/// * `mode` - What to do with the listed events.
	pub async fn event_register(
		&self,
		events: &[String],
		token: u64,
		mode: RegisterMode,
	) -> Result<EventRegistration, NodeError> {
		let mut params: Vec<(&str, String)> = events
			.iter()
			.map(|event| ("event", event.clone()))
			.collect();
		if token != 0 {
			params.push(("token", token.to_string()));
		}
		match mode {
			RegisterMode::Create => {}
			RegisterMode::Add => params.push(("add", "true".to_string())),
			RegisterMode::Remove => params.push(("remove", "true".to_string())),
		}
		self.request("eventRegister", &params).await
	}

	/// Long-poll for events.
	///
	/// The node holds the request for up to `timeout_secs` and returns an empty list when
	/// nothing happened. The read timeout is `timeout_secs` plus [`EVENT_WAIT_MARGIN`].
	pub async fn event_wait(
		&self,
		token: u64,
		timeout_secs: u32,
	) -> Result<Vec<ServerEvent>, NodeError> {
		let params = [
			("token", token.to_string()),
			("timeout", timeout_secs.to_string()),
		];
		let read_timeout = Duration::from_secs(timeout_secs as u64) + EVENT_WAIT_MARGIN;
		let value = self
			.issue_request("eventWait", &params, read_timeout)
			.await?;
		let response: EventWaitResponse = decode("eventWait", value)?;
		Ok(response.events)
	}

	pub async fn get_blockchain_status(&self) -> Result<BlockchainStatus, NodeError> {
		self.request("getBlockchainStatus", &[]).await
	}

	/// Fetch the chain table, transaction type table and ledger epoch.
	pub async fn get_constants(&self) -> Result<NodeConstants, NodeError> {
		let value = self
			.issue_request("getConstants", &[], self.read_timeout)
			.await?;
		NodeConstants::from_json(&value).map_err(|e| {
			TransportError::UnexpectedResponse {
				request_type: "getConstants".to_string(),
				message: e.to_string(),
			}
			.into()
		})
	}

	pub async fn get_account(&self, account_id: u64) -> Result<AccountInfo, NodeError> {
		self.request("getAccount", &[("account", account_id.to_string())])
			.await
	}

	pub async fn get_balance(&self, account_id: u64, chain: &Chain) -> Result<Balance, NodeError> {
		self.request(
			"getBalance",
			&[
				("account", account_id.to_string()),
				("chain", chain.name.clone()),
			],
		)
		.await
	}

	/// One page of confirmed transactions, newest first. Indices are inclusive.
	pub async fn get_blockchain_transactions(
		&self,
		account_id: u64,
		chain: &Chain,
		first_index: usize,
		last_index: usize,
	) -> Result<Vec<Value>, NodeError> {
		let value = self
			.issue_request(
				"getBlockchainTransactions",
				&[
					("account", account_id.to_string()),
					("chain", chain.name.clone()),
					("firstIndex", first_index.to_string()),
					("lastIndex", last_index.to_string()),
				],
				self.read_timeout,
			)
			.await?;
		object_list("getBlockchainTransactions", value, "transactions")
	}

	pub async fn get_unconfirmed_transactions(
		&self,
		account_id: u64,
		chain: &Chain,
	) -> Result<Vec<Value>, NodeError> {
		let value = self
			.issue_request(
				"getUnconfirmedTransactions",
				&[
					("account", account_id.to_string()),
					("chain", chain.name.clone()),
				],
				self.read_timeout,
			)
			.await?;
		object_list("getUnconfirmedTransactions", value, "unconfirmedTransactions")
	}

	/// Fetch one transaction as JSON.
	pub async fn get_transaction(
		&self,
		full_hash: &[u8; 32],
		chain: &Chain,
	) -> Result<Value, NodeError> {
		self.issue_request(
			"getTransaction",
			&[
				("fullHash", hex::encode(full_hash)),
				("chain", chain.name.clone()),
			],
			self.read_timeout,
		)
		.await
	}

	pub async fn get_bundler_rates(&self) -> Result<Vec<BundlerRate>, NodeError> {
		let response: BundlerRatesResponse = self.request("getBundlerRates", &[]).await?;
		Ok(response.rates)
	}

	/// Open orders that sell other chains' coins for `chain`.
	pub async fn get_coin_exchange_orders(
		&self,
		chain: &Chain,
	) -> Result<Vec<CoinExchangeOrder>, NodeError> {
		let response: CoinExchangeOrdersResponse = self
			.request("getCoinExchangeOrders", &[("exchange", chain.name.clone())])
			.await?;
		Ok(response.orders)
	}

	/// Ask the node to build an unsigned payment.
	pub async fn send_money(
		&self,
		payment: &PaymentParams<'_>,
	) -> Result<UnsignedTransaction, NodeError> {
		self.request(
			"sendMoney",
			&[
				("recipient", payment.recipient_id.to_string()),
				("chain", payment.chain.to_string()),
				("amountNQT", payment.amount.to_string()),
				("feeNQT", payment.fee.to_string()),
				("feeRateNQTPerFXT", payment.fee_rate.to_string()),
				("publicKey", hex::encode(payment.public_key)),
				("deadline", TRANSACTION_DEADLINE.to_string()),
				("broadcast", "false".to_string()),
			],
		)
		.await
	}

	/// Ask the node to build an unsigned coin exchange order.
	pub async fn exchange_coins(
		&self,
		order: &ExchangeParams<'_>,
	) -> Result<UnsignedTransaction, NodeError> {
		self.request(
			"exchangeCoins",
			&[
				("chain", order.chain.to_string()),
				("exchange", order.exchange_chain.to_string()),
				("amountNQT", order.quantity.to_string()),
				("priceNQT", order.price.to_string()),
				("feeNQT", order.fee.to_string()),
				("feeRateNQTPerFXT", order.fee_rate.to_string()),
				("publicKey", hex::encode(order.public_key)),
				("deadline", TRANSACTION_DEADLINE.to_string()),
				("broadcast", "false".to_string()),
			],
		)
		.await
	}

	/// Broadcast signed transaction bytes.
	pub async fn broadcast_transaction(&self, bytes: &[u8]) -> Result<BroadcastResult, NodeError> {
		self.request("broadcastTransaction", &[("transactionBytes", hex::encode(bytes))])
			.await
	}
}

fn decode<T: DeserializeOwned>(request_type: &str, value: Value) -> Result<T, NodeError> {
	serde_json::from_value(value).map_err(|e| {
		TransportError::UnexpectedResponse {
			request_type: request_type.to_string(),
			message: e.to_string(),
		}
		.into()
	})
}

fn object_list(request_type: &str, mut value: Value, field: &str) -> Result<Vec<Value>, NodeError> {
	match value.get_mut(field).map(Value::take) {
		Some(Value::Array(items)) => Ok(items),
		None | Some(Value::Null) => Ok(Vec::new()),
		Some(_) => Err(TransportError::UnexpectedResponse {
			request_type: request_type.to_string(),
			message: format!("'{}' is not a list", field),
		}
		.into()),
	}
}
