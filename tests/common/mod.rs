//! In-process node serving the `/nxt` API for integration tests.
//!
//! Requests are answered from mutable canned state. Every request is logged with its form
//! parameters so tests can check what the client sent. `eventWait` hands out queued batches and
//! otherwise holds the request until a batch arrives, the subscription is removed or the
//! requested timeout elapses.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use nxt2_state_sync::config::NodeConfig;
use nxt2_state_sync::node::NodeClient;
use nxt2_state_sync::transaction::NodeConstants;
use nxt2_state_sync::transaction::codec::compute_full_hash;

pub const EVENT_TOKEN: u64 = 4242;
pub const EPOCH_MILLIS: i64 = 1_514_296_800_000;
pub const IGNIS_RATE: u64 = 250_000;

pub type Params = Vec<(String, String)>;

#[derive(Clone)]
enum Reply {
	Json(Value),
	Raw(StatusCode, String),
}

#[derive(Default)]
struct Accounts {
	name: Option<String>,
	height: u32,
	balances: HashMap<String, (i64, i64)>,
	confirmed: HashMap<String, Vec<Value>>,
	unconfirmed: HashMap<String, Vec<Value>>,
	/// `getTransaction` answers, by full hash.
	transactions: HashMap<String, Value>,
}

#[derive(Default)]
struct MockState {
	requests: Mutex<Vec<Params>>,
	overrides: Mutex<HashMap<String, Reply>>,
	accounts: Mutex<Accounts>,
	events: Mutex<VecDeque<Value>>,
	arrived: Notify,
	released: Notify,
}

impl MockState {
	fn accounts(&self) -> MutexGuard<'_, Accounts> {
		self.accounts.lock().unwrap()
	}
}

pub struct MockNode {
	state: Arc<MockState>,
	addr: SocketAddr,
	server: JoinHandle<()>,
}

impl Drop for MockNode {
	fn drop(&mut self) {
		self.server.abort();
	}
}

impl MockNode {
	pub async fn start() -> Self {
		let state = Arc::new(MockState::default());
		state.accounts().height = 100;

		let app = Router::new()
			.route("/nxt", post(api))
			.with_state(state.clone());
		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let server = tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});
		Self {
			state,
			addr,
			server,
		}
	}

	pub fn config(&self) -> NodeConfig {
		NodeConfig {
			host: self.addr.ip().to_string(),
			api_port: self.addr.port(),
			use_ssl: false,
			read_timeout_secs: 10,
			..NodeConfig::default()
		}
	}

	pub fn client(&self) -> NodeClient {
		NodeClient::new(&self.config()).unwrap()
	}

	pub fn constants(&self) -> NodeConstants {
		NodeConstants::from_json(&constants_json()).unwrap()
	}

	pub fn set_height(&self, height: u32) {
		self.state.accounts().height = height;
	}

	pub fn set_account_name(&self, name: &str) {
		self.state.accounts().name = Some(name.to_string());
	}

	pub fn set_balance(&self, chain: &str, confirmed: i64, unconfirmed: i64) {
		self.state
			.accounts()
			.balances
			.insert(chain.to_string(), (confirmed, unconfirmed));
	}

	/// Add to the confirmed history, which is served newest first in insertion order.
	pub fn add_confirmed(&self, chain: &str, transaction: Value) {
		self.put_transaction(transaction.clone());
		self.state
			.accounts()
			.confirmed
			.entry(chain.to_string())
			.or_default()
			.push(transaction);
	}

	pub fn add_unconfirmed(&self, chain: &str, transaction: Value) {
		self.put_transaction(transaction.clone());
		self.state
			.accounts()
			.unconfirmed
			.entry(chain.to_string())
			.or_default()
			.push(transaction);
	}

	/// Set what `getTransaction` returns for the transaction's full hash.
	pub fn put_transaction(&self, transaction: Value) {
		let full_hash = transaction["fullHash"].as_str().unwrap().to_string();
		self.state
			.accounts()
			.transactions
			.insert(full_hash, transaction);
	}

	/// Queue one `eventWait` answer.
	pub fn push_events(&self, events: Vec<(String, Vec<String>)>) {
		let events: Vec<Value> = events
			.into_iter()
			.map(|(name, ids)| json!({"name": name, "ids": ids}))
			.collect();
		self.state
			.events
			.lock()
			.unwrap()
			.push_back(json!({"events": events}));
		self.state.arrived.notify_one();
	}

	/// Answer every `request_type` request with `value`.
	pub fn set_json(&self, request_type: &str, value: Value) {
		self.state
			.overrides
			.lock()
			.unwrap()
			.insert(request_type.to_string(), Reply::Json(value));
	}

	/// Answer every `request_type` request with a raw body.
	pub fn set_reply(&self, request_type: &str, status: StatusCode, body: &str) {
		self.state.overrides.lock().unwrap().insert(
			request_type.to_string(),
			Reply::Raw(status, body.to_string()),
		);
	}

	/// Go back to the canned answer for `request_type`.
	pub fn clear_reply(&self, request_type: &str) {
		self.state.overrides.lock().unwrap().remove(request_type);
	}

	/// Logged requests of one type, oldest first.
	pub fn requests(&self, request_type: &str) -> Vec<Params> {
		self.state
			.requests
			.lock()
			.unwrap()
			.iter()
			.filter(|params| param(params, "requestType") == Some(request_type))
			.cloned()
			.collect()
	}

	pub fn count(&self, request_type: &str) -> usize {
		self.requests(request_type).len()
	}

	/// Wait until at least `count` requests of `request_type` have arrived.
	pub async fn wait_for(&self, request_type: &str, count: usize) {
		let reached = tokio::time::timeout(Duration::from_secs(10), async {
			while self.count(request_type) < count {
				tokio::time::sleep(Duration::from_millis(20)).await;
			}
		})
		.await;
		assert!(
			reached.is_ok(),
			"expected {} {} requests, got {}",
			count,
			request_type,
			self.count(request_type)
		);
	}
}

pub fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
	params
		.iter()
		.find(|(name, _)| name == key)
		.map(|(_, value)| value.as_str())
}

pub fn params_named<'a>(params: &'a Params, key: &str) -> Vec<&'a str> {
	params
		.iter()
		.filter(|(name, _)| name == key)
		.map(|(_, value)| value.as_str())
		.collect()
}

pub fn constants_json() -> Value {
	json!({
		"epochBeginning": EPOCH_MILLIS,
		"chainProperties": {
			"1": {"name": "ARDR", "id": 1, "decimals": 8},
			"2": {"name": "IGNIS", "id": 2, "decimals": 8}
		},
		"transactionTypes": {
			"0": {"subtypes": {"0": {"name": "OrdinaryPayment"}}},
			"11": {"subtypes": {"0": {"name": "ExchangeOrderIssue"}}},
			"-4": {"subtypes": {"0": {"name": "FxtExchangeOrderIssue"}}}
		}
	})
}

pub fn full_hash_hex(seed: u8) -> String {
	hex::encode([seed; 32])
}

/// Payment JSON whose full hash is `[seed; 32]`; `block` is `(block id, height)` when confirmed.
pub fn transaction_json(
	chain_id: u32,
	seed: u8,
	sender: u64,
	recipient: u64,
	block: Option<(u64, u32)>,
) -> Value {
	let mut transaction = json!({
		"fullHash": full_hash_hex(seed),
		"version": 1,
		"chain": chain_id,
		"type": 0,
		"subtype": 0,
		"timestamp": 1_000 + seed as u32,
		"sender": sender.to_string(),
		"recipient": recipient.to_string(),
		"amountNQT": "100000000",
		"feeNQT": "1000000"
	});
	if let Some((block_id, height)) = block {
		transaction["block"] = json!(block_id.to_string());
		transaction["height"] = json!(height);
	}
	transaction
}

fn error(code: i64, description: &str) -> Value {
	json!({"errorCode": code, "errorDescription": description})
}

async fn api(State(state): State<Arc<MockState>>, Form(params): Form<Params>) -> Response {
	let request_type = param(&params, "requestType").unwrap_or_default().to_string();
	state.requests.lock().unwrap().push(params.clone());

	let canned = state.overrides.lock().unwrap().get(&request_type).cloned();
	match canned {
		Some(Reply::Json(value)) => return Json(value).into_response(),
		Some(Reply::Raw(status, body)) => return (status, body).into_response(),
		None => {}
	}

	let body = match request_type.as_str() {
		"getConstants" => constants_json(),
		"getBlockchainStatus" => json!({
			"application": "Ardor",
			"version": "2.5.0",
			"numberOfBlocks": state.accounts().height + 1
		}),
		"getAccount" => match &state.accounts().name {
			Some(name) => json!({"name": name, "accountRS": param(&params, "account")}),
			None => error(5, "Unknown account"),
		},
		"getBalance" => {
			let chain = param(&params, "chain").unwrap_or_default();
			let (confirmed, unconfirmed) = state
				.accounts()
				.balances
				.get(chain)
				.copied()
				.unwrap_or_default();
			json!({
				"balanceNQT": confirmed.to_string(),
				"unconfirmedBalanceNQT": unconfirmed.to_string()
			})
		}
		"getBlockchainTransactions" => {
			let chain = param(&params, "chain").unwrap_or_default();
			let first: usize = param(&params, "firstIndex").unwrap().parse().unwrap();
			let last: usize = param(&params, "lastIndex").unwrap().parse().unwrap();
			let all = state
				.accounts()
				.confirmed
				.get(chain)
				.cloned()
				.unwrap_or_default();
			let page: Vec<Value> = all.into_iter().skip(first).take(last + 1 - first).collect();
			json!({"transactions": page})
		}
		"getUnconfirmedTransactions" => {
			let chain = param(&params, "chain").unwrap_or_default();
			let pool = state
				.accounts()
				.unconfirmed
				.get(chain)
				.cloned()
				.unwrap_or_default();
			json!({"unconfirmedTransactions": pool})
		}
		"getTransaction" => {
			let full_hash = param(&params, "fullHash").unwrap_or_default();
			state
				.accounts()
				.transactions
				.get(full_hash)
				.cloned()
				.unwrap_or_else(|| error(5, "Unknown transaction"))
		}
		"getBundlerRates" => json!({
			"rates": [{"chain": 2, "minRateNQTPerFXT": IGNIS_RATE.to_string()}]
		}),
		"broadcastTransaction" => {
			let bytes = hex::decode(param(&params, "transactionBytes").unwrap_or_default());
			match bytes.ok().map(|bytes| compute_full_hash(&bytes)) {
				Some(Ok(full_hash)) => json!({"fullHash": hex::encode(full_hash)}),
				_ => error(4, "Incorrect transactionBytes"),
			}
		}
		"eventRegister" => {
			if param(&params, "remove") == Some("true") {
				state.released.notify_one();
			}
			json!({"token": EVENT_TOKEN.to_string(), "registered": true})
		}
		"eventWait" => {
			let timeout: u64 = param(&params, "timeout")
				.and_then(|value| value.parse().ok())
				.unwrap_or(0);
			event_wait(&state, Duration::from_secs(timeout)).await
		}
		_ => error(1, "Incorrect request"),
	};
	Json(body).into_response()
}

async fn event_wait(state: &MockState, timeout: Duration) -> Value {
	let deadline = tokio::time::Instant::now() + timeout;
	loop {
		let queued = state.events.lock().unwrap().pop_front();
		if let Some(batch) = queued {
			return batch;
		}
		tokio::select! {
			_ = state.arrived.notified() => continue,
			_ = state.released.notified() => break,
			_ = tokio::time::sleep_until(deadline) => break,
		}
	}
	json!({"events": []})
}
