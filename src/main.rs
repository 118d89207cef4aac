use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use itertools::Itertools;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use nxt2_state_sync::config::{ConfigError, WalletConfig};
use nxt2_state_sync::node::{BlockchainStatus, NodeClient, NodeError};
use nxt2_state_sync::transaction::NodeConstants;
use nxt2_state_sync::utils::format_amount;
use nxt2_state_sync::wallet::sync::{SessionController, ViewObserver, channel};
use nxt2_state_sync::wallet::{
	Notification, Session, WalletSyncError, WalletView, generate_secret_phrase,
};

/// Give up connecting to the node after this long.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(120);
/// How often the main task checks that the event loop is still running.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
enum AppError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Node(#[from] NodeError),

	#[error(transparent)]
	Sync(#[from] WalletSyncError),

	#[error("View consumer failed: {0}")]
	Consumer(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let argument = std::env::args().nth(1);
	if argument.as_deref() == Some("--generate-phrase") {
		println!("{}", generate_secret_phrase());
		return;
	}

	if let Err(e) = run(argument.map(PathBuf::from)).await {
		error!("{}", e);
		std::process::exit(1);
	}
}

async fn run(config_path: Option<PathBuf>) -> Result<(), AppError> {
	let config = WalletConfig::load(config_path.as_deref())?;
	let client = NodeClient::new(&config.node)?;
	info!("Using node API at {}", client.api_url());

	let (constants, status) = bootstrap(&client).await?;
	info!(
		"Connected to {} {} at height {}",
		status.application,
		status.version,
		status.height()
	);
	info!(
		"Chains: {}",
		constants.chains().map(|chain| &chain.name).join(", ")
	);
	let constants = Arc::new(constants);

	let account = config.accounts.first().ok_or(ConfigError::NoAccount)?;
	let session = Arc::new(Session::from_config(account, constants.clone())?);
	if session.can_sign() {
		info!("Account {} can sign transactions", session.account());
	}

	let (updates, mut consumer) = channel(
		config.update_queue_capacity,
		WalletView::new(constants.clone()),
	);
	consumer.register_observer(Box::new(ConsoleObserver));
	let consumer_task = tokio::spawn(consumer.run());

	let mut controller = SessionController::new(client, updates, config.event_wait_timeout_secs);
	controller.switch_account(session).await?;

	let mut health_check = tokio::time::interval(HEALTH_CHECK_INTERVAL);
	loop {
		tokio::select! {
			result = tokio::signal::ctrl_c() => {
				if let Err(e) = result {
					warn!("Unable to listen for Ctrl-C: {}", e);
				}
				info!("Shutting down");
				break;
			}
			_ = health_check.tick() => {
				if !controller.is_running() {
					warn!("Event loop is no longer running");
					break;
				}
			}
		}
	}

	let outcome = controller.stop().await;
	drop(controller);
	let view = consumer_task.await?;
	for ledger in view.ledgers() {
		if let (Some(chain), Some(balance)) = (
			view.constants().chain(ledger.chain_id()),
			view.balance(ledger.chain_id()),
		) {
			info!(
				"{}: {} transactions, balance {}",
				chain.name,
				ledger.len(),
				display_amount(balance.unconfirmed, chain.decimals)
			);
		}
	}

	if let Some(stats) = outcome? {
		info!("Session summary: {}", stats.summary());
	}
	Ok(())
}

/// Read the protocol tables and chain status, retrying while the node is unreachable.
async fn bootstrap(client: &NodeClient) -> Result<(NodeConstants, BlockchainStatus), NodeError> {
	let policy = ExponentialBackoffBuilder::new()
		.with_max_elapsed_time(Some(BOOTSTRAP_TIMEOUT))
		.build();
	backoff::future::retry(policy, || async {
		let constants = client.get_constants().await.map_err(retry_transport)?;
		let status = client
			.get_blockchain_status()
			.await
			.map_err(retry_transport)?;
		Ok::<_, backoff::Error<NodeError>>((constants, status))
	})
	.await
}

fn retry_transport(error: NodeError) -> backoff::Error<NodeError> {
	match error {
		NodeError::Transport(_) => {
			warn!("Node not available: {}", error);
			backoff::Error::transient(error)
		}
		NodeError::Application(_) => backoff::Error::permanent(error),
	}
}

/// Formatted amount, or the raw minor units when the chain's decimals cannot be shown.
fn display_amount(amount: i64, decimals: u32) -> String {
	format_amount(amount, decimals).unwrap_or_else(|_| amount.to_string())
}

/// Logs every change to the view.
struct ConsoleObserver;

#[async_trait]
impl ViewObserver for ConsoleObserver {
	async fn notify(
		&mut self,
		notification: &Notification,
		view: &WalletView,
	) -> Result<(), WalletSyncError> {
		let constants = view.constants();
		match notification {
			Notification::AccountLoaded {
				account,
				name,
				transactions,
			} => {
				let name = if name.is_empty() {
					"(no name)"
				} else {
					name.as_str()
				};
				info!("Account {} {}: {} transactions", account, name, transactions);
			}
			Notification::TipChanged { tip } => info!("Chain height {}", tip),
			Notification::TransactionInserted { transaction, .. } => {
				let decimals = constants
					.chain(transaction.chain_id())
					.map_or(0, |chain| chain.decimals);
				info!(
					"{} transaction {} at {}: amount {}, fee {} [{}]",
					transaction.type_label(),
					transaction.id(),
					transaction.timestamp().format("%Y-%m-%d %H:%M:%S"),
					display_amount(transaction.amount(), decimals),
					display_amount(transaction.fee(), decimals),
					transaction.confirmation_state(view.tip())
				);
			}
			Notification::TransactionConfirmed { id, height, .. } => {
				info!("Transaction {} included at height {}", id, height)
			}
			Notification::TransactionRemoved { full_hash, .. } => {
				info!("Unconfirmed transaction {} removed", hex::encode(full_hash))
			}
			Notification::TransactionsRetracted {
				block_id, count, ..
			} => warn!(
				"Block {} popped, {} transactions unconfirmed",
				block_id, count
			),
			Notification::ConfirmationBand { chain_id, tip } => {
				info!("Recent transactions on chain {} confirmed at height {}", chain_id, tip)
			}
			Notification::BalancesChanged { balances } => {
				let summary = balances
					.iter()
					.filter_map(|(chain_id, balance)| {
						constants.chain(*chain_id).map(|chain| {
							format!(
								"{} {}",
								display_amount(balance.unconfirmed, chain.decimals),
								chain.name
							)
						})
					})
					.join(", ");
				info!("Balances: {}", summary);
			}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"console"
	}
}
