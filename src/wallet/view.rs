//! Read model of the active account.
//!
//! A `WalletView` is owned by the view consumer task and only changes through
//! [`WalletView::apply`]. Every applied update reports what changed as [`Notification`]s.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::node::Balance;
use crate::transaction::{CodecError, NodeConstants, Transaction};
use crate::wallet::{AccountAddress, AccountLedger, LedgerChange, Session, WalletSyncError};

/// Initial state of one chain, read before the event loop starts.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
	pub chain_id: u32,
	pub confirmed: Vec<Transaction>,
	pub unconfirmed: Vec<Transaction>,
	pub balance: Balance,
}

/// Initial state of an account.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
	pub session: Arc<Session>,
	/// Account name, empty for accounts the node does not know yet.
	pub name: String,
	pub tip: u32,
	pub chains: Vec<ChainSnapshot>,
}

/// A unit of work handed from the sync worker to the view.
#[derive(Debug, Clone)]
pub enum ViewUpdate {
	/// Replace the view with a freshly loaded account.
	Loaded(AccountSnapshot),
	BlockPushed { tip: u32 },
	BlockPopped { block_id: u64 },
	TransactionAdded(Transaction),
	UnconfirmedRemoved { chain_id: u32, full_hash: [u8; 32] },
	Balances(Vec<(u32, Balance)>),
}

/// What changed in the view.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
	AccountLoaded {
		account: AccountAddress,
		name: String,
		transactions: usize,
	},
	TipChanged { tip: u32 },
	TransactionInserted { position: usize, transaction: Transaction },
	TransactionConfirmed {
		chain_id: u32,
		id: u64,
		block_id: u64,
		height: u32,
	},
	TransactionRemoved { chain_id: u32, full_hash: [u8; 32] },
	TransactionsRetracted {
		chain_id: u32,
		block_id: u64,
		count: usize,
	},
	/// Transactions in the visible window of a chain changed confirmation state.
	ConfirmationBand { chain_id: u32, tip: u32 },
	BalancesChanged { balances: Vec<(u32, Balance)> },
}

pub struct WalletView {
	constants: Arc<NodeConstants>,
	session: Option<Arc<Session>>,
	name: String,
	tip: u32,
	ledgers: BTreeMap<u32, AccountLedger>,
	balances: BTreeMap<u32, Balance>,
}

impl WalletView {
	/// Empty view with one ledger per known chain.
	pub fn new(constants: Arc<NodeConstants>) -> Self {
		let ledgers = constants
			.chains()
			.map(|chain| (chain.id, AccountLedger::new(chain.id)))
			.collect();
		Self {
			constants,
			session: None,
			name: String::new(),
			tip: 0,
			ledgers,
			balances: BTreeMap::new(),
		}
	}

	/// Apply one update and report what changed.
	pub fn apply(&mut self, update: ViewUpdate) -> Result<Vec<Notification>, WalletSyncError> {
		let notifications = match update {
			ViewUpdate::Loaded(snapshot) => vec![self.load(snapshot)],
			ViewUpdate::BlockPushed { tip } => self.block_pushed(tip),
			ViewUpdate::BlockPopped { block_id } => self.block_popped(block_id),
			ViewUpdate::TransactionAdded(tx) => self.transaction_added(tx)?.into_iter().collect(),
			ViewUpdate::UnconfirmedRemoved {
				chain_id,
				full_hash,
			} => {
				if self.ledger_mut(chain_id)?.remove_unconfirmed(&full_hash) {
					vec![Notification::TransactionRemoved {
						chain_id,
						full_hash,
					}]
				} else {
					Vec::new()
				}
			}
			ViewUpdate::Balances(balances) => self.set_balances(balances),
		};
		Ok(notifications)
	}

	fn load(&mut self, snapshot: AccountSnapshot) -> Notification {
		*self = Self::new(snapshot.session.constants().clone());
		self.tip = snapshot.tip;
		for ledger in self.ledgers.values_mut() {
			ledger.load(Vec::new(), Vec::new(), snapshot.tip);
		}

		let mut transactions = 0;
		for chain in snapshot.chains {
			self.balances.insert(chain.chain_id, chain.balance);
			match self.ledgers.get_mut(&chain.chain_id) {
				Some(ledger) => {
					ledger.load(chain.confirmed, chain.unconfirmed, snapshot.tip);
					transactions += ledger.len();
				}
				None => debug!("Snapshot for unknown chain {} ignored", chain.chain_id),
			}
		}

		let account = snapshot.session.account();
		info!(
			"Loaded account {} with {} transactions at height {}",
			account, transactions, snapshot.tip
		);
		self.name = snapshot.name.clone();
		self.session = Some(snapshot.session);
		Notification::AccountLoaded {
			account,
			name: snapshot.name,
			transactions,
		}
	}

	fn block_pushed(&mut self, tip: u32) -> Vec<Notification> {
		if tip == self.tip {
			return Vec::new();
		}
		self.tip = tip;
		let mut notifications = vec![Notification::TipChanged { tip }];
		for ledger in self.ledgers.values_mut() {
			if ledger.refresh_confirmation_band(tip) {
				notifications.push(Notification::ConfirmationBand {
					chain_id: ledger.chain_id(),
					tip,
				});
			}
		}
		notifications
	}

	/// Demote everything recorded in a popped block, on every chain.
	fn block_popped(&mut self, block_id: u64) -> Vec<Notification> {
		self.ledgers
			.values_mut()
			.filter_map(|ledger| {
				let count = ledger.mark_retracted(block_id);
				(count > 0).then(|| Notification::TransactionsRetracted {
					chain_id: ledger.chain_id(),
					block_id,
					count,
				})
			})
			.collect()
	}

	fn transaction_added(
		&mut self,
		tx: Transaction,
	) -> Result<Option<Notification>, WalletSyncError> {
		let chain_id = tx.chain_id();
		let id = tx.id();
		let ledger = self.ledger_mut(chain_id)?;
		let notification = match ledger.add_or_update(tx) {
			Some(LedgerChange::Inserted { position }) => {
				ledger
					.get(id)
					.cloned()
					.map(|transaction| Notification::TransactionInserted {
						position,
						transaction,
					})
			}
			Some(LedgerChange::Confirmed { block_id, height }) => {
				Some(Notification::TransactionConfirmed {
					chain_id,
					id,
					block_id,
					height,
				})
			}
			None => None,
		};
		Ok(notification)
	}

	fn set_balances(&mut self, balances: Vec<(u32, Balance)>) -> Vec<Notification> {
		let mut changed = false;
		for (chain_id, balance) in &balances {
			if self.balances.insert(*chain_id, *balance) != Some(*balance) {
				changed = true;
			}
		}
		if changed {
			vec![Notification::BalancesChanged { balances }]
		} else {
			Vec::new()
		}
	}

	fn ledger_mut(&mut self, chain_id: u32) -> Result<&mut AccountLedger, WalletSyncError> {
		self.ledgers
			.get_mut(&chain_id)
			.ok_or(CodecError::UnknownChain(chain_id as i64).into())
	}

	pub fn session(&self) -> Option<&Arc<Session>> {
		self.session.as_ref()
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn tip(&self) -> u32 {
		self.tip
	}

	pub fn constants(&self) -> &NodeConstants {
		&self.constants
	}

	pub fn ledger(&self, chain_id: u32) -> Option<&AccountLedger> {
		self.ledgers.get(&chain_id)
	}

	pub fn ledgers(&self) -> impl Iterator<Item = &AccountLedger> {
		self.ledgers.values()
	}

	pub fn balance(&self, chain_id: u32) -> Option<Balance> {
		self.balances.get(&chain_id).copied()
	}
}
