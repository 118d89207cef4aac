//! Per-chain transaction ledger.
//!
//! Holds the account's confirmed and unconfirmed transactions for one chain, newest first, and
//! tracks each transaction through the confirmation states as blocks are pushed and popped.
//! Entries are keyed by the derived transaction id; the ordered id list and the map always have
//! the same membership.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::transaction::codec::compute_id;
use crate::transaction::{CONFIRMATION_DEPTH, ConfirmationState, Transaction};

/// Number of newest entries rechecked on every new block.
pub const VISIBLE_WINDOW: usize = 10;

/// What an [`AccountLedger::add_or_update`] call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerChange {
	/// A new transaction was inserted at `position` (0 is newest).
	Inserted { position: usize },
	/// A stored transaction moved to a block.
	Confirmed { block_id: u64, height: u32 },
}

#[derive(Debug, Clone)]
pub struct AccountLedger {
	chain_id: u32,
	/// Transaction ids, newest timestamp first. Equal timestamps keep insertion order.
	order: Vec<u64>,
	by_id: HashMap<u64, Transaction>,
	/// Tip height at the last confirmation band scan.
	tip: u32,
}

impl AccountLedger {
	pub fn new(chain_id: u32) -> Self {
		Self {
			chain_id,
			order: Vec::new(),
			by_id: HashMap::new(),
			tip: 0,
		}
	}

	pub fn chain_id(&self) -> u32 {
		self.chain_id
	}

	/// Replace the contents with an initial snapshot.
	///
	/// # Arguments
	/// * `confirmed` - Transactions already in blocks.
	/// * `unconfirmed` - Transactions waiting in the node's pool.
	/// * `tip` - Current chain height.
	pub fn load(&mut self, confirmed: Vec<Transaction>, unconfirmed: Vec<Transaction>, tip: u32) {
		self.order.clear();
		self.by_id.clear();
		self.tip = tip;

		for tx in unconfirmed.into_iter().chain(confirmed) {
			if tx.chain_id() != self.chain_id {
				warn!(
					"Skipping transaction {} from chain {} while loading chain {}",
					tx.id(),
					tx.chain_id(),
					self.chain_id
				);
				continue;
			}
			let id = tx.id();
			match self.by_id.get_mut(&id) {
				// Listed both as unconfirmed and confirmed while the snapshot was taken.
				Some(existing) if existing.full_hash() == tx.full_hash() => {
					if tx.is_confirmed() {
						existing.set_confirmation(tx.block_id(), tx.height());
					}
				}
				Some(_) => warn!("Ignoring transaction {} with a conflicting full hash", id),
				None => {
					self.order.push(id);
					self.by_id.insert(id, tx);
				}
			}
		}

		let by_id = &self.by_id;
		// Stable sort keeps the insertion order for equal timestamps.
		self.order
			.sort_by_key(|id| std::cmp::Reverse(by_id.get(id).map(Transaction::timestamp)));
		debug!(
			"Loaded {} transactions for chain {}",
			self.order.len(),
			self.chain_id
		);
	}

	/// Insert a new transaction or record that a stored one has been included in a block.
	///
	/// A stored transaction is only updated when the incoming block id is non-zero and differs
	/// from the stored one; the stored instance is kept and only its block id and height change.
	/// Re-supplying an unchanged transaction changes nothing.
	pub fn add_or_update(&mut self, tx: Transaction) -> Option<LedgerChange> {
		let id = tx.id();
		if let Some(existing) = self.by_id.get_mut(&id) {
			if existing.full_hash() != tx.full_hash() {
				warn!(
					"Refusing transaction {} on chain {}: id already used by {}",
					tx.full_hash_hex(),
					self.chain_id,
					existing.full_hash_hex()
				);
				return None;
			}
			if tx.block_id() != 0 && tx.block_id() != existing.block_id() {
				existing.set_confirmation(tx.block_id(), tx.height());
				return Some(LedgerChange::Confirmed {
					block_id: tx.block_id(),
					height: tx.height(),
				});
			}
			return None;
		}

		let timestamp = tx.timestamp();
		let by_id = &self.by_id;
		let position = self.order.partition_point(|existing| {
			by_id
				.get(existing)
				.is_some_and(|stored| stored.timestamp() >= timestamp)
		});
		self.order.insert(position, id);
		self.by_id.insert(id, tx);
		Some(LedgerChange::Inserted { position })
	}

	/// Remove a transaction that is still unconfirmed.
	///
	/// Returns `false` and leaves the ledger unchanged when the transaction is unknown or has
	/// been confirmed since the removal was reported.
	pub fn remove_unconfirmed(&mut self, full_hash: &[u8; 32]) -> bool {
		let id = compute_id(full_hash);
		let removable = match self.by_id.get(&id) {
			Some(tx) if tx.full_hash() != full_hash => false,
			Some(tx) if tx.is_confirmed() => {
				debug!("Ignoring stale removal of confirmed transaction {}", id);
				false
			}
			Some(_) => true,
			None => false,
		};
		if removable {
			self.by_id.remove(&id);
			self.order.retain(|stored| *stored != id);
		}
		removable
	}

	/// Return every transaction recorded in `block_id` to the unconfirmed state.
	///
	/// Returns the number of transactions demoted.
	pub fn mark_retracted(&mut self, block_id: u64) -> usize {
		if block_id == 0 {
			return 0;
		}
		let mut count = 0;
		for tx in self.by_id.values_mut() {
			if tx.block_id() == block_id {
				tx.set_confirmation(0, 0);
				count += 1;
			}
		}
		if count > 0 {
			debug!(
				"Block {} retracted {} transactions on chain {}",
				block_id, count, self.chain_id
			);
		}
		count
	}

	/// Check whether a transaction in the visible window crossed the confirmation depth.
	///
	/// Only the newest [`VISIBLE_WINDOW`] entries are scanned. An entry crosses when it was less
	/// than [`CONFIRMATION_DEPTH`] blocks deep at the previous scan and is at least that deep at
	/// `tip`, so each crossing is reported once even when the tip skips heights.
	pub fn refresh_confirmation_band(&mut self, tip: u32) -> bool {
		let previous = std::mem::replace(&mut self.tip, tip);
		if tip <= previous {
			return false;
		}
		self.visible()
			.filter(|tx| tx.is_confirmed())
			.any(|tx| {
				previous.saturating_sub(tx.height()) < CONFIRMATION_DEPTH
					&& tip.saturating_sub(tx.height()) >= CONFIRMATION_DEPTH
			})
	}

	pub fn status(&self, tx: &Transaction) -> ConfirmationState {
		tx.confirmation_state(self.tip)
	}

	pub fn tip(&self) -> u32 {
		self.tip
	}

	pub fn get(&self, id: u64) -> Option<&Transaction> {
		self.by_id.get(&id)
	}

	/// Transactions newest first.
	pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
		self.order.iter().filter_map(|id| self.by_id.get(id))
	}

	/// The newest [`VISIBLE_WINDOW`] transactions.
	pub fn visible(&self) -> impl Iterator<Item = &Transaction> {
		self.iter().take(VISIBLE_WINDOW)
	}

	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn is_empty(&self) -> bool {
		self.order.is_empty()
	}

	/// The ordered list and the map hold the same ids and the list is newest first.
	pub fn is_consistent(&self) -> bool {
		if self.order.len() != self.by_id.len() {
			return false;
		}
		let mut previous = None;
		for id in &self.order {
			let Some(tx) = self.by_id.get(id) else {
				return false;
			};
			if previous.is_some_and(|timestamp| tx.timestamp() > timestamp) {
				return false;
			}
			previous = Some(tx.timestamp());
		}
		true
	}
}
