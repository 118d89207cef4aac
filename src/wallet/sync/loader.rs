//! Initial account load.
//!
//! Reads everything the view needs before the event loop starts: the account name, the chain tip
//! and, for every chain, the confirmed history, the unconfirmed pool and the balance.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

use super::transaction_processor::TransactionProcessor;
use crate::node::{NodeClient, NodeError, TRANSACTION_PAGE_SIZE, error_codes};
use crate::transaction::{Chain, Transaction};
use crate::wallet::view::{AccountSnapshot, ChainSnapshot};
use crate::wallet::{Session, WalletSyncError};

pub struct AccountLoader {
	client: NodeClient,
}

impl AccountLoader {
	pub fn new(client: NodeClient) -> Self {
		Self { client }
	}

	/// Read the account's current state from the node.
	pub async fn load(&self, session: Arc<Session>) -> Result<AccountSnapshot, WalletSyncError> {
		let account_id = session.account_id();
		let name = match self.client.get_account(account_id).await {
			Ok(account) => account.name,
			// The node has not seen the account yet.
			Err(NodeError::Application(e)) if e.code == error_codes::UNKNOWN_OBJECT => {
				debug!("Account {} is not known to the node", session.account());
				String::new()
			}
			Err(e) => return Err(e.into()),
		};
		let tip = self.client.get_blockchain_status().await?.height();

		let processor = TransactionProcessor::new(session.constants().clone());
		let chains = try_join_all(
			session
				.constants()
				.chains()
				.map(|chain| self.load_chain(account_id, chain, &processor)),
		)
		.await?;

		info!(
			"Account {} loaded at height {}: {} transactions",
			session.account(),
			tip,
			chains
				.iter()
				.map(|chain| chain.confirmed.len() + chain.unconfirmed.len())
				.sum::<usize>()
		);
		Ok(AccountSnapshot {
			session,
			name,
			tip,
			chains,
		})
	}

	async fn load_chain(
		&self,
		account_id: u64,
		chain: &Chain,
		processor: &TransactionProcessor,
	) -> Result<ChainSnapshot, WalletSyncError> {
		let confirmed = self.load_confirmed(account_id, chain, processor).await?;
		let unconfirmed = self
			.client
			.get_unconfirmed_transactions(account_id, chain)
			.await?;
		let balance = self.client.get_balance(account_id, chain).await?;
		Ok(ChainSnapshot {
			chain_id: chain.id,
			confirmed,
			unconfirmed: processor.process_transactions_batch(&unconfirmed),
			balance,
		})
	}

	/// Page through the confirmed history until a short page.
	async fn load_confirmed(
		&self,
		account_id: u64,
		chain: &Chain,
		processor: &TransactionProcessor,
	) -> Result<Vec<Transaction>, WalletSyncError> {
		let mut transactions = Vec::new();
		let mut first_index = 0;
		loop {
			let page = self
				.client
				.get_blockchain_transactions(
					account_id,
					chain,
					first_index,
					first_index + TRANSACTION_PAGE_SIZE - 1,
				)
				.await?;
			transactions.extend(processor.process_transactions_batch(&page));
			if page.len() < TRANSACTION_PAGE_SIZE {
				break;
			}
			first_index += TRANSACTION_PAGE_SIZE;
		}
		debug!(
			"Loaded {} confirmed transactions for {}",
			transactions.len(),
			chain.name
		);
		Ok(transactions)
	}
}
