use crate::transaction::{CodecError, NodeConstants, Transaction};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns node transaction JSON into ledger transactions.
#[derive(Clone)]
pub struct TransactionProcessor {
	constants: Arc<NodeConstants>,
}

impl TransactionProcessor {
	pub fn new(constants: Arc<NodeConstants>) -> Self {
		Self { constants }
	}

	/// Parse one transaction object
	pub fn parse_transaction(&self, value: &Value) -> Result<Transaction, CodecError> {
		let tx = Transaction::from_json(value, &self.constants)?;
		debug!(
			"Parsed transaction {} on chain {} ({})",
			tx.id(),
			tx.chain_id(),
			tx.type_label()
		);
		Ok(tx)
	}

	/// Parse a list of transaction objects, skipping the ones that do not decode
	pub fn process_transactions_batch(&self, values: &[Value]) -> Vec<Transaction> {
		values
			.iter()
			.filter_map(|value| match self.parse_transaction(value) {
				Ok(tx) => Some(tx),
				Err(e) => {
					warn!(
						"[PARSE_TRANSACTION] Skipping transaction {}: {}",
						value.get("fullHash").and_then(|v| v.as_str()).unwrap_or("?"),
						e
					);
					None
				}
			})
			.collect()
	}
}
