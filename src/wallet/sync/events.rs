//! Server event topics and their translation into sync events.
//!
//! The node reports events by name with a list of string ids. Block topics carry a block id;
//! transaction topics carry `chainId:fullHashHex` entries and are registered with the account's
//! Reed-Solomon address appended so that the node only reports the account's own transactions.

use crate::node::ServerEvent;
use crate::wallet::{AccountAddress, WalletSyncError};
use tracing::{debug, warn};

/// Event topics the wallet subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    BlockPushed,
    BlockPopped,
    AddedConfirmedTransactions,
    AddedUnconfirmedTransactions,
    RemovedUnconfirmedTransactions,
}

impl EventTopic {
    pub const ALL: [EventTopic; 5] = [
        EventTopic::BlockPushed,
        EventTopic::BlockPopped,
        EventTopic::AddedConfirmedTransactions,
        EventTopic::AddedUnconfirmedTransactions,
        EventTopic::RemovedUnconfirmedTransactions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EventTopic::BlockPushed => "Block.BLOCK_PUSHED",
            EventTopic::BlockPopped => "Block.BLOCK_POPPED",
            EventTopic::AddedConfirmedTransactions => "Transaction.ADDED_CONFIRMED_TRANSACTIONS",
            EventTopic::AddedUnconfirmedTransactions => {
                "Transaction.ADDED_UNCONFIRMED_TRANSACTIONS"
            }
            EventTopic::RemovedUnconfirmedTransactions => {
                "Transaction.REMOVED_UNCONFIRMED_TRANSACTIONS"
            }
        }
    }

    /// Whether the topic is filtered by account on the node.
    pub fn is_account_scoped(&self) -> bool {
        !matches!(self, EventTopic::BlockPushed | EventTopic::BlockPopped)
    }

    /// Name used in `eventRegister` for `account`.
    pub fn registration(&self, account: &AccountAddress) -> String {
        if self.is_account_scoped() {
            format!("{}.{}", self.name(), account.encode())
        } else {
            self.name().to_string()
        }
    }

    /// Topic of an event name as reported by `eventWait`, with or without the account suffix.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|topic| {
            name.strip_prefix(topic.name())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })
    }

    /// Registration names for every topic.
    pub fn registrations(account: &AccountAddress) -> Vec<String> {
        Self::ALL
            .iter()
            .map(|topic| topic.registration(account))
            .collect()
    }
}

/// Events that drive the account view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A block was added; the new tip must be read from the node
    BlockPushed,
    /// A block was removed by a reorg
    BlockPopped { block_id: u64 },
    /// A transaction for the account was added to a block or to the unconfirmed pool
    TransactionAdded { chain_id: u32, full_hash: [u8; 32] },
    /// An unconfirmed transaction was dropped by the node
    UnconfirmedRemoved { chain_id: u32, full_hash: [u8; 32] },
}

/// Split a `chainId:fullHashHex` event id.
pub fn parse_transaction_ref(payload: &str) -> Result<(u32, [u8; 32]), WalletSyncError> {
    let malformed = || WalletSyncError::MalformedEvent(payload.to_string());
    let mut parts = payload.split(':');
    let (Some(chain), Some(hash), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let chain_id = chain.trim().parse::<u32>().map_err(|_| malformed())?;
    let full_hash = hex::decode(hash.trim())
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(malformed)?;
    Ok((chain_id, full_hash))
}

/// Convert a node event to sync events.
///
/// Ids that cannot be parsed are logged and skipped; the rest of the event is still converted.
pub fn convert_node_event(event: &ServerEvent) -> Vec<SyncEvent> {
    let Some(topic) = EventTopic::from_name(&event.name) else {
        debug!("Ignoring unrequested event {}", event.name);
        return Vec::new();
    };

    match topic {
        EventTopic::BlockPushed => vec![SyncEvent::BlockPushed],
        EventTopic::BlockPopped => {
            let Some(id) = event.ids.first() else {
                warn!("{} event without a block id", event.name);
                return Vec::new();
            };
            match id.trim().parse::<u64>() {
                Ok(block_id) => vec![SyncEvent::BlockPopped { block_id }],
                Err(_) => {
                    warn!("{}", WalletSyncError::MalformedEvent(id.clone()));
                    Vec::new()
                }
            }
        }
        EventTopic::AddedConfirmedTransactions
        | EventTopic::AddedUnconfirmedTransactions
        | EventTopic::RemovedUnconfirmedTransactions => event
            .ids
            .iter()
            .filter_map(|id| match parse_transaction_ref(id) {
                Ok((chain_id, full_hash)) if topic == EventTopic::RemovedUnconfirmedTransactions => {
                    Some(SyncEvent::UnconfirmedRemoved {
                        chain_id,
                        full_hash,
                    })
                }
                Ok((chain_id, full_hash)) => Some(SyncEvent::TransactionAdded {
                    chain_id,
                    full_hash,
                }),
                Err(e) => {
                    warn!("Skipping {} id: {}", event.name, e);
                    None
                }
            })
            .collect(),
    }
}
