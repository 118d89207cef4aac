//! Event loop of one sync session.
//!
//! This module defines the `SyncOrchestrator`, which runs on its own tokio task for as long as a
//! session is active:
//!
//! - register the account's event topics with the node
//! - long-poll for events and translate them into sync events
//! - fetch whatever each event refers to and hand the result to the view
//! - refresh every chain's balance after each batch
//!
//! Updates that must be visible before the next event is handled (pushed blocks, added and
//! removed transactions) are awaited; popped blocks and balances are queued.
//!
//! Node errors end the session. Errors confined to one event, such as an unknown chain or a
//! transaction that does not decode, are logged and the rest of the batch is processed.

use futures::future::try_join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::node::NodeClient;
use crate::transaction::Transaction;
use crate::wallet::sync::{
    dispatch::UpdateSender,
    events::{SyncEvent, convert_node_event},
    progress_tracker::{SyncProgressTracker, SyncStats},
    subscription::EventSubscriptionManager,
};
use crate::wallet::view::ViewUpdate;
use crate::wallet::{Session, WalletSyncError};

/// Drives one session's event loop.
pub struct SyncOrchestrator {
    session: Arc<Session>,
    client: NodeClient,
    subscription: Arc<EventSubscriptionManager>,
    updates: UpdateSender,
    stop: Arc<AtomicBool>,
    /// Server-side hold time of each wait
    wait_timeout_secs: u32,
    tracker: SyncProgressTracker,
}

impl SyncOrchestrator {
    /// Create the orchestrator for a session.
    ///
    /// # Arguments
    /// * `session` - The account to follow.
    /// * `client` - Node client used for the subscription and for follow-up requests.
    /// * `updates` - Handoff to the view consumer.
    /// * `wait_timeout_secs` - Hold time requested for each `eventWait`.
    /// * `start_tip` - Chain height at the end of the initial load.
    pub fn new(
        session: Arc<Session>,
        client: NodeClient,
        updates: UpdateSender,
        wait_timeout_secs: u32,
        start_tip: u32,
    ) -> Self {
        let subscription = Arc::new(EventSubscriptionManager::new(
            client.clone(),
            &session.account(),
        ));
        Self {
            session,
            client,
            subscription,
            updates,
            stop: Arc::new(AtomicBool::new(false)),
            wait_timeout_secs,
            tracker: SyncProgressTracker::new(start_tip),
        }
    }

    /// Start the event loop on a new task.
    pub fn spawn(self) -> SyncHandle {
        let stop = self.stop.clone();
        let subscription = self.subscription.clone();
        let account = self.session.account();
        let task = tokio::spawn(self.run());
        SyncHandle {
            stop,
            subscription,
            task,
            account: account.encode(),
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    async fn run(mut self) -> Result<SyncStats, WalletSyncError> {
        info!("Starting event loop for {}", self.session.account());
        let result = self.event_loop().await;

        // Release the subscription if the loop ended on its own.
        if let Err(e) = self.subscription.cancel().await {
            warn!("Unable to cancel event subscription: {}", e);
        }
        self.tracker.log_progress(true);

        match result {
            Ok(()) => {
                info!("Event loop for {} stopped", self.session.account());
                Ok(self.tracker.get_stats())
            }
            Err(e) => {
                error!("Event loop for {} failed: {}", self.session.account(), e);
                self.stop.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn event_loop(&mut self) -> Result<(), WalletSyncError> {
        self.subscription.register().await?;

        while !self.stopped() {
            let events = match self.subscription.wait(self.wait_timeout_secs).await {
                Ok(events) => events,
                // A cancelled subscription may answer with an error.
                Err(_) if self.stopped() => break,
                Err(e) => return Err(e),
            };
            if self.stopped() {
                break;
            }
            if events.is_empty() {
                self.tracker.record_empty_wait();
                continue;
            }

            for event in &events {
                for sync_event in convert_node_event(event) {
                    match self.dispatch(&sync_event).await {
                        Ok(()) => self.tracker.record_event(&sync_event),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            warn!("Skipping {:?}: {}", sync_event, e);
                            self.tracker.record_skipped();
                        }
                    }
                }
            }

            self.refresh_balances().await?;
            self.tracker.record_batch();
            self.tracker.log_progress(false);
        }
        Ok(())
    }

    /// Handle one sync event.
    async fn dispatch(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError> {
        let constants = self.session.constants();
        match event {
            SyncEvent::BlockPushed => {
                let tip = self.client.get_blockchain_status().await?.height();
                debug!("Block pushed, height {}", tip);
                self.tracker.record_tip(tip);
                self.updates
                    .invoke_and_wait(ViewUpdate::BlockPushed { tip })
                    .await
            }
            SyncEvent::BlockPopped { block_id } => {
                info!("Block {} popped", block_id);
                self.updates
                    .invoke_later(ViewUpdate::BlockPopped {
                        block_id: *block_id,
                    })
                    .await
            }
            SyncEvent::TransactionAdded {
                chain_id,
                full_hash,
            } => {
                let chain = constants.require_chain(*chain_id as i64)?;
                let value = self.client.get_transaction(full_hash, chain).await?;
                let tx = Transaction::from_json(&value, constants)?;
                if tx.full_hash() != full_hash {
                    return Err(WalletSyncError::IdentifierError(format!(
                        "Node returned transaction {} for {}",
                        tx.full_hash_hex(),
                        hex::encode(full_hash)
                    )));
                }
                self.updates
                    .invoke_and_wait(ViewUpdate::TransactionAdded(tx))
                    .await
            }
            SyncEvent::UnconfirmedRemoved {
                chain_id,
                full_hash,
            } => {
                constants.require_chain(*chain_id as i64)?;
                self.updates
                    .invoke_and_wait(ViewUpdate::UnconfirmedRemoved {
                        chain_id: *chain_id,
                        full_hash: *full_hash,
                    })
                    .await
            }
        }
    }

    /// Fetch the balance of every chain and replace the view's balances.
    async fn refresh_balances(&self) -> Result<(), WalletSyncError> {
        let account_id = self.session.account_id();
        let balances = try_join_all(self.session.constants().chains().map(|chain| async move {
            let balance = self.client.get_balance(account_id, chain).await?;
            Ok::<_, WalletSyncError>((chain.id, balance))
        }))
        .await?;
        self.updates.invoke_later(ViewUpdate::Balances(balances)).await
    }
}

/// Handle to a running event loop.
pub struct SyncHandle {
    stop: Arc<AtomicBool>,
    subscription: Arc<EventSubscriptionManager>,
    task: JoinHandle<Result<SyncStats, WalletSyncError>>,
    account: String,
}

impl SyncHandle {
    /// Whether the event loop has exited, normally or not.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Stop the event loop and wait for it to exit.
    ///
    /// Sets the stop flag, cancels the subscription so that a pending wait returns, and joins
    /// the task.
    pub async fn stop(self) -> Result<SyncStats, WalletSyncError> {
        debug!("Stopping event loop for {}", self.account);
        self.stop.store(true, Ordering::SeqCst);
        if let Err(e) = self.subscription.cancel().await {
            warn!("Unable to cancel event subscription: {}", e);
        }
        self.task
            .await
            .map_err(|e| WalletSyncError::SessionError(format!("Event loop task failed: {}", e)))?
    }
}
