//! Switching the active account.

use std::sync::Arc;
use tracing::{info, warn};

use super::dispatch::UpdateSender;
use super::loader::AccountLoader;
use super::orchestrator::{SyncHandle, SyncOrchestrator};
use super::progress_tracker::SyncStats;
use crate::node::NodeClient;
use crate::wallet::view::ViewUpdate;
use crate::wallet::{Session, WalletSyncError};

/// Owns the running session, if any.
///
/// At most one event loop runs at a time: starting a session fully stops the previous one
/// (stop flag, subscription cancel, join) before the new account is loaded. A previous session
/// that ended on an error does not prevent the next one from starting.
pub struct SessionController {
	client: NodeClient,
	updates: UpdateSender,
	wait_timeout_secs: u32,
	current: Option<SyncHandle>,
}

impl SessionController {
	pub fn new(client: NodeClient, updates: UpdateSender, wait_timeout_secs: u32) -> Self {
		Self {
			client,
			updates,
			wait_timeout_secs,
			current: None,
		}
	}

	/// Load `session`'s account into the view and start following it.
	pub async fn switch_account(&mut self, session: Arc<Session>) -> Result<(), WalletSyncError> {
		match self.stop().await {
			Ok(Some(stats)) => info!("Previous session: {}", stats.summary()),
			Ok(None) => {}
			Err(e) => warn!("Previous session ended with an error: {}", e),
		}

		let snapshot = AccountLoader::new(self.client.clone())
			.load(session.clone())
			.await?;
		let tip = snapshot.tip;
		self.updates
			.invoke_and_wait(ViewUpdate::Loaded(snapshot))
			.await?;

		let orchestrator = SyncOrchestrator::new(
			session,
			self.client.clone(),
			self.updates.clone(),
			self.wait_timeout_secs,
			tip,
		);
		self.current = Some(orchestrator.spawn());
		Ok(())
	}

	/// Whether an event loop is running.
	pub fn is_running(&self) -> bool {
		self.current
			.as_ref()
			.is_some_and(|handle| !handle.is_finished())
	}

	/// Stop the running session.
	///
	/// # Returns
	/// The session's statistics, `None` when nothing was running, or the error that ended it.
	pub async fn stop(&mut self) -> Result<Option<SyncStats>, WalletSyncError> {
		match self.current.take() {
			Some(handle) => {
				info!("Stopping session for {}", handle.account());
				handle.stop().await.map(Some)
			}
			None => Ok(None),
		}
	}
}
