//! Event subscription on the node.
//!
//! The manager registers the account's topics once, long-polls for events with the returned
//! token and releases the subscription on cancel. Cancelling removes every event from the
//! subscription, which also makes the node answer a pending `eventWait` right away.

use std::sync::Mutex;
use tracing::{debug, info};

use super::events::EventTopic;
use crate::node::{NodeClient, RegisterMode, ServerEvent};
use crate::wallet::{AccountAddress, WalletSyncError};

/// Lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionPhase {
	Idle,
	Registering,
	Listening,
	Cancelling,
}

#[derive(Debug)]
struct State {
	phase: SubscriptionPhase,
	token: u64,
}

pub struct EventSubscriptionManager {
	client: NodeClient,
	topics: Vec<String>,
	state: Mutex<State>,
}

impl EventSubscriptionManager {
	pub fn new(client: NodeClient, account: &AccountAddress) -> Self {
		Self {
			client,
			topics: EventTopic::registrations(account),
			state: Mutex::new(State {
				phase: SubscriptionPhase::Idle,
				token: 0,
			}),
		}
	}

	pub fn topics(&self) -> &[String] {
		&self.topics
	}

	pub fn phase(&self) -> SubscriptionPhase {
		self.lock().phase
	}

	pub fn token(&self) -> u64 {
		self.lock().token
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		// State is only ever assigned whole, so a poisoned lock still holds a valid value.
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	fn set(&self, phase: SubscriptionPhase, token: u64) {
		let mut state = self.lock();
		state.phase = phase;
		state.token = token;
	}

	/// Create the subscription for every topic.
	///
	/// # Returns
	/// The token issued by the node.
	pub async fn register(&self) -> Result<u64, WalletSyncError> {
		{
			let mut state = self.lock();
			if state.phase != SubscriptionPhase::Idle {
				return Err(WalletSyncError::SessionError(format!(
					"Cannot register while {:?}",
					state.phase
				)));
			}
			state.phase = SubscriptionPhase::Registering;
		}

		match self
			.client
			.event_register(&self.topics, 0, RegisterMode::Create)
			.await
		{
			Ok(registration) if registration.token != 0 => {
				self.set(SubscriptionPhase::Listening, registration.token);
				info!("Registered {} event topics", self.topics.len());
				debug!("Event token {}", registration.token);
				Ok(registration.token)
			}
			Ok(_) => {
				self.set(SubscriptionPhase::Idle, 0);
				Err(WalletSyncError::SessionError(
					"Node did not issue an event token".to_string(),
				))
			}
			Err(e) => {
				self.set(SubscriptionPhase::Idle, 0);
				Err(e.into())
			}
		}
	}

	/// Wait for the next batch of events.
	///
	/// An empty batch means the node's hold time elapsed, or the subscription was cancelled.
	pub async fn wait(&self, timeout_secs: u32) -> Result<Vec<ServerEvent>, WalletSyncError> {
		let token = {
			let state = self.lock();
			match state.phase {
				SubscriptionPhase::Listening => state.token,
				SubscriptionPhase::Cancelling => return Ok(Vec::new()),
				phase => {
					return Err(WalletSyncError::SessionError(format!(
						"Cannot wait while {:?}",
						phase
					)));
				}
			}
		};
		Ok(self.client.event_wait(token, timeout_secs).await?)
	}

	/// Release the subscription.
	///
	/// Does nothing unless the subscription is listening, so concurrent or repeated calls send
	/// a single removal.
	pub async fn cancel(&self) -> Result<(), WalletSyncError> {
		let token = {
			let mut state = self.lock();
			if state.phase != SubscriptionPhase::Listening {
				return Ok(());
			}
			state.phase = SubscriptionPhase::Cancelling;
			state.token
		};

		debug!("Cancelling event subscription {}", token);
		let result = self
			.client
			.event_register(&[], token, RegisterMode::Remove)
			.await;
		self.set(SubscriptionPhase::Idle, 0);
		result?;
		Ok(())
	}
}
