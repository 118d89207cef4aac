//! Wallet Synchronization Module
//!
//! This module keeps the account view in step with the node. It is composed of several
//! submodules, each responsible for a specific aspect of the sync process:
//!
//! - `controller`: Starts and stops sessions; switching accounts goes through it.
//! - `loader`: Reads the account's initial state before the event loop starts.
//! - `orchestrator`: The event loop of one session.
//! - `subscription`: Registers, waits on and cancels the node event subscription.
//! - `events`: Event topics and their translation into sync events.
//! - `dispatch`: Handoff of view updates from the worker to the view consumer and its observers.
//! - `progress_tracker`: Counts processed events and logs progress.
//! - `transaction_processor`: Parses node transaction JSON, skipping entries that do not decode.

/// Session switching
pub mod controller;
/// Worker to view handoff
pub mod dispatch;
/// Event topics and sync events
pub mod events;
/// Initial account load
pub mod loader;
/// Event loop of one session
pub mod orchestrator;
/// Tracks event loop progress and statistics
pub mod progress_tracker;
/// Node event subscription
pub mod subscription;
/// Transaction parsing service
pub mod transaction_processor;

pub use controller::SessionController;
pub use dispatch::{NotificationDispatcher, UpdateSender, ViewConsumer, ViewObserver, channel};
pub use events::{EventTopic, SyncEvent};
pub use loader::AccountLoader;
pub use orchestrator::{SyncHandle, SyncOrchestrator};
pub use progress_tracker::{SyncProgressTracker, SyncStats};
pub use subscription::{EventSubscriptionManager, SubscriptionPhase};
