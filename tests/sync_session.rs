mod common;

use async_trait::async_trait;
use axum::http::StatusCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{MockNode, full_hash_hex, param, params_named, transaction_json};
use nxt2_state_sync::node::{NodeError, TRANSACTION_PAGE_SIZE};
use nxt2_state_sync::wallet::sync::{
	AccountLoader, EventTopic, SessionController, SubscriptionPhase, SyncOrchestrator,
	ViewObserver, channel,
};
use nxt2_state_sync::wallet::{
	AccountAddress, Notification, Session, WalletSyncError, WalletView,
};

const ACCOUNT_ID: u64 = 5_873_880_488_492_319_831;
const OTHER_ID: u64 = 3_705_364_957_971_254_799;

#[derive(Clone, Default)]
struct Recorder {
	seen: Arc<Mutex<Vec<Notification>>>,
}

impl Recorder {
	fn notifications(&self) -> Vec<Notification> {
		self.seen.lock().unwrap().clone()
	}
}

#[async_trait]
impl ViewObserver for Recorder {
	async fn notify(
		&mut self,
		notification: &Notification,
		_view: &WalletView,
	) -> Result<(), WalletSyncError> {
		self.seen.lock().unwrap().push(notification.clone());
		Ok(())
	}

	fn name(&self) -> &'static str {
		"recorder"
	}
}

fn session(node: &MockNode, account_id: u64) -> Arc<Session> {
	Arc::new(Session::watch(
		AccountAddress::new(account_id),
		Arc::new(node.constants()),
	))
}

fn event(topic: EventTopic, ids: &[String]) -> (String, Vec<String>) {
	(
		topic.registration(&AccountAddress::new(ACCOUNT_ID)),
		ids.to_vec(),
	)
}

fn transaction_ref(chain_id: u32, seed: u8) -> String {
	format!("{}:{}", chain_id, full_hash_hex(seed))
}

#[tokio::test]
async fn test_loader_reads_account() {
	let node = MockNode::start().await;
	node.set_height(500);
	node.set_balance("IGNIS", 7_000, 6_500);
	for seed in 1..=120u8 {
		let height = 400 - seed as u32;
		node.add_confirmed(
			"IGNIS",
			transaction_json(2, seed, OTHER_ID, ACCOUNT_ID, Some((9_000 + seed as u64, height))),
		);
	}
	node.add_unconfirmed(
		"IGNIS",
		transaction_json(2, 200, ACCOUNT_ID, OTHER_ID, None),
	);
	// Skipped: does not decode.
	node.add_unconfirmed("ARDR", serde_json::json!({"fullHash": "00"}));

	let snapshot = AccountLoader::new(node.client())
		.load(session(&node, ACCOUNT_ID))
		.await
		.unwrap();

	assert_eq!(snapshot.tip, 500);
	assert_eq!(snapshot.name, "");
	let ignis = snapshot.chains.iter().find(|c| c.chain_id == 2).unwrap();
	assert_eq!(ignis.confirmed.len(), 120);
	assert_eq!(ignis.unconfirmed.len(), 1);
	assert_eq!(ignis.balance.unconfirmed, 6_500);
	let ardr = snapshot.chains.iter().find(|c| c.chain_id == 1).unwrap();
	assert!(ardr.confirmed.is_empty() && ardr.unconfirmed.is_empty());

	let pages: Vec<(String, String)> = node
		.requests("getBlockchainTransactions")
		.iter()
		.filter(|params| param(params, "chain") == Some("IGNIS"))
		.map(|params| {
			(
				param(params, "firstIndex").unwrap().to_string(),
				param(params, "lastIndex").unwrap().to_string(),
			)
		})
		.collect();
	assert_eq!(pages.len(), 120 / TRANSACTION_PAGE_SIZE + 1);
	assert_eq!(pages[0], ("0".to_string(), "49".to_string()));
	assert_eq!(pages[2], ("100".to_string(), "149".to_string()));
}

#[tokio::test]
async fn test_loader_reads_account_name() {
	let node = MockNode::start().await;
	node.set_account_name("savings");

	let snapshot = AccountLoader::new(node.client())
		.load(session(&node, ACCOUNT_ID))
		.await
		.unwrap();
	assert_eq!(snapshot.name, "savings");
}

#[tokio::test]
async fn test_empty_wait_changes_nothing() {
	let node = MockNode::start().await;
	let constants = Arc::new(node.constants());
	let recorder = Recorder::default();
	let (updates, mut consumer) = channel(8, WalletView::new(constants));
	consumer.register_observer(Box::new(recorder.clone()));
	let consumer_task = tokio::spawn(consumer.run());

	let handle =
		SyncOrchestrator::new(session(&node, ACCOUNT_ID), node.client(), updates, 1, 100).spawn();
	node.wait_for("eventWait", 3).await;

	let stats = handle.stop().await.unwrap();
	assert!(stats.empty_waits >= 2);
	assert_eq!(stats.batches_processed, 0);
	assert_eq!(stats.highest_tip, 100);

	let view = consumer_task.await.unwrap();
	assert_eq!(view.tip(), 0);
	assert!(view.ledgers().all(|ledger| ledger.is_empty()));
	assert!(recorder.notifications().is_empty());
	assert_eq!(node.count("getTransaction"), 0);
	assert_eq!(node.count("getBalance"), 0);
}

#[tokio::test]
async fn test_cancel_releases_pending_wait() {
	let node = MockNode::start().await;
	let (updates, consumer) = channel(8, WalletView::new(Arc::new(node.constants())));
	let consumer_task = tokio::spawn(consumer.run());

	// The node would hold this wait for half a minute.
	let handle =
		SyncOrchestrator::new(session(&node, ACCOUNT_ID), node.client(), updates, 30, 100).spawn();
	node.wait_for("eventWait", 1).await;

	let started = Instant::now();
	let stopped = tokio::time::timeout(Duration::from_secs(5), handle.stop()).await;
	assert!(stopped.expect("stop did not return in time").is_ok());
	assert!(started.elapsed() < Duration::from_secs(5));

	let registrations = node.requests("eventRegister");
	assert_eq!(registrations.len(), 2);
	assert_eq!(params_named(&registrations[0], "event").len(), 5);
	assert_eq!(param(&registrations[0], "remove"), None);
	assert!(params_named(&registrations[1], "event").is_empty());
	assert_eq!(param(&registrations[1], "remove"), Some("true"));
	assert_eq!(param(&registrations[1], "token"), Some("4242"));
	assert_eq!(node.count("eventWait"), 1);

	consumer_task.await.unwrap();
}

#[tokio::test]
async fn test_registered_topics() {
	let node = MockNode::start().await;
	let subscription = nxt2_state_sync::wallet::sync::EventSubscriptionManager::new(
		node.client(),
		&AccountAddress::new(ACCOUNT_ID),
	);
	assert_eq!(subscription.phase(), SubscriptionPhase::Idle);

	// Waiting before registering is refused.
	assert!(matches!(
		subscription.wait(1).await,
		Err(WalletSyncError::SessionError(_))
	));

	assert_eq!(subscription.register().await.unwrap(), 4242);
	assert_eq!(subscription.phase(), SubscriptionPhase::Listening);

	let rs = AccountAddress::new(ACCOUNT_ID).encode();
	let registered = node.requests("eventRegister");
	let names = params_named(&registered[0], "event");
	assert!(names.contains(&"Block.BLOCK_PUSHED"));
	assert!(names.contains(&format!("Transaction.ADDED_CONFIRMED_TRANSACTIONS.{}", rs).as_str()));
	assert!(
		names.contains(&format!("Transaction.REMOVED_UNCONFIRMED_TRANSACTIONS.{}", rs).as_str())
	);

	subscription.cancel().await.unwrap();
	subscription.cancel().await.unwrap();
	assert_eq!(subscription.phase(), SubscriptionPhase::Idle);
	assert_eq!(node.count("eventRegister"), 2);
}

#[tokio::test]
async fn test_events_update_view() {
	let node = MockNode::start().await;
	node.set_height(100);
	node.set_balance("IGNIS", 1_000_000_000, 900_000_000);
	node.add_confirmed(
		"IGNIS",
		transaction_json(2, 1, OTHER_ID, ACCOUNT_ID, Some((900, 90))),
	);
	node.add_unconfirmed(
		"IGNIS",
		transaction_json(2, 2, ACCOUNT_ID, OTHER_ID, None),
	);

	let recorder = Recorder::default();
	let (updates, mut consumer) = channel(8, WalletView::new(Arc::new(node.constants())));
	consumer.register_observer(Box::new(recorder.clone()));
	let consumer_task = tokio::spawn(consumer.run());

	let mut controller = SessionController::new(node.client(), updates, 1);
	controller
		.switch_account(session(&node, ACCOUNT_ID))
		.await
		.unwrap();
	assert!(controller.is_running());

	// Block 1010 includes the pending payment.
	node.set_height(101);
	node.set_balance("IGNIS", 800_000_000, 800_000_000);
	node.put_transaction(transaction_json(2, 2, ACCOUNT_ID, OTHER_ID, Some((1_010, 101))));
	node.push_events(vec![
		event(EventTopic::BlockPushed, &["1010".to_string()]),
		event(
			EventTopic::AddedConfirmedTransactions,
			&[transaction_ref(2, 2)],
		),
	]);

	// A payment arrives and is dropped again; the broken and unknown-chain ids are skipped.
	node.put_transaction(transaction_json(2, 3, OTHER_ID, ACCOUNT_ID, None));
	node.push_events(vec![
		event(
			EventTopic::AddedUnconfirmedTransactions,
			&[transaction_ref(2, 3), "2:zz".to_string(), transaction_ref(9, 4)],
		),
		event(
			EventTopic::RemovedUnconfirmedTransactions,
			&[transaction_ref(2, 3)],
		),
	]);

	// Block 1010 is popped.
	node.push_events(vec![event(EventTopic::BlockPopped, &["1010".to_string()])]);
	node.wait_for("eventWait", 4).await;

	let stats = controller.stop().await.unwrap().unwrap();
	assert!(!controller.is_running());
	drop(controller);
	let view = consumer_task.await.unwrap();

	assert_eq!(stats.batches_processed, 3);
	assert_eq!(stats.blocks_pushed, 1);
	assert_eq!(stats.blocks_popped, 1);
	assert_eq!(stats.transactions_removed, 1);
	assert_eq!(stats.events_skipped, 1);
	assert_eq!(stats.highest_tip, 101);

	assert_eq!(view.tip(), 101);
	assert_eq!(view.balance(2).unwrap().unconfirmed, 800_000_000);
	let ledger = view.ledger(2).unwrap();
	assert_eq!(ledger.len(), 2);
	assert!(ledger.is_consistent());
	let hashes: Vec<String> = ledger.iter().map(|tx| tx.full_hash_hex()).collect();
	assert!(!hashes.contains(&full_hash_hex(3)));
	let retracted = ledger
		.iter()
		.find(|tx| tx.full_hash_hex() == full_hash_hex(2))
		.unwrap();
	assert!(!retracted.is_confirmed());
	let kept = ledger
		.iter()
		.find(|tx| tx.full_hash_hex() == full_hash_hex(1))
		.unwrap();
	assert_eq!((kept.block_id(), kept.height()), (900, 90));

	let notifications = recorder.notifications();
	assert!(matches!(
		notifications[0],
		Notification::AccountLoaded {
			transactions: 2,
			..
		}
	));
	assert!(notifications.contains(&Notification::TipChanged { tip: 101 }));
	assert!(notifications.iter().any(|n| matches!(
		n,
		Notification::TransactionConfirmed {
			chain_id: 2,
			block_id: 1_010,
			height: 101,
			..
		}
	)));
	assert!(notifications.iter().any(|n| matches!(
		n,
		Notification::TransactionInserted { transaction, .. }
			if transaction.full_hash_hex() == full_hash_hex(3)
	)));
	assert!(notifications.contains(&Notification::TransactionRemoved {
		chain_id: 2,
		full_hash: [3; 32],
	}));
	assert!(notifications.contains(&Notification::TransactionsRetracted {
		chain_id: 2,
		block_id: 1_010,
		count: 1,
	}));
	assert!(
		notifications
			.iter()
			.any(|n| matches!(n, Notification::BalancesChanged { .. }))
	);
}

#[tokio::test]
async fn test_switch_account_stops_previous_session() {
	let node = MockNode::start().await;
	let (updates, consumer) = channel(8, WalletView::new(Arc::new(node.constants())));
	let consumer_task = tokio::spawn(consumer.run());

	let mut controller = SessionController::new(node.client(), updates, 30);
	controller
		.switch_account(session(&node, ACCOUNT_ID))
		.await
		.unwrap();
	node.wait_for("eventWait", 1).await;

	controller
		.switch_account(session(&node, OTHER_ID))
		.await
		.unwrap();
	node.wait_for("eventWait", 2).await;

	let registrations = node.requests("eventRegister");
	assert_eq!(registrations.len(), 3);
	assert_eq!(param(&registrations[1], "remove"), Some("true"));
	let other = AccountAddress::new(OTHER_ID).encode();
	assert!(
		params_named(&registrations[2], "event")
			.iter()
			.any(|name| name.ends_with(&other))
	);

	controller.stop().await.unwrap();
	assert!(controller.stop().await.unwrap().is_none());
	drop(controller);
	let view = consumer_task.await.unwrap();
	assert_eq!(view.session().unwrap().account_id(), OTHER_ID);
}

#[tokio::test]
async fn test_node_failure_ends_session() {
	let node = MockNode::start().await;
	let (updates, consumer) = channel(8, WalletView::new(Arc::new(node.constants())));
	let consumer_task = tokio::spawn(consumer.run());

	let mut controller = SessionController::new(node.client(), updates, 1);
	controller
		.switch_account(session(&node, ACCOUNT_ID))
		.await
		.unwrap();

	node.set_reply(
		"getBlockchainStatus",
		StatusCode::SERVICE_UNAVAILABLE,
		"{}",
	);
	node.push_events(vec![event(EventTopic::BlockPushed, &["1".to_string()])]);

	tokio::time::timeout(Duration::from_secs(5), async {
		while controller.is_running() {
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	})
	.await
	.expect("event loop kept running");

	assert!(matches!(
		controller.stop().await,
		Err(WalletSyncError::NodeError(_))
	));
	// The worker released its own subscription.
	let registrations = node.requests("eventRegister");
	assert_eq!(registrations.len(), 2);
	assert_eq!(param(&registrations[1], "remove"), Some("true"));

	drop(controller);
	consumer_task.await.unwrap();
}

#[tokio::test]
async fn test_switch_account_after_failed_session() {
	let node = MockNode::start().await;
	let (updates, consumer) = channel(8, WalletView::new(Arc::new(node.constants())));
	let consumer_task = tokio::spawn(consumer.run());

	let mut controller = SessionController::new(node.client(), updates, 1);
	controller
		.switch_account(session(&node, ACCOUNT_ID))
		.await
		.unwrap();

	node.set_reply(
		"getBlockchainStatus",
		StatusCode::SERVICE_UNAVAILABLE,
		"{}",
	);
	node.push_events(vec![event(EventTopic::BlockPushed, &["1".to_string()])]);
	tokio::time::timeout(Duration::from_secs(5), async {
		while controller.is_running() {
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	})
	.await
	.expect("event loop kept running");

	// The node is back; following another account starts a fresh session.
	node.clear_reply("getBlockchainStatus");
	controller
		.switch_account(session(&node, OTHER_ID))
		.await
		.unwrap();
	assert!(controller.is_running());
	node.wait_for("eventWait", 2).await;

	let registrations = node.requests("eventRegister");
	assert_eq!(registrations.len(), 3);
	assert_eq!(param(&registrations[1], "remove"), Some("true"));
	let other = AccountAddress::new(OTHER_ID).encode();
	assert!(
		params_named(&registrations[2], "event")
			.iter()
			.any(|name| name.ends_with(&other))
	);

	assert!(controller.stop().await.unwrap().is_some());
	drop(controller);
	let view = consumer_task.await.unwrap();
	assert_eq!(view.session().unwrap().account_id(), OTHER_ID);
}

#[tokio::test]
async fn test_bad_transactions_in_batch_are_skipped() {
	let node = MockNode::start().await;
	let (updates, consumer) = channel(8, WalletView::new(Arc::new(node.constants())));
	let consumer_task = tokio::spawn(consumer.run());

	let mut controller = SessionController::new(node.client(), updates, 1);
	controller
		.switch_account(session(&node, ACCOUNT_ID))
		.await
		.unwrap();

	// Seed 5 comes back without the fields a transaction needs.
	node.put_transaction(serde_json::json!({"fullHash": full_hash_hex(5), "chain": 2}));
	node.put_transaction(transaction_json(2, 6, OTHER_ID, ACCOUNT_ID, None));
	node.push_events(vec![event(
		EventTopic::AddedUnconfirmedTransactions,
		&[
			transaction_ref(9, 4),
			transaction_ref(2, 5),
			transaction_ref(2, 6),
		],
	)]);
	// The next wait starts once the whole batch is handled.
	node.wait_for("eventWait", 2).await;

	let stats = controller.stop().await.unwrap().unwrap();
	drop(controller);
	let view = consumer_task.await.unwrap();

	assert_eq!(stats.batches_processed, 1);
	assert_eq!(stats.events_skipped, 2);
	// The unknown chain is refused before asking the node.
	assert_eq!(node.count("getTransaction"), 2);
	let hashes: Vec<String> = view
		.ledger(2)
		.unwrap()
		.iter()
		.map(|tx| tx.full_hash_hex())
		.collect();
	assert_eq!(hashes, vec![full_hash_hex(6)]);
}

#[tokio::test]
async fn test_transaction_lookup_error_ends_session() {
	let node = MockNode::start().await;
	let (updates, consumer) = channel(8, WalletView::new(Arc::new(node.constants())));
	let consumer_task = tokio::spawn(consumer.run());

	let mut controller = SessionController::new(node.client(), updates, 1);
	controller
		.switch_account(session(&node, ACCOUNT_ID))
		.await
		.unwrap();

	// Seed 7 is unknown to the node, which answers with error code 5.
	node.put_transaction(transaction_json(2, 8, OTHER_ID, ACCOUNT_ID, None));
	node.push_events(vec![event(
		EventTopic::AddedUnconfirmedTransactions,
		&[transaction_ref(2, 7), transaction_ref(2, 8)],
	)]);
	tokio::time::timeout(Duration::from_secs(5), async {
		while controller.is_running() {
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	})
	.await
	.expect("event loop kept running");

	match controller.stop().await {
		Err(WalletSyncError::NodeError(NodeError::Application(e))) => {
			assert_eq!(e.code, 5);
			assert_eq!(e.request_type, "getTransaction");
		}
		other => panic!("expected an application error, got {:?}", other),
	}
	assert_eq!(node.count("getTransaction"), 1);
	assert_eq!(param(&node.requests("eventRegister")[1], "remove"), Some("true"));

	drop(controller);
	let view = consumer_task.await.unwrap();
	assert!(view.ledger(2).unwrap().is_empty());
}
