//! Handoff between the sync worker and the view.
//!
//! The worker never touches the [`WalletView`]. It sends [`ViewUpdate`]s over a bounded channel
//! to a single [`ViewConsumer`] task, which applies them in order and forwards the resulting
//! notifications to the registered observers. [`UpdateSender::invoke_and_wait`] returns once the
//! update has been applied and every observer has seen its notifications;
//! [`UpdateSender::invoke_later`] only queues the update.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::wallet::view::{Notification, ViewUpdate, WalletView};
use crate::wallet::WalletSyncError;

struct Envelope {
    update: ViewUpdate,
    ack: Option<oneshot::Sender<()>>,
}

/// Worker side of the handoff channel.
#[derive(Clone)]
pub struct UpdateSender {
    tx: mpsc::Sender<Envelope>,
}

impl UpdateSender {
    /// Queue an update and wait until it has been applied.
    pub async fn invoke_and_wait(&self, update: ViewUpdate) -> Result<(), WalletSyncError> {
        let (ack, applied) = oneshot::channel();
        self.tx
            .send(Envelope {
                update,
                ack: Some(ack),
            })
            .await
            .map_err(|_| WalletSyncError::HandoffClosed)?;
        applied.await.map_err(|_| WalletSyncError::HandoffClosed)
    }

    /// Queue an update without waiting for it to be applied.
    pub async fn invoke_later(&self, update: ViewUpdate) -> Result<(), WalletSyncError> {
        self.tx
            .send(Envelope { update, ack: None })
            .await
            .map_err(|_| WalletSyncError::HandoffClosed)
    }
}

/// Create the handoff channel for `view`.
///
/// # Arguments
/// * `capacity` - Updates that can be queued before the worker waits for the consumer.
/// * `view` - The view the consumer will own.
pub fn channel(capacity: usize, view: WalletView) -> (UpdateSender, ViewConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        UpdateSender { tx },
        ViewConsumer {
            rx,
            view,
            dispatcher: NotificationDispatcher::new(),
        },
    )
}

/// Trait for reacting to view changes.
///
/// Observers run on the consumer task, one notification at a time, after the update that caused
/// it has been applied.
#[async_trait::async_trait]
pub trait ViewObserver: Send + Sync {
    /// Handle a notification. `view` already reflects the change.
    async fn notify(
        &mut self,
        notification: &Notification,
        view: &WalletView,
    ) -> Result<(), WalletSyncError>;

    /// Get the name of this observer for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Fans notifications out to every registered observer.
pub struct NotificationDispatcher {
    observers: Vec<Box<dyn ViewObserver>>,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Observers are called in registration order.
    pub fn register_observer(&mut self, observer: Box<dyn ViewObserver>) {
        self.observers.push(observer);
    }

    /// Errors from one observer are logged and do not stop the others.
    pub async fn dispatch(&mut self, notification: &Notification, view: &WalletView) {
        for observer in &mut self.observers {
            if let Err(e) = observer.notify(notification, view).await {
                error!(
                    "Observer {} failed to process notification: {}",
                    observer.name(),
                    e
                );
            }
        }
    }
}

/// Owner of the [`WalletView`]. Applies updates in arrival order.
pub struct ViewConsumer {
    rx: mpsc::Receiver<Envelope>,
    view: WalletView,
    dispatcher: NotificationDispatcher,
}

impl ViewConsumer {
    pub fn register_observer(&mut self, observer: Box<dyn ViewObserver>) {
        self.dispatcher.register_observer(observer);
    }

    /// Apply updates until every [`UpdateSender`] is dropped, then return the view.
    pub async fn run(mut self) -> WalletView {
        while let Some(envelope) = self.rx.recv().await {
            match self.view.apply(envelope.update) {
                Ok(notifications) => {
                    for notification in &notifications {
                        self.dispatcher.dispatch(notification, &self.view).await;
                    }
                }
                Err(e) => warn!("Unable to apply view update: {}", e),
            }
            if let Some(ack) = envelope.ack {
                // The worker may have stopped waiting.
                let _ = ack.send(());
            }
        }
        debug!("View consumer stopped");
        self.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::fixtures;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        seen: Arc<Mutex<Vec<Notification>>>,
    }

    #[async_trait::async_trait]
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

    struct Failing;

    #[async_trait::async_trait]
    impl ViewObserver for Failing {
        async fn notify(&mut self, _: &Notification, _: &WalletView) -> Result<(), WalletSyncError> {
            Err(WalletSyncError::SessionError("observer failure".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_invoke_and_wait_applies_before_returning() {
        let view = WalletView::new(Arc::new(fixtures::constants()));
        let (sender, mut consumer) = channel(4, view);
        let seen = Arc::new(Mutex::new(Vec::new()));
        consumer.register_observer(Box::new(Failing));
        consumer.register_observer(Box::new(Recorder { seen: seen.clone() }));
        let task = tokio::spawn(consumer.run());

        sender
            .invoke_and_wait(ViewUpdate::TransactionAdded(fixtures::transaction(1, 5)))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);

        sender
            .invoke_later(ViewUpdate::BlockPushed { tip: 10 })
            .await
            .unwrap();
        drop(sender);

        let view = task.await.unwrap();
        assert_eq!(view.tip(), 10);
        assert_eq!(view.ledger(2).unwrap().len(), 1);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_consumer() {
        let view = WalletView::new(Arc::new(fixtures::constants()));
        let (sender, consumer) = channel(1, view);
        drop(consumer);
        let result = sender.invoke_later(ViewUpdate::BlockPopped { block_id: 1 }).await;
        assert!(matches!(result, Err(WalletSyncError::HandoffClosed)));
    }
}
