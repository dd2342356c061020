use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::info;

use parley_types::notifications::PushNotification;

/// Push delivery collaborator. Fire-and-forget from the core's point of
/// view: a failure here is logged and never fails the operation that
/// triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: PushNotification) -> anyhow::Result<()>;
}

/// Logs notifications and delivers nothing.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: PushNotification) -> anyhow::Result<()> {
        info!(
            "Push to {} for conversation {}: {}",
            notification.recipient_id, notification.data.conversation_id, notification.title
        );
        Ok(())
    }
}

/// Forwards notifications to an in-process receiver.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<PushNotification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PushNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, notification: PushNotification) -> anyhow::Result<()> {
        self.tx
            .send(notification)
            .map_err(|_| anyhow::anyhow!("notification receiver dropped"))
    }
}
