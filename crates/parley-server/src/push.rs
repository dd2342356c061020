use async_trait::async_trait;
use tracing::debug;

use parley_core::notify::Notifier;
use parley_types::notifications::PushNotification;

/// Relays notifications as JSON to an external push gateway.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: PushNotification) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&notification)
            .send()
            .await?
            .error_for_status()?;
        debug!("Push relayed for {}", notification.recipient_id);
        Ok(())
    }
}
