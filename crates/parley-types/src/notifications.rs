use serde::{Deserialize, Serialize};

/// A push notification handed to the notification collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub recipient_id: String,
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: PushData,
}

/// Payload delivered alongside the alert so clients can open the thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    pub conversation_id: String,
    pub sender_id: String,
}

impl PushNotification {
    pub fn title_for(sender_name: &str) -> String {
        format!("Received message from {}", sender_name)
    }
}
