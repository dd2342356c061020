use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user. The id is issued by the upstream identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Stored in E.164 form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub display_name: String,
    /// Delivery secret; accepted on input but never written out.
    #[serde(default, skip_serializing)]
    pub push_token: Option<String>,
}

/// A (user, conversation) pair. A conversation exists only as the set of
/// these records sharing a conversation id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    pub user_id: String,
    pub conversation_id: String,
}

/// A stored message. Only the sender id is kept; profiles are joined at
/// read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub conversation_id: String,
    pub sender_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A message rendered with the sender's live profile.
///
/// `sender` is `None` when the sender's user record has since been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub conversation_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub sender_id: String,
    pub sender: Option<User>,
}

impl MessageView {
    pub fn new(message: Message, sender: Option<User>) -> Self {
        Self {
            conversation_id: message.conversation_id,
            message: message.message,
            timestamp: message.timestamp,
            sender_id: message.sender_id,
            sender,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub conversation_id: String,
    /// Members in join order; the first is the originator.
    pub members: Vec<User>,
    pub messages: Vec<MessageView>,
}
