//! Database row types; these map directly to SQLite rows.
//! Distinct from parley-types models to keep the DB layer independent.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use parley_types::models::{Message, User};

pub struct UserRow {
    pub user_id: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: String,
    pub push_token: Option<String>,
}

pub struct MessageRow {
    pub conversation_id: String,
    pub timestamp: String,
    pub sender_id: String,
    pub message: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            user_id: row.user_id,
            email: row.email,
            phone_number: row.phone_number,
            display_name: row.display_name,
            push_token: row.push_token,
        }
    }
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        let timestamp = row.timestamp.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
            warn!(
                "Corrupt timestamp '{}' on message in '{}': {}",
                row.timestamp, row.conversation_id, e
            );
            DateTime::default()
        });

        Message {
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            message: row.message,
            timestamp,
        }
    }
}

/// Fixed-width form so lexical order matches chronological order.
pub fn timestamp_key(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
