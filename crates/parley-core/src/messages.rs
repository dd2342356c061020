use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use parley_types::models::Message;

use crate::error::Result;
use crate::store::MessageTable;

/// Append-only per-conversation message log.
#[derive(Clone)]
pub struct MessageStore {
    table: Arc<dyn MessageTable>,
    /// Last timestamp handed out; shared by every clone.
    clock: Arc<Mutex<DateTime<Utc>>>,
}

impl MessageStore {
    pub fn new(table: Arc<dyn MessageTable>) -> Self {
        Self {
            table,
            clock: Arc::new(Mutex::new(DateTime::<Utc>::MIN_UTC)),
        }
    }

    /// Wall-clock time, bumped by a nanosecond whenever it would not be
    /// strictly after the previous value. Messages are keyed by timestamp,
    /// so two posts never share one within this process.
    pub fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now();
        let next = if now > *last {
            now
        } else {
            *last + Duration::nanoseconds(1)
        };
        *last = next;
        next
    }

    pub async fn append(&self, message: &Message) -> Result<()> {
        Ok(self.table.put(message).await?)
    }

    /// Ascending by timestamp; with `since`, only later messages.
    pub async fn history(
        &self,
        conversation_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        Ok(self.table.list(conversation_id, since).await?)
    }
}
