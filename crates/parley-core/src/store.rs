//! Storage collaborator contracts.
//!
//! Backends are passive: they enforce no business rules beyond the
//! conditional put on user identity. Everything else is checked by the service
//! before it writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use parley_types::models::{MembershipRecord, Message, User};

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait UserTable: Send + Sync {
    async fn get(&self, user_id: &str) -> StoreResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>>;

    /// Insert only if no record shares this user id, email or phone number.
    /// This is the authoritative uniqueness check; a collision returns
    /// `StoreError::ConditionFailed` naming the field.
    async fn put_if_absent(&self, user: &User) -> StoreResult<()>;

    /// Overwrite an existing record.
    async fn put(&self, user: &User) -> StoreResult<()>;

    /// Idempotent.
    async fn delete(&self, user_id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait MembershipTable: Send + Sync {
    async fn conversation_ids(&self, user_id: &str) -> StoreResult<Vec<String>>;

    /// Member ids in the order they joined.
    async fn member_ids(&self, conversation_id: &str) -> StoreResult<Vec<String>>;

    async fn put(&self, record: &MembershipRecord) -> StoreResult<()>;

    async fn delete(&self, user_id: &str, conversation_id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait MessageTable: Send + Sync {
    /// Keyed by (conversation id, timestamp); an existing key is replaced.
    async fn put(&self, message: &Message) -> StoreResult<()>;

    /// Messages ascending by timestamp, optionally only those after `since`.
    async fn list(
        &self,
        conversation_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Message>>;
}

/// A backend that serves all three tables.
pub trait Storage: UserTable + MembershipTable + MessageTable {}

impl<T> Storage for T where T: UserTable + MembershipTable + MessageTable {}
