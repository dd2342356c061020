//! Storage collaborator traits over SQLite. rusqlite is blocking, so every
//! call runs on the blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use parley_core::StoreError;
use parley_core::store::{MembershipTable, MessageTable, StoreResult, UserTable};
use parley_types::models::{MembershipRecord, Message, User};

use crate::Database;

impl Database {
    async fn blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Backend(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
            .map_err(StoreError::Backend)
    }
}

#[async_trait]
impl UserTable for Database {
    async fn get(&self, user_id: &str) -> StoreResult<Option<User>> {
        let id = user_id.to_string();
        let row = self.blocking(move |db| db.get_user_by_id(&id)).await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        let row = self.blocking(move |db| db.get_user_by_email(&email)).await?;
        Ok(row.map(User::from))
    }

    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>> {
        let phone = phone_number.to_string();
        let row = self.blocking(move |db| db.get_user_by_phone(&phone)).await?;
        Ok(row.map(User::from))
    }

    async fn put_if_absent(&self, user: &User) -> StoreResult<()> {
        let u = user.clone();
        match self.blocking(move |db| db.insert_user(&u)).await? {
            None => Ok(()),
            Some(field) => Err(StoreError::ConditionFailed(field)),
        }
    }

    async fn put(&self, user: &User) -> StoreResult<()> {
        let u = user.clone();
        self.blocking(move |db| db.update_user(&u)).await
    }

    async fn delete(&self, user_id: &str) -> StoreResult<()> {
        let id = user_id.to_string();
        self.blocking(move |db| db.delete_user(&id)).await
    }
}

#[async_trait]
impl MembershipTable for Database {
    async fn conversation_ids(&self, user_id: &str) -> StoreResult<Vec<String>> {
        let id = user_id.to_string();
        self.blocking(move |db| db.get_conversation_ids(&id)).await
    }

    async fn member_ids(&self, conversation_id: &str) -> StoreResult<Vec<String>> {
        let cid = conversation_id.to_string();
        self.blocking(move |db| db.get_member_ids(&cid)).await
    }

    async fn put(&self, record: &MembershipRecord) -> StoreResult<()> {
        let r = record.clone();
        self.blocking(move |db| db.insert_membership(&r.user_id, &r.conversation_id))
            .await
    }

    async fn delete(&self, user_id: &str, conversation_id: &str) -> StoreResult<()> {
        let (uid, cid) = (user_id.to_string(), conversation_id.to_string());
        self.blocking(move |db| db.delete_membership(&uid, &cid)).await
    }
}

#[async_trait]
impl MessageTable for Database {
    async fn put(&self, message: &Message) -> StoreResult<()> {
        let m = message.clone();
        self.blocking(move |db| db.insert_message(&m)).await
    }

    async fn list(
        &self,
        conversation_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Message>> {
        let cid = conversation_id.to_string();
        let rows = self.blocking(move |db| db.get_messages(&cid, since)).await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }
}
