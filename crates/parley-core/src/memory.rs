//! In-process storage backend. Used by tests and by the server when no
//! database path is configured.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use parley_types::models::{MembershipRecord, Message, User};

use crate::error::{StoreError, UniqueField};
use crate::store::{MembershipTable, MessageTable, StoreResult, UserTable};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    /// Insertion order doubles as join order.
    memberships: RwLock<Vec<MembershipRecord>>,
    messages: RwLock<HashMap<String, BTreeMap<DateTime<Utc>, Message>>>,
    /// Remaining membership writes before injected failures start; 0 = off.
    membership_write_budget: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let the next `n` membership writes succeed, then fail every write
    /// after that until `clear_faults` is called. Simulates a crash part
    /// way through creating a conversation.
    pub fn fail_membership_writes_after(&self, n: usize) {
        self.membership_write_budget.store(n + 1, Ordering::SeqCst);
    }

    pub fn clear_faults(&self) {
        self.membership_write_budget.store(0, Ordering::SeqCst);
    }

    fn take_membership_write(&self) -> StoreResult<()> {
        let outcome = self
            .membership_write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                0 | 1 => None,
                n => Some(n - 1),
            });

        match outcome {
            Ok(_) => Ok(()),
            Err(0) => Ok(()),
            Err(_) => Err(StoreError::Backend(anyhow::anyhow!(
                "injected membership write failure"
            ))),
        }
    }
}

#[async_trait]
impl UserTable for MemoryStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.phone_number.as_deref() == Some(phone_number))
            .cloned())
    }

    async fn put_if_absent(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.user_id) {
            return Err(StoreError::ConditionFailed(UniqueField::UserId));
        }

        // Same rules as UNIQUE columns: absent values never collide.
        let email = user.email.as_deref();
        if email.is_some() && users.values().any(|u| u.email.as_deref() == email) {
            return Err(StoreError::ConditionFailed(UniqueField::Email));
        }
        let phone = user.phone_number.as_deref();
        if phone.is_some() && users.values().any(|u| u.phone_number.as_deref() == phone) {
            return Err(StoreError::ConditionFailed(UniqueField::PhoneNumber));
        }

        users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn put(&self, user: &User) -> StoreResult<()> {
        self.users
            .write()
            .await
            .insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> StoreResult<()> {
        self.users.write().await.remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl MembershipTable for MemoryStore {
    async fn conversation_ids(&self, user_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.conversation_id.clone())
            .collect())
    }

    async fn member_ids(&self, conversation_id: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .filter(|r| r.conversation_id == conversation_id)
            .map(|r| r.user_id.clone())
            .collect())
    }

    async fn put(&self, record: &MembershipRecord) -> StoreResult<()> {
        self.take_membership_write()?;
        let mut memberships = self.memberships.write().await;
        if !memberships.contains(record) {
            memberships.push(record.clone());
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str, conversation_id: &str) -> StoreResult<()> {
        self.memberships
            .write()
            .await
            .retain(|r| !(r.user_id == user_id && r.conversation_id == conversation_id));
        Ok(())
    }
}

#[async_trait]
impl MessageTable for MemoryStore {
    async fn put(&self, message: &Message) -> StoreResult<()> {
        self.messages
            .write()
            .await
            .entry(message.conversation_id.clone())
            .or_default()
            .insert(message.timestamp, message.clone());
        Ok(())
    }

    async fn list(
        &self,
        conversation_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Message>> {
        let messages = self.messages.read().await;
        let Some(log) = messages.get(conversation_id) else {
            return Ok(vec![]);
        };

        Ok(log
            .values()
            .filter(|m| since.is_none_or(|s| m.timestamp > s))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(id: &str, email: &str) -> User {
        User {
            user_id: id.into(),
            email: Some(email.into()),
            phone_number: None,
            display_name: id.into(),
            push_token: None,
        }
    }

    #[tokio::test]
    async fn put_if_absent_rejects_existing_id() {
        let store = MemoryStore::new();
        store.put_if_absent(&user("a", "a@example.com")).await.unwrap();

        let err = store
            .put_if_absent(&user("a", "other@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed(UniqueField::UserId)));
        assert_eq!(
            store.find_by_email("a@example.com").await.unwrap().unwrap().user_id,
            "a"
        );
    }

    #[tokio::test]
    async fn put_if_absent_rejects_shared_contact() {
        let store = MemoryStore::new();
        store.put_if_absent(&user("a", "a@example.com")).await.unwrap();

        let err = store.put_if_absent(&user("b", "a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed(UniqueField::Email)));

        let mut phoned = user("c", "c@example.com");
        phoned.phone_number = Some("+12125551234".into());
        store.put_if_absent(&phoned).await.unwrap();

        let mut clash = user("d", "d@example.com");
        clash.phone_number = Some("+12125551234".into());
        let err = store.put_if_absent(&clash).await.unwrap_err();
        assert!(matches!(err, StoreError::ConditionFailed(UniqueField::PhoneNumber)));

        // Users without a phone number never collide on it.
        store.put_if_absent(&user("e", "e@example.com")).await.unwrap();
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("d").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn members_keep_join_order() {
        let store = MemoryStore::new();
        for uid in ["c", "a", "b"] {
            MembershipTable::put(
                &store,
                &MembershipRecord { user_id: uid.into(), conversation_id: "x".into() },
            )
            .await
            .unwrap();
        }
        assert_eq!(store.member_ids("x").await.unwrap(), vec!["c", "a", "b"]);

        MembershipTable::delete(&store, "a", "x").await.unwrap();
        assert_eq!(store.member_ids("x").await.unwrap(), vec!["c", "b"]);
        assert!(store.conversation_ids("a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_sorted_and_filtered() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        for (i, body) in ["second", "first", "third"].iter().enumerate() {
            let offset = match i {
                0 => 1,
                1 => 0,
                _ => 2,
            };
            MessageTable::put(
                &store,
                &Message {
                    conversation_id: "x".into(),
                    sender_id: "a".into(),
                    message: body.to_string(),
                    timestamp: t0 + Duration::seconds(offset),
                },
            )
            .await
            .unwrap();
        }

        let all = store.list("x", None).await.unwrap();
        let bodies: Vec<_> = all.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);

        let later = store.list("x", Some(t0)).await.unwrap();
        assert_eq!(later.len(), 2);
        assert!(store.list("missing", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_membership_failures() {
        let store = MemoryStore::new();
        store.fail_membership_writes_after(1);
        let rec = |u: &str| MembershipRecord { user_id: u.into(), conversation_id: "x".into() };

        assert!(MembershipTable::put(&store, &rec("a")).await.is_ok());
        assert!(MembershipTable::put(&store, &rec("b")).await.is_err());
        assert!(MembershipTable::put(&store, &rec("c")).await.is_err());

        store.clear_faults();
        assert!(MembershipTable::put(&store, &rec("c")).await.is_ok());
        assert_eq!(store.member_ids("x").await.unwrap(), vec!["a", "c"]);
    }
}
