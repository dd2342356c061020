use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, info};

use parley_types::models::User;

use crate::error::{ConversationError, Result, StoreError, UniqueField};
use crate::phone::{self, PhoneRegion};
use crate::store::UserTable;

/// Maps user identity to profile. Owns email and phone uniqueness.
#[derive(Clone)]
pub struct UserDirectory {
    users: Arc<dyn UserTable>,
    region: PhoneRegion,
}

impl UserDirectory {
    pub fn new(users: Arc<dyn UserTable>, region: PhoneRegion) -> Self {
        Self { users, region }
    }

    /// Absent ids yield `None`, never an error.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.users.get(user_id).await?)
    }

    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_by_email(email).await?)
    }

    /// Input is normalized first; a number that cannot be parsed matches
    /// nobody.
    pub async fn lookup_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        match phone::normalize_phone(phone_number, self.region) {
            Some(normalized) => Ok(self.users.find_by_phone(&normalized).await?),
            None => Ok(None),
        }
    }

    pub async fn register_with_email(
        &self,
        user_id: &str,
        email: &str,
        display_name: &str,
        push_token: Option<String>,
    ) -> Result<User> {
        if user_id.is_empty() || email.is_empty() || display_name.is_empty() {
            return Err(ConversationError::invalid_input(
                "Invalid parameters to call registerUserWithEmail",
            ));
        }
        if !phone::is_valid_email(email) {
            return Err(ConversationError::InvalidEmail(email.to_string()));
        }

        // Fast path only; the conditional put below is authoritative for ids.
        if let Some(existing) = self.users.find_by_email(email).await? {
            return Err(if existing.user_id == user_id {
                ConversationError::DuplicateUser
            } else {
                ConversationError::DuplicateEmail(email.to_string())
            });
        }

        let user = User {
            user_id: user_id.to_string(),
            email: Some(email.to_string()),
            phone_number: None,
            display_name: display_name.to_string(),
            push_token,
        };
        self.insert(&user).await?;

        info!("Registered user {} with email", user_id);
        Ok(user)
    }

    pub async fn register_with_phone(
        &self,
        user_id: &str,
        phone_number: &str,
        display_name: &str,
        push_token: Option<String>,
    ) -> Result<User> {
        if user_id.is_empty() || phone_number.is_empty() || display_name.is_empty() {
            return Err(ConversationError::invalid_input(
                "Invalid parameters to call registerUserWithPhoneNumber",
            ));
        }
        let normalized = phone::normalize_phone(phone_number, self.region)
            .ok_or_else(|| ConversationError::InvalidPhoneNumber(phone_number.to_string()))?;

        if let Some(existing) = self.users.find_by_phone(&normalized).await? {
            return Err(if existing.user_id == user_id {
                ConversationError::DuplicateUser
            } else {
                ConversationError::DuplicatePhone
            });
        }

        let user = User {
            user_id: user_id.to_string(),
            email: None,
            phone_number: Some(normalized),
            display_name: display_name.to_string(),
            push_token,
        };
        self.insert(&user).await?;

        info!("Registered user {} with phone number", user_id);
        Ok(user)
    }

    async fn insert(&self, user: &User) -> Result<()> {
        self.users.put_if_absent(user).await.map_err(|e| match e {
            StoreError::ConditionFailed(UniqueField::UserId) => ConversationError::DuplicateUser,
            StoreError::ConditionFailed(UniqueField::Email) => {
                ConversationError::DuplicateEmail(user.email.clone().unwrap_or_default())
            }
            StoreError::ConditionFailed(UniqueField::PhoneNumber) => {
                ConversationError::DuplicatePhone
            }
            other => other.into(),
        })
    }

    /// Change display name and/or push token. Email and phone are fixed.
    pub async fn update_user(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        push_token: Option<&str>,
    ) -> Result<User> {
        if display_name.is_none() && push_token.is_none() {
            return Err(ConversationError::invalid_input(
                "updateUser requires displayName or pushToken",
            ));
        }
        if display_name.is_some_and(str::is_empty) {
            return Err(ConversationError::invalid_input("displayName must not be empty"));
        }

        let mut user = self
            .users
            .get(user_id)
            .await?
            .ok_or(ConversationError::UnknownUser)?;

        if let Some(name) = display_name {
            user.display_name = name.to_string();
        }
        if let Some(token) = push_token {
            user.push_token = Some(token.to_string());
        }
        self.users.put(&user).await?;

        debug!("Updated user {}", user_id);
        Ok(user)
    }

    /// Idempotent. Historical messages keep the sender id.
    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.users.delete(user_id).await?;
        info!("Deleted user {}", user_id);
        Ok(())
    }

    /// Fetch several users concurrently. Every lookup runs to completion
    /// before the first error, if any, is returned.
    pub async fn get_users(&self, user_ids: &[String]) -> Result<Vec<Option<User>>> {
        join_all(user_ids.iter().map(|id| self.users.get(id)))
            .await
            .into_iter()
            .map(|r| r.map_err(ConversationError::from))
            .collect()
    }

    /// True iff every id resolves to an existing user.
    pub async fn validate_ids(&self, user_ids: &[String]) -> Result<bool> {
        if user_ids.iter().any(String::is_empty) {
            return Err(ConversationError::invalid_input(
                "validateUserIds requires non-empty ids",
            ));
        }
        let found = self.get_users(user_ids).await?;
        Ok(found.iter().all(Option::is_some))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::StoreResult;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryStore::new()), PhoneRegion::Us)
    }

    /// Contact lookups always miss, as if a concurrent registration landed
    /// between the lookup and the write.
    struct StaleLookups(MemoryStore);

    #[async_trait]
    impl UserTable for StaleLookups {
        async fn get(&self, user_id: &str) -> StoreResult<Option<User>> {
            self.0.get(user_id).await
        }

        async fn find_by_email(&self, _email: &str) -> StoreResult<Option<User>> {
            Ok(None)
        }

        async fn find_by_phone(&self, _phone_number: &str) -> StoreResult<Option<User>> {
            Ok(None)
        }

        async fn put_if_absent(&self, user: &User) -> StoreResult<()> {
            self.0.put_if_absent(user).await
        }

        async fn put(&self, user: &User) -> StoreResult<()> {
            UserTable::put(&self.0, user).await
        }

        async fn delete(&self, user_id: &str) -> StoreResult<()> {
            UserTable::delete(&self.0, user_id).await
        }
    }

    #[tokio::test]
    async fn register_and_get_by_email() {
        let dir = directory();
        let user = dir
            .register_with_email("u1", "mike@example.com", "Mike", None)
            .await
            .unwrap();
        assert_eq!(dir.get_user("u1").await.unwrap(), Some(user.clone()));
        assert_eq!(dir.lookup_by_email("mike@example.com").await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn register_with_phone_stores_e164() {
        let dir = directory();
        let user = dir
            .register_with_phone("u1", "(212) 555-1234", "Henry", Some("tok".into()))
            .await
            .unwrap();
        assert_eq!(user.phone_number.as_deref(), Some("+12125551234"));
        assert_eq!(user.push_token.as_deref(), Some("tok"));

        let found = dir.lookup_by_phone("+1 212 555 1234").await.unwrap().unwrap();
        assert_eq!(found.user_id, "u1");
    }

    #[tokio::test]
    async fn missing_lookups_are_none() {
        let dir = directory();
        assert!(dir.get_user("bad id").await.unwrap().is_none());
        assert!(dir.lookup_by_email("nobody@example.com").await.unwrap().is_none());
        assert!(dir.lookup_by_phone("+12125550000").await.unwrap().is_none());
        assert!(dir.lookup_by_phone("not a number").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let dir = directory();
        dir.register_with_email("u1", "a@example.com", "A", None).await.unwrap();
        let err = dir
            .register_with_email("u1", "b@example.com", "B", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User already exists");

        dir.register_with_phone("u2", "2125551234", "C", None).await.unwrap();
        let err = dir
            .register_with_phone("u2", "2125559999", "C", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User already exists");
    }

    #[tokio::test]
    async fn duplicate_email_and_phone_rejected() {
        let dir = directory();
        dir.register_with_email("u1", "a@example.com", "A", None).await.unwrap();
        let err = dir
            .register_with_email("u2", "a@example.com", "B", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User with email a@example.com already exists");

        dir.register_with_phone("u3", "2125551234", "C", None).await.unwrap();
        let err = dir
            .register_with_phone("u4", "+12125551234", "D", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User with phone number already exists");
    }

    #[tokio::test]
    async fn conditional_write_decides_duplicate_contact() {
        let dir = UserDirectory::new(Arc::new(StaleLookups(MemoryStore::new())), PhoneRegion::Us);
        dir.register_with_email("u1", "a@example.com", "A", None).await.unwrap();
        let err = dir
            .register_with_email("u2", "a@example.com", "B", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User with email a@example.com already exists");

        dir.register_with_phone("u3", "2125551234", "C", None).await.unwrap();
        let err = dir
            .register_with_phone("u4", "+1 212 555 1234", "D", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User with phone number already exists");

        let err = dir
            .register_with_email("u1", "new@example.com", "A", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User already exists");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_email_registers_once() {
        for _ in 0..100 {
            let dir = directory();
            let (d1, d2) = (dir.clone(), dir.clone());
            let first = tokio::spawn(async move {
                d1.register_with_email("u1", "race@example.com", "A", None).await
            });
            let second = tokio::spawn(async move {
                d2.register_with_email("u2", "race@example.com", "B", None).await
            });

            let results = [first.await.unwrap(), second.await.unwrap()];
            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            let err = results.into_iter().find_map(|r| r.err()).unwrap();
            assert_eq!(err.to_string(), "User with email race@example.com already exists");
        }
    }

    #[tokio::test]
    async fn invalid_registrations() {
        let dir = directory();
        let err = dir.register_with_email("", "", "", None).await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidInput(_)));

        let err = dir
            .register_with_email("u1", "not-an-email", "A", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid email not-an-email");

        let err = dir
            .register_with_phone("u1", "INVALID_PHONE_NUMBER", "A", None)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid phone number"));
    }

    #[tokio::test]
    async fn update_user_fields() {
        let dir = directory();
        dir.register_with_phone("u1", "2125551234", "Old", Some("1234".into()))
            .await
            .unwrap();

        dir.update_user("u1", Some("Austin"), None).await.unwrap();
        let user = dir.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.display_name, "Austin");
        assert_eq!(user.push_token.as_deref(), Some("1234"));
        assert_eq!(user.phone_number.as_deref(), Some("+12125551234"));

        dir.update_user("u1", None, Some("56789")).await.unwrap();
        let user = dir.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.display_name, "Austin");
        assert_eq!(user.push_token.as_deref(), Some("56789"));

        let err = dir.update_user("ghost", Some("Austin"), None).await.unwrap_err();
        assert_eq!(err.to_string(), "User does not exist");

        let err = dir.update_user("u1", None, None).await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = directory();
        dir.register_with_email("u1", "a@example.com", "A", None).await.unwrap();
        dir.delete_user("u1").await.unwrap();
        dir.delete_user("u1").await.unwrap();
        assert!(dir.get_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn validate_ids() {
        let dir = directory();
        assert!(!dir.validate_ids(&["ghost".to_string()]).await.unwrap());

        dir.register_with_email("u1", "a@example.com", "A", None).await.unwrap();
        dir.register_with_email("u2", "b@example.com", "B", None).await.unwrap();
        assert!(dir.validate_ids(&["u1".to_string(), "u2".to_string()]).await.unwrap());
        assert!(!dir.validate_ids(&["u1".to_string(), "ghost".to_string()]).await.unwrap());
        assert!(dir.validate_ids(&[String::new()]).await.is_err());
    }
}
