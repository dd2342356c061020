//! The conversation service: sole writer of membership and message
//! records. Every business rule is checked here before anything is
//! written; the storage layer below enforces none of them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use parley_types::models::{ConversationView, Message, MessageView, User};
use parley_types::notifications::{PushData, PushNotification};

use crate::directory::UserDirectory;
use crate::error::{ConversationError, Result};
use crate::membership::MembershipIndex;
use crate::messages::MessageStore;
use crate::notify::Notifier;
use crate::phone::PhoneRegion;
use crate::resolver::ConversationResolver;
use crate::store::Storage;

/// A user to register in a batch. Phone registration is used when a phone
/// number is present, email otherwise.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub user_id: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: String,
    pub push_token: Option<String>,
}

/// Stateless between calls; cloning is cheap and clones share the
/// underlying store.
#[derive(Clone)]
pub struct ConversationService {
    directory: UserDirectory,
    membership: MembershipIndex,
    resolver: ConversationResolver,
    messages: MessageStore,
    notifier: Arc<dyn Notifier>,
}

impl ConversationService {
    pub fn new<S>(store: Arc<S>, notifier: Arc<dyn Notifier>, region: PhoneRegion) -> Self
    where
        S: Storage + 'static,
    {
        let directory = UserDirectory::new(store.clone(), region);
        let membership = MembershipIndex::new(store.clone());
        let resolver = ConversationResolver::new(directory.clone(), membership.clone());
        Self {
            directory,
            membership,
            resolver,
            messages: MessageStore::new(store),
            notifier,
        }
    }

    // -- Users --

    pub async fn register_user_with_email(
        &self,
        user_id: &str,
        email: &str,
        display_name: &str,
        push_token: Option<String>,
    ) -> Result<User> {
        self.directory
            .register_with_email(user_id, email, display_name, push_token)
            .await
    }

    pub async fn register_user_with_phone_number(
        &self,
        user_id: &str,
        phone_number: &str,
        display_name: &str,
        push_token: Option<String>,
    ) -> Result<User> {
        self.directory
            .register_with_phone(user_id, phone_number, display_name, push_token)
            .await
    }

    /// Registers every user concurrently; all attempts finish before the
    /// first failure, if any, is returned.
    pub async fn register_users(&self, users: Vec<NewUser>) -> Result<Vec<User>> {
        join_all(users.into_iter().map(|u| async move {
            match u.phone_number {
                Some(phone) => {
                    self.register_user_with_phone_number(
                        &u.user_id,
                        &phone,
                        &u.display_name,
                        u.push_token,
                    )
                    .await
                }
                None => {
                    let email = u.email.unwrap_or_default();
                    self.register_user_with_email(&u.user_id, &email, &u.display_name, u.push_token)
                        .await
                }
            }
        }))
        .await
        .into_iter()
        .collect()
    }

    pub async fn update_user(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        push_token: Option<&str>,
    ) -> Result<User> {
        self.directory.update_user(user_id, display_name, push_token).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.directory.delete_user(user_id).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.directory.get_user(user_id).await
    }

    pub async fn lookup_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.directory.lookup_by_email(email).await
    }

    pub async fn lookup_user_by_phone_number(&self, phone_number: &str) -> Result<Option<User>> {
        self.directory.lookup_by_phone(phone_number).await
    }

    pub async fn validate_user_ids(&self, user_ids: &[String]) -> Result<bool> {
        self.directory.validate_ids(user_ids).await
    }

    // -- Membership --

    /// Returns the id of the conversation serving exactly `user_id` plus
    /// `others`, creating it when none exists.
    pub async fn initiate_conversation(&self, user_id: &str, others: &[String]) -> Result<String> {
        Ok(self
            .resolver
            .resolve(user_id, others)
            .await?
            .into_conversation_id())
    }

    /// Joining a conversation whose members have all left is allowed; it
    /// is how orphaned history becomes reachable again.
    pub async fn join_conversation(&self, user_id: &str, conversation_id: &str) -> Result<()> {
        require_ids(user_id, conversation_id, "joinConversation")?;

        if self.directory.get_user(user_id).await?.is_none() {
            return Err(ConversationError::UnknownUser);
        }
        if self.membership.is_member(user_id, conversation_id).await? {
            return Err(ConversationError::AlreadyMember);
        }
        self.membership.add_member(user_id, conversation_id).await?;

        info!("User {} joined conversation {}", user_id, conversation_id);
        Ok(())
    }

    /// Message history is kept even when the last member leaves.
    pub async fn remove_from_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<()> {
        require_ids(user_id, conversation_id, "removeFromConversation")?;

        if !self.membership.is_member(user_id, conversation_id).await? {
            return Err(ConversationError::NotMember);
        }
        self.membership.remove_member(user_id, conversation_id).await?;

        info!("User {} left conversation {}", user_id, conversation_id);
        Ok(())
    }

    pub async fn existing_conversation_id_amongst_users(
        &self,
        user_ids: &[String],
    ) -> Result<Option<String>> {
        self.resolver.existing_conversation(user_ids).await
    }

    pub async fn get_conversation_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.membership.conversations_of(user_id).await
    }

    /// Live profiles of the members, in join order. Members whose user
    /// record has been deleted are left out.
    pub async fn get_conversation_users(&self, conversation_id: &str) -> Result<Vec<User>> {
        let member_ids = self.membership.members_of(conversation_id).await?;
        self.resolve_members(&member_ids).await
    }

    /// `get_conversation_users` on behalf of a caller, who must be a member.
    pub async fn get_conversation_users_for(
        &self,
        conversation_id: &str,
        requesting_user_id: &str,
    ) -> Result<Vec<User>> {
        require_ids(requesting_user_id, conversation_id, "getConversationUsers")?;

        let member_ids = self.membership.members_of(conversation_id).await?;
        if !member_ids.iter().any(|m| m == requesting_user_id) {
            return Err(ConversationError::NotMember);
        }
        self.resolve_members(&member_ids).await
    }

    async fn resolve_members(&self, member_ids: &[String]) -> Result<Vec<User>> {
        Ok(self
            .directory
            .get_users(member_ids)
            .await?
            .into_iter()
            .flatten()
            .collect())
    }

    // -- Messages --

    /// Full view of a conversation for one of its members. Senders are
    /// resolved against the directory at read time, so profile changes show
    /// up in earlier messages too. With `since`, only later messages are
    /// included; members are always complete.
    pub async fn get_conversation(
        &self,
        conversation_id: &str,
        requesting_user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<ConversationView> {
        if conversation_id.is_empty() || requesting_user_id.is_empty() {
            return Err(ConversationError::invalid_input(
                "invalid parameters for getConversation",
            ));
        }

        let member_ids = self.membership.members_of(conversation_id).await?;
        if !member_ids.iter().any(|m| m == requesting_user_id) {
            return Err(ConversationError::NotMember);
        }

        let (members, messages) = tokio::join!(
            self.resolve_members(&member_ids),
            self.messages.history(conversation_id, since),
        );
        let (members, messages) = (members?, messages?);

        let messages = self.with_live_senders(messages).await?;
        debug!(
            "Loaded conversation {} ({} members, {} messages)",
            conversation_id,
            members.len(),
            messages.len()
        );

        Ok(ConversationView {
            conversation_id: conversation_id.to_string(),
            members,
            messages,
        })
    }

    async fn with_live_senders(&self, messages: Vec<Message>) -> Result<Vec<MessageView>> {
        let mut seen = HashSet::new();
        let sender_ids: Vec<String> = messages
            .iter()
            .filter(|m| seen.insert(m.sender_id.as_str()))
            .map(|m| m.sender_id.clone())
            .collect();

        let profiles: HashMap<String, User> = self
            .directory
            .get_users(&sender_ids)
            .await?
            .into_iter()
            .flatten()
            .map(|u| (u.user_id.clone(), u))
            .collect();

        Ok(messages
            .into_iter()
            .map(|m| {
                let sender = profiles.get(&m.sender_id).cloned();
                MessageView::new(m, sender)
            })
            .collect())
    }

    /// Every conversation the user currently belongs to. Order across
    /// conversations is unspecified.
    pub async fn get_conversation_history(&self, user_id: &str) -> Result<Vec<ConversationView>> {
        let conversation_ids = self.membership.conversations_of(user_id).await?;
        join_all(
            conversation_ids
                .iter()
                .map(|cid| self.get_conversation(cid, user_id, None)),
        )
        .await
        .into_iter()
        .collect()
    }

    /// Append a message. Server-assigned timestamps strictly increase, so
    /// posts never overwrite each other. `timestamp` overrides the post time
    /// for replay and tests, and replaces any message already stored at that
    /// instant. Members with a push token are notified in a
    /// detached task whose failure never affects the post.
    pub async fn post_message(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<MessageView> {
        if sender_id.is_empty() {
            return Err(ConversationError::invalid_input("sender must be set"));
        }
        if conversation_id.is_empty() {
            return Err(ConversationError::invalid_input("conversationId must be set"));
        }

        let sender = self
            .directory
            .get_user(sender_id)
            .await?
            .ok_or(ConversationError::UnknownSender)?;

        let conversation_ids = self.membership.conversations_of(&sender.user_id).await?;
        if !conversation_ids.iter().any(|c| c == conversation_id) {
            return Err(ConversationError::SenderNotMember);
        }

        let message = Message {
            conversation_id: conversation_id.to_string(),
            sender_id: sender.user_id.clone(),
            message: body.to_string(),
            timestamp: timestamp.unwrap_or_else(|| self.messages.next_timestamp()),
        };
        self.messages.append(&message).await?;
        debug!("Stored message from {} in {}", sender_id, conversation_id);

        let this = self.clone();
        let (cid, sid, text) = (
            conversation_id.to_string(),
            sender_id.to_string(),
            body.to_string(),
        );
        tokio::spawn(async move {
            if let Err(e) = this.send_push_notifications(&cid, &sid, &text, false).await {
                warn!("Push notifications for {} failed: {}", cid, e);
            }
        });

        Ok(MessageView::new(message, Some(sender)))
    }

    /// Build one notification per other member holding a push token and,
    /// unless `dry_run`, hand them to the notifier. Individual delivery
    /// failures are logged; the built notifications are returned either way.
    pub async fn send_push_notifications(
        &self,
        conversation_id: &str,
        sender_id: &str,
        body: &str,
        dry_run: bool,
    ) -> Result<Vec<PushNotification>> {
        let sender = self
            .directory
            .get_user(sender_id)
            .await?
            .ok_or(ConversationError::UnknownSender)?;

        let member_ids = self.membership.members_of(conversation_id).await?;
        if !member_ids.iter().any(|m| m == sender_id) {
            return Err(ConversationError::SenderNotMember);
        }

        let recipients: Vec<String> = member_ids.into_iter().filter(|m| m != sender_id).collect();
        let title = PushNotification::title_for(&sender.display_name);
        let notifications: Vec<PushNotification> = self
            .resolve_members(&recipients)
            .await?
            .into_iter()
            .filter_map(|user| {
                let token = user.push_token?;
                Some(PushNotification {
                    recipient_id: user.user_id,
                    token,
                    title: title.clone(),
                    body: body.to_string(),
                    data: PushData {
                        conversation_id: conversation_id.to_string(),
                        sender_id: sender_id.to_string(),
                    },
                })
            })
            .collect();

        if dry_run {
            return Ok(notifications);
        }

        let results = join_all(notifications.iter().map(|n| self.notifier.send(n.clone()))).await;
        for (n, result) in notifications.iter().zip(results) {
            if let Err(e) = result {
                warn!("Push to {} failed: {}", n.recipient_id, e);
            }
        }

        Ok(notifications)
    }
}

fn require_ids(user_id: &str, conversation_id: &str, op: &str) -> Result<()> {
    if user_id.is_empty() || conversation_id.is_empty() {
        return Err(ConversationError::invalid_input(format!(
            "{} requires userId and conversationId",
            op
        )));
    }
    Ok(())
}
