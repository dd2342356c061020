use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::debug;

use parley_types::models::MembershipRecord;

use crate::error::{ConversationError, Result};
use crate::store::MembershipTable;

/// user -> conversations and conversation -> members.
#[derive(Clone)]
pub struct MembershipIndex {
    table: Arc<dyn MembershipTable>,
}

impl MembershipIndex {
    pub fn new(table: Arc<dyn MembershipTable>) -> Self {
        Self { table }
    }

    pub async fn conversations_of(&self, user_id: &str) -> Result<Vec<String>> {
        if user_id.is_empty() {
            return Err(ConversationError::invalid_input(
                "getConversationIds requires a userId",
            ));
        }
        Ok(self.table.conversation_ids(user_id).await?)
    }

    /// Members in join order. The first member is the originator.
    pub async fn members_of(&self, conversation_id: &str) -> Result<Vec<String>> {
        Ok(self.table.member_ids(conversation_id).await?)
    }

    pub async fn is_member(&self, user_id: &str, conversation_id: &str) -> Result<bool> {
        Ok(self
            .members_of(conversation_id)
            .await?
            .iter()
            .any(|m| m == user_id))
    }

    pub async fn add_member(&self, user_id: &str, conversation_id: &str) -> Result<()> {
        self.table
            .put(&MembershipRecord {
                user_id: user_id.to_string(),
                conversation_id: conversation_id.to_string(),
            })
            .await?;
        debug!("Added {} to conversation {}", user_id, conversation_id);
        Ok(())
    }

    pub async fn remove_member(&self, user_id: &str, conversation_id: &str) -> Result<()> {
        self.table.delete(user_id, conversation_id).await?;
        debug!("Removed {} from conversation {}", user_id, conversation_id);
        Ok(())
    }

    /// Conversation ids shared by every user in `user_ids`, in the order
    /// they appear in the first user's set.
    ///
    /// Lookups run concurrently and all complete before any error is
    /// returned. An empty input is rejected rather than treated as "no
    /// match".
    pub async fn common_conversations(&self, user_ids: &[String]) -> Result<Vec<String>> {
        if user_ids.is_empty() {
            return Err(ConversationError::invalid_input(
                "existingConversationIdAmongstUsers requires at least one userId",
            ));
        }

        let sets = join_all(user_ids.iter().map(|u| self.conversations_of(u)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let mut iter = sets.into_iter();
        let mut common = iter.next().unwrap_or_default();
        for other in iter {
            let other: HashSet<String> = other.into_iter().collect();
            common.retain(|cid| other.contains(cid));
        }
        Ok(common)
    }
}
