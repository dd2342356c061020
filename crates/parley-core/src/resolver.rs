//! Finds the conversation that serves exactly a group of users, or opens
//! a new one.
//!
//! Lookup and creation are not atomic. Two concurrent resolutions of the
//! same group can both miss and both create, leaving two conversations for
//! that group. Creation writes one membership record per participant
//! independently; a failure part way leaves some participants without the
//! record and a retry creates a fresh, complete conversation.

use std::collections::HashSet;

use futures_util::future::join_all;
use tracing::{debug, info};
use uuid::Uuid;

use crate::directory::UserDirectory;
use crate::error::{ConversationError, Result};
use crate::membership::MembershipIndex;

#[derive(Clone)]
pub struct ConversationResolver {
    directory: UserDirectory,
    membership: MembershipIndex,
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Existing(String),
    Created(String),
}

impl Resolution {
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::Existing(cid) | Self::Created(cid) => cid,
        }
    }

    pub fn into_conversation_id(self) -> String {
        match self {
            Self::Existing(cid) | Self::Created(cid) => cid,
        }
    }
}

impl ConversationResolver {
    pub fn new(directory: UserDirectory, membership: MembershipIndex) -> Self {
        Self {
            directory,
            membership,
        }
    }

    /// The single conversation whose membership equals `user_ids` as a set.
    ///
    /// Candidates come from intersecting every user's conversation set; each
    /// candidate's member list is then compared for equality, so a superset
    /// conversation never matches a subset query. Returns `None` unless
    /// exactly one candidate matches.
    pub async fn existing_conversation(&self, user_ids: &[String]) -> Result<Option<String>> {
        let candidates = self.membership.common_conversations(user_ids).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let wanted: HashSet<&str> = user_ids.iter().map(String::as_str).collect();
        let member_lists = join_all(candidates.iter().map(|cid| self.membership.members_of(cid)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let mut exact = candidates
            .into_iter()
            .zip(member_lists)
            .filter(|(_, members)| {
                let have: HashSet<&str> = members.iter().map(String::as_str).collect();
                have == wanted
            })
            .map(|(cid, _)| cid);

        match (exact.next(), exact.next()) {
            (Some(cid), None) => Ok(Some(cid)),
            (Some(_), Some(_)) => {
                debug!("Several conversations match {:?} exactly; treating as none", user_ids);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Resolve `initiator` plus `others` to a conversation, creating one if
    /// no conversation has exactly this membership.
    pub async fn resolve(&self, initiator: &str, others: &[String]) -> Result<Resolution> {
        let participants = participant_set(initiator, others)?;

        // Must run before anything else so nothing is allocated for
        // unknown users.
        if !self.directory.validate_ids(&participants).await? {
            return Err(ConversationError::InvalidParticipants);
        }

        if let Some(cid) = self.existing_conversation(&participants).await? {
            debug!("Reusing conversation {} for {:?}", cid, participants);
            return Ok(Resolution::Existing(cid));
        }

        let cid = Uuid::now_v7().to_string();
        join_all(participants.iter().map(|u| self.membership.add_member(u, &cid)))
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        info!("Created conversation {} with {} members", cid, participants.len());
        Ok(Resolution::Created(cid))
    }
}

/// `{initiator} ∪ others` with the initiator first and duplicates dropped.
fn participant_set(initiator: &str, others: &[String]) -> Result<Vec<String>> {
    if initiator.is_empty() {
        return Err(ConversationError::invalid_input(
            "initiateConversation requires a userId",
        ));
    }
    if others.iter().any(String::is_empty) {
        return Err(ConversationError::invalid_input(
            "initiateConversation requires non-empty participant ids",
        ));
    }
    if others.iter().any(|o| o == initiator) {
        return Err(ConversationError::invalid_input(
            "A user cannot start a conversation with themselves",
        ));
    }

    let mut seen = HashSet::new();
    let mut participants = vec![initiator.to_string()];
    seen.insert(initiator);
    for other in others {
        if seen.insert(other.as_str()) {
            participants.push(other.clone());
        }
    }

    if participants.len() < 2 {
        return Err(ConversationError::invalid_input(
            "A conversation needs at least two participants",
        ));
    }
    Ok(participants)
}
