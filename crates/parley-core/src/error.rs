use std::fmt;

use thiserror::Error;

/// A user attribute that must be unique across all users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    UserId,
    Email,
    PhoneNumber,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UserId => "user_id",
            Self::Email => "email",
            Self::PhoneNumber => "phone_number",
        })
    }
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write collided with an existing record on this field.
    #[error("Conditional write failed on {0}")]
    ConditionFailed(UniqueField),

    /// Transient or unexpected backend failure. Propagated unchanged so the
    /// caller can decide whether to retry.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Failures returned by the conversation core. Display strings are stable
/// and suitable for showing to users.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Invalid email {0}")]
    InvalidEmail(String),

    #[error("Invalid phone number {0}")]
    InvalidPhoneNumber(String),

    #[error("UserIds not valid")]
    InvalidParticipants,

    #[error("User already exists")]
    DuplicateUser,

    #[error("User with email {0} already exists")]
    DuplicateEmail(String),

    #[error("User with phone number already exists")]
    DuplicatePhone,

    #[error("User does not exist")]
    UnknownUser,

    #[error("User already part of conversation")]
    AlreadyMember,

    #[error("User is not part of conversation")]
    NotMember,

    #[error("Sender is not part of the conversation")]
    SenderNotMember,

    #[error("Sender is not valid")]
    UnknownSender,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InvalidParticipants,
    DuplicateIdentity,
    UnknownUser,
    AlreadyMember,
    NotMember,
    UnknownSender,
    Storage,
}

impl ConversationError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::InvalidEmail(_) | Self::InvalidPhoneNumber(_) => {
                ErrorKind::InvalidInput
            }
            Self::InvalidParticipants => ErrorKind::InvalidParticipants,
            Self::DuplicateUser | Self::DuplicateEmail(_) | Self::DuplicatePhone => {
                ErrorKind::DuplicateIdentity
            }
            Self::UnknownUser => ErrorKind::UnknownUser,
            Self::AlreadyMember => ErrorKind::AlreadyMember,
            Self::NotMember | Self::SenderNotMember => ErrorKind::NotMember,
            Self::UnknownSender => ErrorKind::UnknownSender,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConversationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable() {
        assert_eq!(ConversationError::DuplicateUser.to_string(), "User already exists");
        assert_eq!(
            ConversationError::DuplicateEmail("a@example.com".into()).to_string(),
            "User with email a@example.com already exists"
        );
        assert_eq!(
            ConversationError::SenderNotMember.to_string(),
            "Sender is not part of the conversation"
        );
        assert_eq!(ConversationError::InvalidParticipants.to_string(), "UserIds not valid");
    }

    #[test]
    fn sender_not_member_is_not_member_kind() {
        assert_eq!(ConversationError::SenderNotMember.kind(), ErrorKind::NotMember);
        assert_eq!(
            ConversationError::InvalidPhoneNumber("x".into()).kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn condition_failure_names_the_field() {
        assert_eq!(
            StoreError::ConditionFailed(UniqueField::PhoneNumber).to_string(),
            "Conditional write failed on phone_number"
        );
    }

    #[test]
    fn storage_errors_pass_through() {
        let err: ConversationError =
            StoreError::Backend(anyhow::anyhow!("disk on fire")).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.to_string(), "disk on fire");
    }
}
