use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use parley_core::{ConversationError, ErrorKind};
use parley_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid identity token")]
    Unauthorized,

    #[error("Identity token has no {0} claim")]
    MissingClaim(&'static str),

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::MissingClaim(_) => StatusCode::BAD_REQUEST,
            Self::Conversation(e) => match e.kind() {
                ErrorKind::InvalidInput | ErrorKind::InvalidParticipants => {
                    StatusCode::BAD_REQUEST
                }
                ErrorKind::DuplicateIdentity | ErrorKind::AlreadyMember => StatusCode::CONFLICT,
                ErrorKind::NotMember => StatusCode::FORBIDDEN,
                ErrorKind::UnknownUser | ErrorKind::UnknownSender => StatusCode::NOT_FOUND,
                ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (ConversationError::InvalidParticipants, StatusCode::BAD_REQUEST),
            (ConversationError::DuplicateUser, StatusCode::CONFLICT),
            (ConversationError::AlreadyMember, StatusCode::CONFLICT),
            (ConversationError::SenderNotMember, StatusCode::FORBIDDEN),
            (ConversationError::UnknownSender, StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }
}
