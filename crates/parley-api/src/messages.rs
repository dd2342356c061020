use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_types::api::{Claims, PostMessageRequest, SendPushRequest, SendPushResponse};

use crate::error::ApiResult;
use crate::state::AppState;

/// The timestamp is always assigned by the server on this path.
pub async fn post_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let message = state
        .service
        .post_message(&conversation_id, &claims.sub, &req.message, None)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn send_push_notifications(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendPushRequest>,
) -> ApiResult<impl IntoResponse> {
    let sent = state
        .service
        .send_push_notifications(&conversation_id, &claims.sub, &req.message, req.dry_run)
        .await?;
    Ok(Json(SendPushResponse {
        recipient_ids: sent.into_iter().map(|n| n.recipient_id).collect(),
    }))
}
