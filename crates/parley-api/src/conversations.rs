use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_types::api::{
    Claims, ConversationIdResponse, ConversationQuery, InitiateConversationRequest,
    UserIdsRequest,
};

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn initiate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<InitiateConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = state
        .service
        .initiate_conversation(&claims.sub, &req.others)
        .await?;
    Ok(Json(ConversationIdResponse {
        conversation_id: Some(conversation_id),
    }))
}

pub async fn existing_among_users(
    State(state): State<AppState>,
    Json(req): Json<UserIdsRequest>,
) -> ApiResult<impl IntoResponse> {
    let conversation_id = state
        .service
        .existing_conversation_id_amongst_users(&req.user_ids)
        .await?;
    Ok(Json(ConversationIdResponse { conversation_id }))
}

pub async fn list_ids(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.get_conversation_ids(&claims.sub).await?))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.get_conversation_history(&claims.sub).await?))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<ConversationQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let view = state
        .service
        .get_conversation(&conversation_id, &claims.sub, query.since)
        .await?;
    Ok(Json(view))
}

pub async fn users(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let users = state
        .service
        .get_conversation_users_for(&conversation_id, &claims.sub)
        .await?;
    Ok(Json(users))
}

pub async fn join(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .service
        .join_conversation(&claims.sub, &conversation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state
        .service
        .remove_from_conversation(&claims.sub, &conversation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
