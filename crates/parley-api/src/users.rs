use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use parley_types::api::{
    Claims, EmailQuery, PhoneNumberQuery, RegisterRequest, UpdateUserRequest, UserIdsRequest,
    ValidateUserIdsResponse,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Identity (id, email, name) comes from the token; only the push token is
/// taken from the body.
pub async fn register_with_email(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = claims.email.as_deref().ok_or(ApiError::MissingClaim("email"))?;
    let name = claims.name.as_deref().ok_or(ApiError::MissingClaim("name"))?;

    let user = state
        .service
        .register_user_with_email(&claims.sub, email, name, req.push_token)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn register_with_phone_number(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let phone = claims
        .phone_number
        .as_deref()
        .ok_or(ApiError::MissingClaim("phone_number"))?;
    let name = claims.name.as_deref().ok_or(ApiError::MissingClaim("name"))?;

    let user = state
        .service
        .register_user_with_phone_number(&claims.sub, phone, name, req.push_token)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .service
        .update_user(&claims.sub, req.display_name.as_deref(), req.push_token.as_deref())
        .await?;
    Ok(Json(user))
}

pub async fn delete_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    state.service.delete_user(&claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Absent users come back as `null`, not 404.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.get_user(&user_id).await?))
}

pub async fn lookup_by_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.lookup_user_by_email(&query.email).await?))
}

pub async fn lookup_by_phone_number(
    State(state): State<AppState>,
    Query(query): Query<PhoneNumberQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .service
            .lookup_user_by_phone_number(&query.phone_number)
            .await?,
    ))
}

pub async fn validate_user_ids(
    State(state): State<AppState>,
    Json(req): Json<UserIdsRequest>,
) -> ApiResult<impl IntoResponse> {
    let valid = state.service.validate_user_ids(&req.user_ids).await?;
    Ok(Json(ValidateUserIdsResponse { valid }))
}
