use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::middleware::require_identity;
use crate::state::AppState;
use crate::{conversations, messages, users};

/// Every route requires a verified identity.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/users/register/email", post(users::register_with_email))
        .route("/users/register/phone", post(users::register_with_phone_number))
        .route("/users/me", patch(users::update_me).delete(users::delete_me))
        .route("/users/lookup/email", get(users::lookup_by_email))
        .route("/users/lookup/phone", get(users::lookup_by_phone_number))
        .route("/users/validate", post(users::validate_user_ids))
        .route("/users/{user_id}", get(users::get_user))
        .route(
            "/conversations",
            get(conversations::list_ids).post(conversations::initiate),
        )
        .route("/conversations/existing", post(conversations::existing_among_users))
        .route("/conversations/history", get(conversations::history))
        .route("/conversations/{conversation_id}", get(conversations::get_conversation))
        .route("/conversations/{conversation_id}/users", get(conversations::users))
        .route("/conversations/{conversation_id}/join", post(conversations::join))
        .route("/conversations/{conversation_id}/leave", post(conversations::leave))
        .route(
            "/conversations/{conversation_id}/messages",
            post(messages::post_message),
        )
        .route(
            "/conversations/{conversation_id}/push",
            post(messages::send_push_notifications),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_identity))
        .with_state(state)
}
