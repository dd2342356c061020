use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use parley_api::{AppStateInner, router};
use parley_core::notify::LogNotifier;
use parley_core::phone::PhoneRegion;
use parley_core::{ConversationService, MemoryStore};
use parley_types::api::Claims;

const SECRET: &str = "test-secret";

fn app() -> Router {
    let service = ConversationService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(LogNotifier),
        PhoneRegion::Us,
    );
    router(AppStateInner::new(service, SECRET))
}

fn token(sub: &str, email: Option<&str>, phone: Option<&str>, name: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: email.map(str::to_string),
        phone_number: phone.map(str::to_string),
        name: Some(name.to_string()),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn rejects_missing_or_bad_tokens() {
    let app = app();
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/conversations").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/conversations", "not-a-jwt", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_conversation_over_http() {
    let app = app();
    let mike = token("mike", Some("mike@example.com"), None, "Mike");
    let henry = token("henry", None, Some("+12125550199"), "Henry");
    let eve = token("eve", Some("eve@example.com"), None, "Eve");

    let (status, body) = call(&app, Method::POST, "/users/register/email", &mike, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["userId"], "mike");

    let (status, body) = call(
        &app,
        Method::POST,
        "/users/register/phone",
        &henry,
        Some(json!({ "pushToken": "tok-henry" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["phoneNumber"], "+12125550199");

    let (status, _) = call(&app, Method::POST, "/users/register/email", &eve, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/conversations",
        &mike,
        Some(json!({ "others": ["henry"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cid = body["conversationId"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/conversations/{}/messages", cid),
        &mike,
        Some(json!({ "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["sender"]["userId"], "mike");

    let (status, body) = call(&app, Method::GET, &format!("/conversations/{}", cid), &henry, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][0]["message"], "hi");

    let (status, body) = call(&app, Method::GET, &format!("/conversations/{}", cid), &eve, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "User is not part of conversation");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/conversations/{}/push", cid),
        &mike,
        Some(json!({ "message": "ping", "dryRun": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["recipientIds"], json!(["henry"]));
    assert!(!body.to_string().contains("tok-henry"));
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = app();
    let a = token("a", Some("a@example.com"), None, "A");
    let b = token("b", Some("a@example.com"), None, "B");

    call(&app, Method::POST, "/users/register/email", &a, Some(json!({}))).await;
    let (status, body) = call(&app, Method::POST, "/users/register/email", &b, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User with email a@example.com already exists");

    let no_email = token("c", None, None, "C");
    let (status, _) = call(&app, Method::POST, "/users/register/email", &no_email, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lookups_return_null_when_absent() {
    let app = app();
    let a = token("a", Some("a@example.com"), None, "A");

    let (status, body) = call(&app, Method::GET, "/users/nobody", &a, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    call(&app, Method::POST, "/users/register/email", &a, Some(json!({}))).await;
    let (_, body) = call(&app, Method::GET, "/users/lookup/email?email=a@example.com", &a, None).await;
    assert_eq!(body["userId"], "a");

    let (_, body) = call(
        &app,
        Method::POST,
        "/users/validate",
        &a,
        Some(json!({ "userIds": ["a", "ghost"] })),
    )
    .await;
    assert_eq!(body["valid"], false);
}

#[tokio::test]
async fn leaving_blocks_posting() {
    let app = app();
    let a = token("a", Some("a@example.com"), None, "A");
    let b = token("b", Some("b@example.com"), None, "B");
    call(&app, Method::POST, "/users/register/email", &a, Some(json!({}))).await;
    call(&app, Method::POST, "/users/register/email", &b, Some(json!({}))).await;

    let (_, body) = call(&app, Method::POST, "/conversations", &a, Some(json!({ "others": ["b"] }))).await;
    let cid = body["conversationId"].as_str().unwrap().to_string();

    let (status, _) = call(&app, Method::POST, &format!("/conversations/{}/leave", cid), &b, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/conversations/{}/messages", cid),
        &b,
        Some(json!({ "message": "hello?" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Sender is not part of the conversation");

    let (status, _) = call(&app, Method::POST, &format!("/conversations/{}/join", cid), &b, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = call(&app, Method::POST, &format!("/conversations/{}/join", cid), &b, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User already part of conversation");
}

#[tokio::test]
async fn push_tokens_stay_private() {
    let app = app();
    let a = token("a", Some("a@example.com"), None, "A");
    let b = token("b", Some("b@example.com"), None, "B");
    let eve = token("eve", Some("eve@example.com"), None, "Eve");
    for t in [&a, &b, &eve] {
        call(&app, Method::POST, "/users/register/email", t, Some(json!({ "pushToken": "secret" }))).await;
    }

    let (_, body) = call(&app, Method::GET, "/users/b", &a, None).await;
    assert_eq!(body["userId"], "b");
    assert!(body.get("pushToken").is_none());

    let (_, body) = call(&app, Method::GET, "/users/lookup/email?email=b@example.com", &a, None).await;
    assert!(body.get("pushToken").is_none());

    let (_, body) = call(&app, Method::POST, "/conversations", &a, Some(json!({ "others": ["b"] }))).await;
    let cid = body["conversationId"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::GET, &format!("/conversations/{}/users", cid), &b, None).await;
    assert_eq!(status, StatusCode::OK);
    let members = body.as_array().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|m| m.get("pushToken").is_none()));

    let (_, body) = call(&app, Method::GET, &format!("/conversations/{}", cid), &a, None).await;
    assert!(body["members"].as_array().unwrap().iter().all(|m| m.get("pushToken").is_none()));

    let (status, body) = call(&app, Method::GET, &format!("/conversations/{}/users", cid), &eve, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "User is not part of conversation");
}
