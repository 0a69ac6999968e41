//! REST surface integration tests
//!
//! Drives the full router (auth middleware included) in-process with
//! `tower::ServiceExt::oneshot`; no listener is bound.
//!
//! ```bash
//! cargo test -p chatdesk-api --test http_api
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chatdesk_api::{auth::AuthUser, routes::create_router, gateway::UnavailableGateway};
use chatdesk_shared::{UserId, UserType};
use common::{FixedModel, Harness};
use serde_json::{json, Value};
use tower::ServiceExt;

// =============================================================================
// Test Utilities
// =============================================================================

fn user(user_type: UserType) -> AuthUser {
    AuthUser {
        user_id: UserId::new(),
        user_type,
    }
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

// =============================================================================
// Health and auth
// =============================================================================

#[tokio::test]
async fn health_endpoints_are_public() {
    let harness = Harness::new(FixedModel::default());
    let app = create_router(harness.state.clone());

    let (status, body) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["presence"]["active_connections"], 0);

    let (status, _) = call(&app, Method::GET, "/health/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_requires_valid_bearer_token() {
    let harness = Harness::new(FixedModel::default());
    let app = create_router(harness.state.clone());

    let (status, body) = call(&app, Method::GET, "/api/v1/rooms", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, body) = call(&app, Method::GET, "/api/v1/rooms", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
}

// =============================================================================
// Rooms and messages
// =============================================================================

#[tokio::test]
async fn customer_conversation_over_rest() {
    let harness = Harness::new(FixedModel::default());
    let app = create_router(harness.state.clone());
    let customer = user(UserType::Customer);
    let agent = user(UserType::Agent);
    let customer_token = harness.token(customer);
    let agent_token = harness.token(agent);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/rooms",
        Some(customer_token.as_str()),
        Some(json!({ "display_name": "Dana" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"], true);
    let room_id = body["room"]["id"].as_str().unwrap().to_string();

    // Second contact returns the same room
    let (status, body) = call(&app, Method::POST, "/api/v1/rooms", Some(customer_token.as_str()), Some(json!({ "display_name": "Dana" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["room"]["id"], room_id.as_str());

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/rooms/{room_id}/messages"),
        Some(customer_token.as_str()),
        Some(json!({ "content": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], "Hello");
    assert_eq!(body["user_type"], "customer");

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/rooms/{room_id}/messages"),
        Some(customer_token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/rooms/{room_id}/unread"),
        Some(agent_token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread_count"], 1);

    let (status, body) = call(&app, Method::GET, "/api/v1/rooms", Some(agent_token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], room_id.as_str());
    assert_eq!(body[0]["unread_count"], 1);
}

#[tokio::test]
async fn agent_only_routes_reject_customers() {
    let harness = Harness::new(FixedModel::default());
    let app = create_router(harness.state.clone());
    let customer = user(UserType::Customer);
    let token = harness.token(customer);
    let (room, _) = harness
        .state
        .chat
        .get_or_create_room(customer.user_id, "Dana")
        .await
        .unwrap();

    for (method, uri) in [
        (Method::GET, "/api/v1/rooms".to_string()),
        (Method::POST, format!("/api/v1/rooms/{}/close", room.id)),
        (Method::POST, format!("/api/v1/rooms/{}/mark-read", room.id)),
        (Method::GET, format!("/api/v1/rooms/{}/intents", room.id)),
        (Method::DELETE, format!("/api/v1/customers/{}", customer.user_id)),
    ] {
        let (status, _) = call(&app, method.clone(), &uri, Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
    }
}

#[tokio::test]
async fn customers_cannot_read_other_rooms() {
    let harness = Harness::new(FixedModel::default());
    let app = create_router(harness.state.clone());
    let owner = user(UserType::Customer);
    let (room, _) = harness
        .state
        .chat
        .get_or_create_room(owner.user_id, "Owner")
        .await
        .unwrap();

    let stranger = harness.token(user(UserType::Customer));
    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/v1/rooms/{}/messages", room.id),
        Some(stranger.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customers_do_not_see_deleted_messages() {
    let harness = Harness::new(FixedModel::default());
    let app = create_router(harness.state.clone());
    let customer = user(UserType::Customer);
    let customer_token = harness.token(customer);
    let agent_token = harness.token(user(UserType::Agent));
    let (room, _) = harness
        .state
        .chat
        .get_or_create_room(customer.user_id, "Dana")
        .await
        .unwrap();
    let sent = harness
        .state
        .chat
        .send(room.id, customer.user_id, UserType::Customer, "wrong card number", None)
        .await
        .unwrap();

    let (status, body) = call(
        &app,
        Method::DELETE,
        &format!("/api/v1/messages/{}", sent.message.id),
        Some(customer_token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_deleted"], true);

    let uri = format!("/api/v1/rooms/{}/messages", room.id);
    let (_, customer_view) = call(&app, Method::GET, &uri, Some(customer_token.as_str()), None).await;
    let (_, agent_view) = call(&app, Method::GET, &uri, Some(agent_token.as_str()), None).await;
    assert_eq!(customer_view.as_array().unwrap().len(), 1);
    assert_eq!(agent_view.as_array().unwrap().len(), 2);
}

// =============================================================================
// Suggestions and intents
// =============================================================================

#[tokio::test]
async fn suggestion_and_intent_routes() {
    let harness = Harness::new(FixedModel::default());
    let app = create_router(harness.state.clone());
    let customer = user(UserType::Customer);
    let agent = user(UserType::Agent);
    let agent_token = harness.token(agent);
    let (room, _) = harness
        .state
        .chat
        .get_or_create_room(customer.user_id, "Dana")
        .await
        .unwrap();
    let sent = harness
        .state
        .chat
        .send(room.id, customer.user_id, UserType::Customer, "Refund please", None)
        .await
        .unwrap();
    harness.settle_classification().await;
    let message_id = sent.message.id;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/messages/{message_id}/suggestions"),
        Some(agent_token.as_str()),
        Some(json!({ "style": "formal" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let created_at = body[0]["created_at"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        Method::DELETE,
        &format!("/api/v1/messages/{message_id}/suggestions"),
        Some(agent_token.as_str()),
        Some(json!({ "created_at": created_at })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/api/v1/messages/{message_id}/intent"),
        Some(agent_token.as_str()),
        Some(json!({ "intent": "billing" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confidence"], 1.0);

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/v1/messages/{message_id}/intents"),
        Some(agent_token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/messages/{message_id}/classify"),
        Some(agent_token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["label"], "refund_request");
}

#[tokio::test]
async fn unavailable_model_maps_to_503() {
    let harness = Harness::new(UnavailableGateway);
    let app = create_router(harness.state.clone());
    let customer = user(UserType::Customer);
    let agent_token = harness.token(user(UserType::Agent));
    let (room, _) = harness
        .state
        .chat
        .get_or_create_room(customer.user_id, "Dana")
        .await
        .unwrap();
    let sent = harness
        .state
        .chat
        .send(room.id, customer.user_id, UserType::Customer, "Hello", None)
        .await
        .unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/messages/{}/suggestions", sent.message.id),
        Some(agent_token.as_str()),
        Some(json!({ "style": "simple" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}
