//! Room routes
//!
//! Thin REST surface over the chat service for the agent dashboard and for
//! clients that cannot hold a WebSocket open.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chatdesk_shared::{
    IntentAuditEntry, LastSeen, MessageId, MessageView, Room, RoomId, RoomOverview, RoomStatus,
    UserId,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::require_agent;
use crate::{
    auth::AuthUser,
    chat::DEFAULT_HISTORY_LIMIT,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Upper bound on one history page
const MAX_HISTORY_LIMIT: usize = 500;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    /// Required for agents opening a room on a customer's behalf
    #[serde(default)]
    pub customer_id: Option<UserId>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room: Room,
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListRoomsQuery {
    #[serde(default)]
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default, alias = "reply_to")]
    pub reply_to_message_id: Option<MessageId>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub room_id: RoomId,
    #[serde(with = "time::serde::rfc3339")]
    pub agent_last_read_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub room_id: RoomId,
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
pub struct DeleteCustomerResponse {
    pub customer_id: UserId,
    pub deleted: u64,
}

const DEFAULT_DISPLAY_NAME: &str = "Customer";

// =============================================================================
// Handlers
// =============================================================================

/// Get or create the room for a customer
pub async fn create_room(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<CreateRoomResponse>)> {
    let customer_id = if auth_user.is_agent() {
        req.customer_id
            .ok_or_else(|| ApiError::Validation("customer_id is required".to_string()))?
    } else {
        match req.customer_id {
            Some(id) if id != auth_user.user_id => return Err(ApiError::Forbidden),
            _ => auth_user.user_id,
        }
    };

    let display_name = req
        .display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());

    let (room, created) = state
        .chat
        .get_or_create_room(customer_id, &display_name)
        .await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(CreateRoomResponse { room, created })))
}

/// Agent dashboard: rooms by recent activity with unread counts
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListRoomsQuery>,
) -> ApiResult<Json<Vec<RoomOverview>>> {
    require_agent(&auth_user)?;
    Ok(Json(state.chat.list_rooms(query.status).await?))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(room_id): Path<RoomId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<MessageView>>> {
    state.chat.room_for(room_id, &auth_user).await?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let mut messages = state.chat.history(room_id, limit).await?;

    // Customers do not see retracted messages
    if !auth_user.is_agent() {
        messages.retain(|view| !view.message.is_deleted);
    }
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(room_id): Path<RoomId>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageView>)> {
    state.chat.room_for(room_id, &auth_user).await?;
    let message = state
        .chat
        .send(
            room_id,
            auth_user.user_id,
            auth_user.user_type,
            &req.content,
            req.reply_to_message_id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn close_room(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<Json<Room>> {
    require_agent(&auth_user)?;
    Ok(Json(state.chat.close(room_id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<Json<MarkReadResponse>> {
    require_agent(&auth_user)?;
    let agent_last_read_at = state.chat.mark_read_by_agent(room_id).await?;
    Ok(Json(MarkReadResponse {
        room_id,
        agent_last_read_at,
    }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<Json<UnreadResponse>> {
    require_agent(&auth_user)?;
    let unread_count = state.chat.compute_unread_count(room_id).await?;
    Ok(Json(UnreadResponse {
        room_id,
        unread_count,
    }))
}

/// `null` until an agent has read the room
pub async fn last_seen(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<Json<Option<LastSeen>>> {
    state.chat.room_for(room_id, &auth_user).await?;
    Ok(Json(state.chat.last_seen_by_customer(room_id).await?))
}

pub async fn room_intents(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(room_id): Path<RoomId>,
) -> ApiResult<Json<Vec<IntentAuditEntry>>> {
    require_agent(&auth_user)?;
    Ok(Json(state.chat.intent_history_for_room(room_id).await?))
}

/// Erase everything stored for a customer
pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(customer_id): Path<UserId>,
) -> ApiResult<Json<DeleteCustomerResponse>> {
    require_agent(&auth_user)?;
    let deleted = state.chat.delete_customer_data(customer_id).await?;
    Ok(Json(DeleteCustomerResponse {
        customer_id,
        deleted,
    }))
}
