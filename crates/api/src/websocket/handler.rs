//! WebSocket handler for Axum
//!
//! Authenticates the upgrade request, registers the session, and routes
//! client events into the chat service.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use chatdesk_shared::{MessageId, RoomId};
use futures::{stream::StreamExt, SinkExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use super::{
    connection::Connection,
    events::{ClientEvent, ServerEvent},
    presence::Channel,
};
use crate::auth::{AuthUser, JwtManager};
use crate::chat::{ChatError, ChatResult};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    #[serde(default)]
    token: String,
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
/// Authenticates via query parameter token; failures never reach the upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Query(params): Query<WebSocketQuery>,
) -> ApiResult<Response> {
    let user = authenticate(&app_state.jwt, &params.token)?;

    tracing::info!(
        user_id = %user.user_id,
        user_type = %user.user_type,
        "WebSocket connection upgrade requested"
    );

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user, app_state)))
}

fn authenticate(jwt: &JwtManager, token: &str) -> ChatResult<AuthUser> {
    jwt.verify(token).map_err(|e| {
        tracing::warn!(error = %e, "WebSocket auth failed");
        ChatError::AuthFailure
    })
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user: AuthUser, app_state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Create channel for sending events to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = app_state.presence.register(Connection::new(user, tx)).await;
    let session_id = conn.session_id;

    let _ = conn.send(ServerEvent::Connected {
        session_id,
        user_id: conn.user_id,
        user_type: conn.user_type,
    });

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break; // Connection closed
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Failed to serialize WebSocket event");
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(session_id = %session_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(event, &conn, &app_state).await,
                Err(e) => {
                    tracing::warn!(
                        error = ?e,
                        message = %text,
                        "Failed to parse client event"
                    );
                    let _ = conn.send(ServerEvent::Error {
                        message: "Invalid event format".to_string(),
                    });
                }
            },
            Message::Close(_) => {
                tracing::info!(session_id = %session_id, "WebSocket close frame received");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                // Axum handles ping/pong automatically
            }
            Message::Binary(_) => {}
        }
    }

    // Cleanup on disconnect
    tracing::info!(session_id = %session_id, user_id = %user.user_id, "WebSocket connection closing");
    app_state.presence.on_disconnect(session_id).await;

    send_task.abort();
}

/// Handle client event
async fn handle_client_event(event: ClientEvent, conn: &Arc<Connection>, app_state: &AppState) {
    use ClientEvent::*;

    let user = conn.identity();
    let chat = &app_state.chat;

    match event {
        JoinRoom { room_id } => match chat.room_for(room_id, &user).await {
            Ok(_) => {
                app_state
                    .presence
                    .join(conn.session_id, Channel::Room(room_id))
                    .await;
                let _ = conn.send(ServerEvent::RoomJoined { room_id });
            }
            Err(e) => send_error(conn, &e),
        },

        LeaveRoom { room_id } => {
            app_state
                .presence
                .leave(conn.session_id, Channel::Room(room_id))
                .await;
            let _ = conn.send(ServerEvent::RoomLeft { room_id });
        }

        SendMessage {
            room_id,
            content,
            reply_to_message_id,
        } => {
            if let Err(e) = send_message(app_state, &user, room_id, &content, reply_to_message_id).await {
                tracing::warn!(
                    session_id = %conn.session_id,
                    room_id = %room_id,
                    error = %e,
                    "Message send failed"
                );
                let _ = conn.send(ServerEvent::MessageError {
                    room_id,
                    error: e.to_string(),
                });
            }
        }

        Typing { room_id } => {
            relay_to_room(
                conn,
                app_state,
                room_id,
                ServerEvent::Typing {
                    room_id,
                    user_id: user.user_id,
                    user_type: user.user_type,
                },
            )
            .await;
        }

        StopTyping { room_id } => {
            relay_to_room(
                conn,
                app_state,
                room_id,
                ServerEvent::StopTyping {
                    room_id,
                    user_id: user.user_id,
                    user_type: user.user_type,
                },
            )
            .await;
        }

        Seen {
            room_id,
            last_message_id,
        } => {
            let relayed = relay_to_room(
                conn,
                app_state,
                room_id,
                ServerEvent::Seen {
                    room_id,
                    user_id: user.user_id,
                    user_type: user.user_type,
                    last_message_id,
                },
            )
            .await;

            // Best effort: a failed write is retried by the next receipt
            if relayed && user.is_agent() {
                if let Err(e) = chat.mark_read_by_agent(room_id).await {
                    tracing::warn!(room_id = %room_id, error = %e, "Failed to mark room read");
                }
            }
        }

        Ping => {
            let _ = conn.send(ServerEvent::Pong);
        }
    }
}

async fn send_message(
    app_state: &AppState,
    user: &AuthUser,
    room_id: RoomId,
    content: &str,
    reply_to_message_id: Option<MessageId>,
) -> Result<(), ChatError> {
    app_state.chat.room_for(room_id, user).await?;
    app_state
        .chat
        .send(room_id, user.user_id, user.user_type, content, reply_to_message_id)
        .await?;
    Ok(())
}

/// Forward a signal to the other members of a room the sender has joined
async fn relay_to_room(conn: &Arc<Connection>, app_state: &AppState, room_id: RoomId, event: ServerEvent) -> bool {
    let channel = Channel::Room(room_id);
    if !app_state.presence.is_member(conn.session_id, channel).await {
        let _ = conn.send(ServerEvent::Error {
            message: "Join the room first".to_string(),
        });
        return false;
    }

    app_state
        .broadcaster
        .emit_except(channel, event, conn.session_id)
        .await;
    true
}

fn send_error(conn: &Connection, err: &ChatError) {
    let _ = conn.send(ServerEvent::Error {
        message: err.to_string(),
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};
    use chatdesk_shared::{UserId, UserType};

    use crate::error::ApiError;

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    #[test]
    fn test_authenticate_accepts_issued_token() {
        let jwt = JwtManager::new(SECRET, 1);
        let user_id = UserId::new();
        let token = jwt.issue_token(user_id, UserType::Customer).unwrap();

        let user = authenticate(&jwt, &token).unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.user_type, UserType::Customer);
    }

    #[test]
    fn test_bad_token_is_rejected_before_upgrade() {
        let jwt = JwtManager::new(SECRET, 1);

        for token in ["", "not-a-token"] {
            let err = authenticate(&jwt, token).unwrap_err();
            assert!(matches!(err, ChatError::AuthFailure));
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
