//! WebSocket event types and serialization
//!
//! Every frame is a JSON object tagged by `type`.

use chatdesk_shared::{MessageId, MessageView, Room, RoomId, RoomStatus, UserId, UserType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Client-to-Server Events
// =============================================================================

/// Events sent from client to server
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Start receiving a room's events
    JoinRoom { room_id: RoomId },

    LeaveRoom { room_id: RoomId },

    SendMessage {
        room_id: RoomId,
        content: String,
        #[serde(default, alias = "reply_to")]
        reply_to_message_id: Option<MessageId>,
    },

    Typing { room_id: RoomId },

    StopTyping { room_id: RoomId },

    /// Read receipt. From an agent it also marks the room read.
    Seen {
        room_id: RoomId,
        #[serde(default)]
        last_message_id: Option<MessageId>,
    },

    /// Heartbeat ping to keep connection alive
    Ping,
}

// =============================================================================
// Server-to-Client Events
// =============================================================================

/// Events sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Connection acknowledged
    Connected {
        session_id: Uuid,
        user_id: UserId,
        user_type: UserType,
    },

    RoomJoined { room_id: RoomId },

    RoomLeft { room_id: RoomId },

    /// Full message payload, sent to room members
    NewMessage { room_id: RoomId, message: MessageView },

    /// A customer's first contact created a room (agent roster only)
    NewRoom { room: Room },

    /// Lightweight "room list changed" signal for the agent roster
    UpdateRoomList { room_id: RoomId },

    RoomUpdated { room_id: RoomId, status: RoomStatus },

    Typing {
        room_id: RoomId,
        user_id: UserId,
        user_type: UserType,
    },

    StopTyping {
        room_id: RoomId,
        user_id: UserId,
        user_type: UserType,
    },

    Seen {
        room_id: RoomId,
        user_id: UserId,
        user_type: UserType,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_message_id: Option<MessageId>,
    },

    /// A `send_message` was rejected; the message was not stored
    MessageError {
        room_id: RoomId,
        error: String,
    },

    /// Heartbeat response
    Pong,

    /// Error message
    Error { message: String },
}

impl ServerEvent {
    /// Wire name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "connected",
            ServerEvent::RoomJoined { .. } => "room_joined",
            ServerEvent::RoomLeft { .. } => "room_left",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::NewRoom { .. } => "new_room",
            ServerEvent::UpdateRoomList { .. } => "update_room_list",
            ServerEvent::RoomUpdated { .. } => "room_updated",
            ServerEvent::Typing { .. } => "typing",
            ServerEvent::StopTyping { .. } => "stop_typing",
            ServerEvent::Seen { .. } => "seen",
            ServerEvent::MessageError { .. } => "message_error",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}
