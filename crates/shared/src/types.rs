//! Common types used across ChatDesk

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Chat room ID wrapper
    RoomId
);
id_type!(
    /// Message ID wrapper
    MessageId
);
id_type!(
    /// User ID wrapper (customers and agents share one id space)
    UserId
);
id_type!(
    /// Intent audit entry ID wrapper
    AuditEntryId
);

// =============================================================================
// Enums
// =============================================================================

/// Who authored a message or owns a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Customer,
    /// Support agent. Older clients still send "admin".
    #[serde(alias = "admin")]
    Agent,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Customer => "customer",
            UserType::Agent => "agent",
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, UserType::Agent)
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(UserType::Customer),
            "agent" | "admin" => Ok(UserType::Agent),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Room lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Active,
    Closed,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Active => "active",
            RoomStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoomStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RoomStatus::Active),
            "closed" => Ok(RoomStatus::Closed),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned when a stored enum value is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

// =============================================================================
// Rooms
// =============================================================================

/// Conversation context for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub customer_id: UserId,
    pub customer_display_name: String,
    pub status: RoomStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub last_message: Option<MessageSummary>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub agent_last_read_at: Option<OffsetDateTime>,
}

impl Room {
    /// A fresh active room with no messages and no read receipt
    pub fn new(customer_id: UserId, customer_display_name: String, created_at: OffsetDateTime) -> Self {
        Self {
            id: RoomId::new(),
            customer_id,
            customer_display_name,
            status: RoomStatus::Active,
            created_at,
            last_message: None,
            last_message_at: None,
            agent_last_read_at: None,
        }
    }
}

/// Dashboard row: a room plus its unread customer message count
#[derive(Debug, Clone, Serialize)]
pub struct RoomOverview {
    #[serde(flatten)]
    pub room: Room,
    pub unread_count: u64,
}

/// Latest customer message the agent side has read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastSeen {
    pub user_id: UserId,
    pub user_type: UserType,
    pub last_message_id: MessageId,
}

// =============================================================================
// Messages
// =============================================================================

/// A chat message. Only suggestions, the cached intent fields, and the
/// soft-delete flag change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub user_type: UserType,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub reply_to_message_id: Option<MessageId>,
    pub intent: Option<String>,
    pub intent_confidence: Option<f64>,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Message {
    pub fn new(
        room_id: RoomId,
        user_id: UserId,
        user_type: UserType,
        content: String,
        created_at: OffsetDateTime,
        reply_to_message_id: Option<MessageId>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            room_id,
            user_id,
            user_type,
            content,
            created_at,
            reply_to_message_id,
            intent: None,
            intent_confidence: None,
            suggestions: Vec::new(),
            is_deleted: false,
        }
    }
}

/// Projection of a message stored on its room as `last_message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    pub user_id: UserId,
    pub user_type: UserType,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&Message> for MessageSummary {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            user_id: message.user_id,
            user_type: message.user_type,
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// A message as handed to clients, with a read-only snapshot of the message
/// it replies to. The snapshot is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            message,
            reply_to_message: None,
        }
    }
}

/// Proposed agent reply for one style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub style: String,
    pub text: String,
    /// Also the suggestion's identity when removing it
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub model_version: String,
}

// =============================================================================
// Intent audit
// =============================================================================

/// Who produced an automatic classification
pub const CLASSIFIED_BY_MODEL: &str = "ai";

/// One classification event. Entries are appended, never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAuditEntry {
    pub id: AuditEntryId,
    pub message_id: MessageId,
    pub room_id: RoomId,
    pub intent: String,
    pub confidence: f64,
    pub classified_by: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub note: Option<String>,
}
