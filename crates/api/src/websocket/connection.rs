//! WebSocket connection handle
//!
//! One authenticated socket. Outbound events go through an unbounded channel
//! drained by the socket's writer task.

use chatdesk_shared::{UserId, UserType};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::ServerEvent;
use crate::auth::AuthUser;

/// Represents an active WebSocket connection
#[derive(Debug)]
pub struct Connection {
    /// Unique session ID for this connection
    pub session_id: Uuid,

    /// Authenticated identity
    pub user_id: UserId,
    pub user_type: UserType,

    /// Channel to send events to this connection
    pub sender: mpsc::UnboundedSender<ServerEvent>,
}

impl Connection {
    /// Create a new connection for a verified identity
    pub fn new(user: AuthUser, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user.user_id,
            user_type: user.user_type,
            sender,
        }
    }

    pub fn identity(&self) -> AuthUser {
        AuthUser {
            user_id: self.user_id,
            user_type: self.user_type,
        }
    }

    /// Send an event to this connection
    ///
    /// Returns Ok(()) if sent successfully, Err if connection is closed
    #[allow(clippy::result_large_err)] // Error type is from tokio mpsc, containing the failed event
    pub fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
