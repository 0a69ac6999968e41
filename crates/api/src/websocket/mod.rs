//! WebSocket support for real-time chat
//!
//! Provides the live side of ChatDesk:
//! - Session presence (who is connected, which rooms they listen on)
//! - Room-scoped and agent-roster multicast
//! - Typing indicators and read receipts
//! - Real-time message delivery
//!
//! # Architecture
//!
//! - **Connection**: Represents an authenticated WebSocket connection
//! - **Presence**: Registry of sessions and channel membership
//! - **Broadcast**: Best-effort fan-out over presence channels
//! - **Handler**: Axum WebSocket route handler
//! - **Events**: Type-safe event definitions for client/server communication

pub mod broadcast;
pub mod connection;
pub mod events;
pub mod handler;
pub mod presence;

pub use broadcast::{Broadcaster, DeliveryReport};
pub use connection::Connection;
pub use events::{ClientEvent, ServerEvent};
pub use handler::ws_handler;
pub use presence::{Channel, PresenceRegistry, PresenceStats};
