//! ChatDesk API Library
//!
//! Real-time coordination layer for customer-support chat: presence,
//! room lifecycle, the message pipeline, background intent classification
//! and broadcast fan-out, served over WebSocket and a thin REST surface.

pub mod auth;
pub mod chat;
pub mod classification;
pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod state;
pub mod store;
pub mod websocket;

pub use chat::{ChatError, ChatService};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
