//! Chat service errors

use chatdesk_shared::StoreError;

use crate::gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Missing, invalid or expired credential
    #[error("Authentication failed")]
    AuthFailure,

    /// Authenticated, but the room belongs to someone else
    #[error("Access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Model gateway unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
