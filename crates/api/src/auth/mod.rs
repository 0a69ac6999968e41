//! Authentication module for ChatDesk

pub mod jwt;
pub mod middleware;

use chatdesk_shared::{UserId, UserType};
use serde::Serialize;

pub use jwt::{Claims, JwtError, JwtManager};
pub use middleware::require_auth;

/// Identity resolved from a verified token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub user_id: UserId,
    pub user_type: UserType,
}

impl AuthUser {
    pub fn is_agent(&self) -> bool {
        self.user_type.is_agent()
    }
}
