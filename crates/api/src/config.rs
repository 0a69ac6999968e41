//! Application configuration

use std::env;
use uuid::Uuid;

/// Greeting sent on behalf of the support team after a customer's first message
pub const DEFAULT_AUTO_REPLY_TEXT: &str = "Thank you for reaching out to our support team! \
We have received your message and an agent will get back to you as soon as possible.";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database (in-memory store when unset)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Authentication
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    // Model gateway
    pub model_gateway_url: Option<String>,
    pub model_request_timeout_ms: u64,

    // Background classification
    pub classification_queue_capacity: usize,
    pub classification_max_concurrency: usize,
    pub classification_timeout_ms: u64,

    // First-contact auto reply
    pub auto_reply_enabled: bool,
    pub auto_reply_text: String,
    pub auto_reply_agent_id: Uuid,

    // Logging
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            // Database
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_expiry_hours: parse_or("JWT_EXPIRY_HOURS", 24),

            // Model gateway
            model_gateway_url: env::var("MODEL_GATEWAY_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            model_request_timeout_ms: parse_or("MODEL_REQUEST_TIMEOUT_MS", 10_000),

            // Background classification
            classification_queue_capacity: parse_or("CLASSIFICATION_QUEUE_CAPACITY", 1024).max(1),
            classification_max_concurrency: parse_or("CLASSIFICATION_MAX_CONCURRENCY", 4).max(1),
            classification_timeout_ms: parse_or("CLASSIFICATION_TIMEOUT_MS", 15_000),

            // Auto reply
            auto_reply_enabled: parse_or("AUTO_REPLY_ENABLED", true),
            auto_reply_text: env::var("AUTO_REPLY_TEXT")
                .ok()
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AUTO_REPLY_TEXT.to_string()),
            auto_reply_agent_id: match env::var("AUTO_REPLY_AGENT_ID") {
                Ok(raw) => Uuid::parse_str(raw.trim())
                    .map_err(|_| ConfigError::Invalid("AUTO_REPLY_AGENT_ID must be a UUID"))?,
                Err(_) => Uuid::nil(),
            },

            // Logging
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
