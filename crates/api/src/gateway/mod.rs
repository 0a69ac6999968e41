//! Classifier and reply-generator gateway
//!
//! The intent classifier and the reply generator are opaque remote models.
//! The chat core only sees [`ModelGateway`]; [`HttpModelGateway`] talks to a
//! model-serving endpoint and [`UnavailableGateway`] stands in when none is
//! configured.

mod http;

pub use http::HttpModelGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Styles the generator understands
pub const SUGGESTION_STYLES: &[&str] = &["simple", "friendly", "formal"];

/// Model version used when the caller does not ask for one
pub const DEFAULT_MODEL_VERSION: &str = "v1.00";

/// Error type for model gateway calls
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Timeout waiting for model response")]
    Timeout,

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::InvalidResponse(err.to_string())
        } else {
            GatewayError::ModelUnavailable(err.to_string())
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPrediction {
    pub label: String,
    /// In `[0, 1]`
    pub confidence: f64,
}

#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn classify_intent(&self, text: &str) -> GatewayResult<IntentPrediction>;

    async fn generate_reply(&self, text: &str, style: &str, model_version: &str) -> GatewayResult<String>;
}

/// Gateway used when no model endpoint is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableGateway;

#[async_trait]
impl ModelGateway for UnavailableGateway {
    async fn classify_intent(&self, _text: &str) -> GatewayResult<IntentPrediction> {
        Err(GatewayError::ModelUnavailable("no model gateway configured".to_string()))
    }

    async fn generate_reply(&self, _text: &str, _style: &str, _model_version: &str) -> GatewayResult<String> {
        Err(GatewayError::ModelUnavailable("no model gateway configured".to_string()))
    }
}
