//! HTTP client for the model-serving endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GatewayError, GatewayResult, IntentPrediction, ModelGateway};

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    intent: String,
    confidence: f64,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    text: &'a str,
    style: &'a str,
    model_version: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// Calls `POST {base}/classify` and `POST {base}/generate`
pub struct HttpModelGateway {
    http_client: Client,
    base_url: String,
}

impl HttpModelGateway {
    /// Create a new gateway client. Every request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| GatewayError::ModelUnavailable(format!("HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post<Req, Resp>(&self, path: &str, body: &Req) -> GatewayResult<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ModelUnavailable(format!(
                "{url} returned {status}"
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ModelGateway for HttpModelGateway {
    async fn classify_intent(&self, text: &str) -> GatewayResult<IntentPrediction> {
        let response: ClassifyResponse = self.post("classify", &ClassifyRequest { text }).await?;
        validate_prediction(response)
    }

    async fn generate_reply(&self, text: &str, style: &str, model_version: &str) -> GatewayResult<String> {
        let response: GenerateResponse = self
            .post(
                "generate",
                &GenerateRequest {
                    text,
                    style,
                    model_version,
                },
            )
            .await?;

        if response.text.trim().is_empty() {
            return Err(GatewayError::InvalidResponse("empty generated text".to_string()));
        }
        Ok(response.text)
    }
}

fn validate_prediction(response: ClassifyResponse) -> GatewayResult<IntentPrediction> {
    if response.intent.trim().is_empty() {
        return Err(GatewayError::InvalidResponse("empty intent label".to_string()));
    }
    if !(0.0..=1.0).contains(&response.confidence) {
        return Err(GatewayError::InvalidResponse(format!(
            "confidence {} outside [0, 1]",
            response.confidence
        )));
    }
    Ok(IntentPrediction {
        label: response.intent,
        confidence: response.confidence,
    })
}
