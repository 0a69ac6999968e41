//! Message routes: soft delete, reply suggestions, intent tagging

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chatdesk_shared::{IntentAuditEntry, Message, MessageId, Suggestion};
use serde::Deserialize;
use time::OffsetDateTime;

use super::require_agent;
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    gateway::IntentPrediction,
    state::AppState,
};

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RequestSuggestionRequest {
    pub style: String,
    #[serde(default)]
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveSuggestionRequest {
    /// Identity of the suggestion to remove
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct AddIntentRequest {
    pub intent: String,
    pub confidence: f64,
    /// Defaults to the calling agent's id
    #[serde(default)]
    pub classified_by: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIntentRequest {
    pub intent: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Soft delete. Agents may delete any message, customers only their own.
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(message_id): Path<MessageId>,
) -> ApiResult<Json<Message>> {
    let message = state.chat.message_for(message_id, &auth_user).await?;
    if !auth_user.is_agent() && message.user_id != auth_user.user_id {
        return Err(ApiError::Forbidden);
    }
    Ok(Json(state.chat.delete_message(message_id).await?))
}

/// Generate a reply suggestion in one style; replaces any earlier one of that style
pub async fn request_suggestion(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(message_id): Path<MessageId>,
    Json(req): Json<RequestSuggestionRequest>,
) -> ApiResult<Json<Vec<Suggestion>>> {
    require_agent(&auth_user)?;
    let suggestions = state
        .chat
        .request_suggestion(message_id, req.style.trim(), req.model_version.as_deref())
        .await?;
    Ok(Json(suggestions))
}

pub async fn remove_suggestion(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(message_id): Path<MessageId>,
    Json(req): Json<RemoveSuggestionRequest>,
) -> ApiResult<Json<Vec<Suggestion>>> {
    require_agent(&auth_user)?;
    Ok(Json(
        state
            .chat
            .remove_suggestion(message_id, req.created_at)
            .await?,
    ))
}

pub async fn add_intent(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(message_id): Path<MessageId>,
    Json(req): Json<AddIntentRequest>,
) -> ApiResult<Json<IntentAuditEntry>> {
    require_agent(&auth_user)?;
    let classified_by = req
        .classified_by
        .unwrap_or_else(|| auth_user.user_id.to_string());

    let entry = state
        .chat
        .add_intent(message_id, &req.intent, req.confidence, &classified_by, req.note)
        .await?;
    Ok(Json(entry))
}

/// Agent correction of the current label
pub async fn update_intent(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(message_id): Path<MessageId>,
    Json(req): Json<UpdateIntentRequest>,
) -> ApiResult<Json<IntentAuditEntry>> {
    require_agent(&auth_user)?;
    Ok(Json(
        state
            .chat
            .update_intent(message_id, &req.intent, &auth_user)
            .await?,
    ))
}

pub async fn message_intents(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(message_id): Path<MessageId>,
) -> ApiResult<Json<Vec<IntentAuditEntry>>> {
    require_agent(&auth_user)?;
    Ok(Json(state.chat.intent_history_for_message(message_id).await?))
}

/// Classify a stored message without recording the result
pub async fn classify_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(message_id): Path<MessageId>,
) -> ApiResult<Json<IntentPrediction>> {
    require_agent(&auth_user)?;
    Ok(Json(state.chat.preview_intent(message_id).await?))
}
