//! Reply suggestions attached to messages

use chatdesk_shared::{Message, MessageId, Suggestion};
use time::OffsetDateTime;

use super::{ChatError, ChatResult, ChatService};
use crate::gateway::{GatewayError, DEFAULT_MODEL_VERSION, SUGGESTION_STYLES};

impl ChatService {
    /// Store a suggestion, replacing any earlier one of the same style.
    /// Returns the message's full suggestion list.
    pub async fn add_suggestion(&self, message_id: MessageId, suggestion: Suggestion) -> ChatResult<Vec<Suggestion>> {
        let message = self.message(message_id).await?;
        // Read-modify-write of the array; serialize against other writers in the room
        let _guard = self.sequencer.lock(message.room_id).await;
        let mut suggestions = self.message(message_id).await?.suggestions;

        suggestions.retain(|s| s.style != suggestion.style);
        tracing::debug!(message_id = %message_id, style = %suggestion.style, "Suggestion stored");
        suggestions.push(suggestion);

        self.write_suggestions(message_id, &suggestions).await?;
        Ok(suggestions)
    }

    /// Remove the suggestion created at exactly `created_at`
    pub async fn remove_suggestion(&self, message_id: MessageId, created_at: OffsetDateTime) -> ChatResult<Vec<Suggestion>> {
        let message = self.message(message_id).await?;
        let _guard = self.sequencer.lock(message.room_id).await;
        let mut suggestions = self.message(message_id).await?.suggestions;

        let before = suggestions.len();
        suggestions.retain(|s| s.created_at != created_at);
        if suggestions.len() == before {
            return Err(ChatError::NotFound("suggestion"));
        }

        self.write_suggestions(message_id, &suggestions).await?;
        Ok(suggestions)
    }

    /// Ask the generator for a reply to `message_id` in `style` and store it
    pub async fn request_suggestion(
        &self,
        message_id: MessageId,
        style: &str,
        model_version: Option<&str>,
    ) -> ChatResult<Vec<Suggestion>> {
        if !SUGGESTION_STYLES.contains(&style) {
            return Err(ChatError::Validation(format!(
                "unknown style '{style}', expected one of: {}",
                SUGGESTION_STYLES.join(", ")
            )));
        }
        let model_version = model_version
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_MODEL_VERSION);

        let message = self.message(message_id).await?;
        if message.is_deleted {
            return Err(ChatError::NotFound("message"));
        }

        let text = tokio::time::timeout(
            self.settings.model_timeout,
            self.models.generate_reply(&message.content, style, model_version),
        )
        .await
        .map_err(|_| GatewayError::Timeout)??;

        let suggestion = Suggestion {
            style: style.to_string(),
            text,
            created_at: self.clock.now(),
            model_version: model_version.to_string(),
        };
        self.add_suggestion(message_id, suggestion).await
    }

    pub(super) async fn message(&self, message_id: MessageId) -> ChatResult<Message> {
        self.store
            .find_message(message_id)
            .await?
            .ok_or(ChatError::NotFound("message"))
    }

    async fn write_suggestions(&self, message_id: MessageId, suggestions: &[Suggestion]) -> ChatResult<()> {
        if !self.store.set_message_suggestions(message_id, suggestions).await? {
            return Err(ChatError::NotFound("message"));
        }
        Ok(())
    }
}
