//! Manual intent tagging and intent history

use chatdesk_shared::{IntentAuditEntry, MessageId, RoomId};

use super::{ChatError, ChatResult, ChatService};
use crate::auth::AuthUser;
use crate::classification::record_intent;
use crate::gateway::{GatewayError, IntentPrediction};

/// Note attached to agent corrections made from the message view
const CORRECTION_NOTE: &str = "manual correction";

impl ChatService {
    /// Append an audit entry and make it the message's current intent
    pub async fn add_intent(
        &self,
        message_id: MessageId,
        intent: &str,
        confidence: f64,
        classified_by: &str,
        note: Option<String>,
    ) -> ChatResult<IntentAuditEntry> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(ChatError::Validation("intent is empty".to_string()));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(ChatError::Validation("confidence must be within [0, 1]".to_string()));
        }
        let classified_by = classified_by.trim();
        if classified_by.is_empty() {
            return Err(ChatError::Validation("classified_by is empty".to_string()));
        }

        let message = self.message(message_id).await?;
        let entry = record_intent(
            self.store.as_ref(),
            &self.clock,
            &message,
            intent,
            confidence,
            classified_by,
            note.filter(|n| !n.trim().is_empty()),
        )
        .await?;

        tracing::info!(
            message_id = %message_id,
            intent = %entry.intent,
            classified_by = %entry.classified_by,
            "Intent recorded"
        );
        Ok(entry)
    }

    /// An agent overriding the current label. Recorded like any other
    /// classification, with full confidence and the agent as classifier.
    pub async fn update_intent(&self, message_id: MessageId, intent: &str, agent: &AuthUser) -> ChatResult<IntentAuditEntry> {
        if !agent.is_agent() {
            return Err(ChatError::Forbidden);
        }
        self.add_intent(
            message_id,
            intent,
            1.0,
            &agent.user_id.to_string(),
            Some(CORRECTION_NOTE.to_string()),
        )
        .await
    }

    /// Run the classifier on a stored message without recording anything
    pub async fn preview_intent(&self, message_id: MessageId) -> ChatResult<IntentPrediction> {
        let message = self.message(message_id).await?;
        let prediction = tokio::time::timeout(
            self.settings.model_timeout,
            self.models.classify_intent(&message.content),
        )
        .await
        .map_err(|_| GatewayError::Timeout)??;
        Ok(prediction)
    }

    pub async fn intent_history_for_message(&self, message_id: MessageId) -> ChatResult<Vec<IntentAuditEntry>> {
        self.message(message_id).await?;
        Ok(self.store.list_intent_entries_for_message(message_id).await?)
    }

    pub async fn intent_history_for_room(&self, room_id: RoomId) -> ChatResult<Vec<IntentAuditEntry>> {
        self.room(room_id).await?;
        Ok(self.store.list_intent_entries_for_room(room_id).await?)
    }
}
