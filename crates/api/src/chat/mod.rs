//! Chat coordination core
//!
//! [`ChatService`] owns room lifecycle, the message pipeline, suggestions
//! and manual intent tagging. It is built once at startup and shared by the
//! WebSocket handler and the REST routes.

mod clock;
mod error;
mod intents;
mod pipeline;
mod rooms;
mod sequencer;
mod suggestions;

pub use clock::MonotonicClock;
pub use error::{ChatError, ChatResult};
pub use sequencer::RoomSequencer;

use std::sync::Arc;
use std::time::Duration;

use chatdesk_shared::UserId;

use crate::classification::ClassificationCoordinator;
use crate::config::Config;
use crate::gateway::ModelGateway;
use crate::store::ChatStore;
use crate::websocket::Broadcaster;

/// Messages returned by a history read when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Canned agent message sent after a customer's first message in a room
#[derive(Debug, Clone)]
pub struct AutoReply {
    pub agent_id: UserId,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub auto_reply: Option<AutoReply>,
    /// Upper bound for synchronous model calls (suggestions, previews)
    pub model_timeout: Duration,
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            auto_reply: config.auto_reply_enabled.then(|| AutoReply {
                agent_id: UserId(config.auto_reply_agent_id),
                text: config.auto_reply_text.clone(),
            }),
            model_timeout: Duration::from_millis(config.model_request_timeout_ms),
        }
    }
}

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    models: Arc<dyn ModelGateway>,
    broadcaster: Broadcaster,
    classification: ClassificationCoordinator,
    clock: Arc<MonotonicClock>,
    sequencer: RoomSequencer,
    settings: ChatSettings,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        models: Arc<dyn ModelGateway>,
        broadcaster: Broadcaster,
        classification: ClassificationCoordinator,
        clock: Arc<MonotonicClock>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            models,
            broadcaster,
            classification,
            clock,
            sequencer: RoomSequencer::new(),
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn classification(&self) -> &ClassificationCoordinator {
        &self.classification
    }
}
