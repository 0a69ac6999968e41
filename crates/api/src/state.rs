//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::auth::JwtManager;
use crate::chat::{ChatService, ChatSettings, MonotonicClock};
use crate::classification::{ClassificationCoordinator, Classifier, CoordinatorSettings};
use crate::config::Config;
use crate::gateway::ModelGateway;
use crate::store::ChatStore;
use crate::websocket::{Broadcaster, PresenceRegistry};

/// Everything a handler needs, constructed once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ChatStore>,
    pub chat: Arc<ChatService>,
    pub presence: PresenceRegistry,
    pub broadcaster: Broadcaster,
    pub jwt: JwtManager,
}

impl AppState {
    /// Wire the service graph over a store and a model gateway.
    ///
    /// Also starts the classification worker; the returned handle finishes
    /// once every clone of this state has been dropped.
    pub fn new(
        config: Config,
        store: Arc<dyn ChatStore>,
        models: Arc<dyn ModelGateway>,
    ) -> (Self, JoinHandle<()>) {
        let clock = Arc::new(MonotonicClock::new());
        let presence = PresenceRegistry::new();
        let broadcaster = Broadcaster::new(presence.clone());

        let (classification, worker) = ClassificationCoordinator::spawn(
            Classifier::new(Arc::clone(&store), Arc::clone(&models), Arc::clone(&clock)),
            CoordinatorSettings {
                queue_capacity: config.classification_queue_capacity,
                max_concurrency: config.classification_max_concurrency,
                job_timeout: Duration::from_millis(config.classification_timeout_ms),
            },
        );

        let chat = Arc::new(ChatService::new(
            Arc::clone(&store),
            models,
            broadcaster.clone(),
            classification,
            clock,
            ChatSettings::from_config(&config),
        ));

        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);

        let state = Self {
            config: Arc::new(config),
            store,
            chat,
            presence,
            broadcaster,
            jwt,
        };
        (state, worker)
    }
}
