//! Shared fixtures for chat integration tests
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chatdesk_api::{
    auth::AuthUser,
    config::{Config, DEFAULT_AUTO_REPLY_TEXT},
    gateway::{GatewayError, GatewayResult, IntentPrediction, ModelGateway},
    state::AppState,
    store::{ChatStore, MemoryStore},
    websocket::{Channel, Connection, ServerEvent},
};
use chatdesk_shared::{
    IntentAuditEntry, Message, MessageId, MessageSummary, Room, RoomId, RoomStatus, StoreResult,
    Suggestion, UserId, UserType,
};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-jwt-secret-must-be-at-least-32-characters-long";

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        database_url: None,
        database_max_connections: 1,
        jwt_secret: TEST_SECRET.to_string(),
        jwt_expiry_hours: 1,
        model_gateway_url: None,
        model_request_timeout_ms: 200,
        classification_queue_capacity: 64,
        classification_max_concurrency: 2,
        classification_timeout_ms: 200,
        auto_reply_enabled: true,
        auto_reply_text: DEFAULT_AUTO_REPLY_TEXT.to_string(),
        auto_reply_agent_id: Uuid::nil(),
        log_json: false,
    }
}

// =============================================================================
// Fake model gateways
// =============================================================================

/// Always answers with the same label and a style-tagged reply
pub struct FixedModel {
    pub label: &'static str,
    pub confidence: f64,
}

impl Default for FixedModel {
    fn default() -> Self {
        Self {
            label: "refund_request",
            confidence: 0.87,
        }
    }
}

#[async_trait]
impl ModelGateway for FixedModel {
    async fn classify_intent(&self, _text: &str) -> GatewayResult<IntentPrediction> {
        Ok(IntentPrediction {
            label: self.label.to_string(),
            confidence: self.confidence,
        })
    }

    async fn generate_reply(&self, text: &str, style: &str, _model_version: &str) -> GatewayResult<String> {
        Ok(format!("[{style}] reply to: {text}"))
    }
}

/// Every call fails as if the model server were down
pub struct FailingModel;

#[async_trait]
impl ModelGateway for FailingModel {
    async fn classify_intent(&self, _text: &str) -> GatewayResult<IntentPrediction> {
        Err(GatewayError::ModelUnavailable("model server down".to_string()))
    }

    async fn generate_reply(&self, _text: &str, _style: &str, _model_version: &str) -> GatewayResult<String> {
        Err(GatewayError::ModelUnavailable("model server down".to_string()))
    }
}

/// Never answers
pub struct HangingModel;

#[async_trait]
impl ModelGateway for HangingModel {
    async fn classify_intent(&self, _text: &str) -> GatewayResult<IntentPrediction> {
        std::future::pending().await
    }

    async fn generate_reply(&self, _text: &str, _style: &str, _model_version: &str) -> GatewayResult<String> {
        std::future::pending().await
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub state: AppState,
    pub worker: JoinHandle<()>,
}

impl Harness {
    pub fn new(models: impl ModelGateway + 'static) -> Self {
        Self::with_config(test_config(), models)
    }

    pub fn with_config(config: Config, models: impl ModelGateway + 'static) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()), models)
    }

    pub fn with_store(config: Config, store: Arc<dyn ChatStore>, models: impl ModelGateway + 'static) -> Self {
        let (state, worker) = AppState::new(config, store, Arc::new(models));
        Self { state, worker }
    }

    /// Register a fake socket for a fresh user
    pub async fn connect(&self, user_type: UserType) -> Client {
        self.connect_as(AuthUser {
            user_id: UserId::new(),
            user_type,
        })
        .await
    }

    pub async fn connect_as(&self, user: AuthUser) -> Client {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = self.state.presence.register(Connection::new(user, tx)).await;
        Client { conn, rx }
    }

    pub async fn join(&self, client: &Client, room_id: RoomId) {
        assert!(
            self.state
                .presence
                .join(client.conn.session_id, Channel::Room(room_id))
                .await
        );
    }

    /// Wait until every queued classification job has an outcome
    pub async fn settle_classification(&self) {
        let coordinator = self.state.chat.classification();
        for _ in 0..300 {
            if coordinator.stats().pending() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("classification did not settle: {:?}", coordinator.stats());
    }

    pub fn token(&self, user: AuthUser) -> String {
        self.state.jwt.issue_token(user.user_id, user.user_type).unwrap()
    }
}

pub struct Client {
    pub conn: Arc<Connection>,
    pub rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl Client {
    pub fn user(&self) -> AuthUser {
        self.conn.identity()
    }

    /// Everything delivered so far
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerEvent::kind).collect()
    }
}

// =============================================================================
// Store wrapper
// =============================================================================

/// `MemoryStore` with injectable latency and stale reads
#[derive(Default)]
pub struct SlowStore {
    pub inner: MemoryStore,
    /// Added before every message insert
    pub insert_delay: Duration,
    /// Next customer-room lookup reports nothing, as if another writer had
    /// not committed yet
    pub miss_next_customer_lookup: AtomicBool,
}

impl SlowStore {
    pub fn with_insert_delay(insert_delay: Duration) -> Self {
        Self {
            insert_delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ChatStore for SlowStore {
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn find_room(&self, room_id: RoomId) -> StoreResult<Option<Room>> {
        self.inner.find_room(room_id).await
    }

    async fn find_room_by_customer(&self, customer_id: UserId) -> StoreResult<Option<Room>> {
        if self.miss_next_customer_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_room_by_customer(customer_id).await
    }

    async fn insert_room(&self, room: &Room) -> StoreResult<()> {
        self.inner.insert_room(room).await
    }

    async fn update_room_display_name(&self, room_id: RoomId, display_name: &str) -> StoreResult<bool> {
        self.inner.update_room_display_name(room_id, display_name).await
    }

    async fn set_room_status(&self, room_id: RoomId, status: RoomStatus) -> StoreResult<bool> {
        self.inner.set_room_status(room_id, status).await
    }

    async fn set_room_last_message(&self, room_id: RoomId, summary: &MessageSummary) -> StoreResult<bool> {
        self.inner.set_room_last_message(room_id, summary).await
    }

    async fn set_agent_last_read_at(&self, room_id: RoomId, at: OffsetDateTime) -> StoreResult<bool> {
        self.inner.set_agent_last_read_at(room_id, at).await
    }

    async fn list_rooms(&self, status: Option<RoomStatus>) -> StoreResult<Vec<Room>> {
        self.inner.list_rooms(status).await
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        tokio::time::sleep(self.insert_delay).await;
        self.inner.insert_message(message).await
    }

    async fn find_message(&self, message_id: MessageId) -> StoreResult<Option<Message>> {
        self.inner.find_message(message_id).await
    }

    async fn list_messages(&self, room_id: RoomId, limit: usize) -> StoreResult<Vec<Message>> {
        self.inner.list_messages(room_id, limit).await
    }

    async fn count_messages(&self, room_id: RoomId) -> StoreResult<u64> {
        self.inner.count_messages(room_id).await
    }

    async fn count_customer_messages_after(
        &self,
        room_id: RoomId,
        after: Option<OffsetDateTime>,
    ) -> StoreResult<u64> {
        self.inner.count_customer_messages_after(room_id, after).await
    }

    async fn latest_customer_message_at_or_before(
        &self,
        room_id: RoomId,
        at: OffsetDateTime,
    ) -> StoreResult<Option<Message>> {
        self.inner.latest_customer_message_at_or_before(room_id, at).await
    }

    async fn set_message_intent(&self, message_id: MessageId, intent: &str, confidence: f64) -> StoreResult<bool> {
        self.inner.set_message_intent(message_id, intent, confidence).await
    }

    async fn set_message_suggestions(&self, message_id: MessageId, suggestions: &[Suggestion]) -> StoreResult<bool> {
        self.inner.set_message_suggestions(message_id, suggestions).await
    }

    async fn soft_delete_message(&self, message_id: MessageId) -> StoreResult<bool> {
        self.inner.soft_delete_message(message_id).await
    }

    async fn insert_intent_entry(&self, entry: &IntentAuditEntry) -> StoreResult<()> {
        self.inner.insert_intent_entry(entry).await
    }

    async fn list_intent_entries_for_message(&self, message_id: MessageId) -> StoreResult<Vec<IntentAuditEntry>> {
        self.inner.list_intent_entries_for_message(message_id).await
    }

    async fn list_intent_entries_for_room(&self, room_id: RoomId) -> StoreResult<Vec<IntentAuditEntry>> {
        self.inner.list_intent_entries_for_room(room_id).await
    }

    async fn delete_customer_data(&self, customer_id: UserId) -> StoreResult<u64> {
        self.inner.delete_customer_data(customer_id).await
    }
}
