//! Persistence gateway for rooms, messages, and the intent audit trail
//!
//! The chat core treats storage as a document store reached through simple
//! key and query operations. Two backends implement [`ChatStore`]:
//!
//! - [`MemoryStore`]: process-local tables, used for development and tests
//! - [`PgStore`]: PostgreSQL via sqlx
//!
//! No transactions are assumed across collections. The only uniqueness rule
//! the core depends on is one room per `customer_id`; backends report a
//! violation as [`StoreError::Duplicate`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chatdesk_shared::{
    IntentAuditEntry, Message, MessageId, MessageSummary, Room, RoomId, RoomStatus, StoreResult,
    Suggestion, UserId,
};
use time::OffsetDateTime;

#[cfg(doc)]
use chatdesk_shared::StoreError;

/// Document-store operations over the three chat collections
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Backend liveness check
    async fn ping(&self) -> StoreResult<()>;

    // ---------------------------------------------------------------------
    // Rooms
    // ---------------------------------------------------------------------

    async fn find_room(&self, room_id: RoomId) -> StoreResult<Option<Room>>;

    async fn find_room_by_customer(&self, customer_id: UserId) -> StoreResult<Option<Room>>;

    /// Insert a new room. Fails with [`StoreError::Duplicate`] if the customer
    /// already owns one.
    async fn insert_room(&self, room: &Room) -> StoreResult<()>;

    /// Returns false when the room does not exist
    async fn update_room_display_name(&self, room_id: RoomId, display_name: &str) -> StoreResult<bool>;

    async fn set_room_status(&self, room_id: RoomId, status: RoomStatus) -> StoreResult<bool>;

    async fn set_room_last_message(&self, room_id: RoomId, summary: &MessageSummary) -> StoreResult<bool>;

    async fn set_agent_last_read_at(&self, room_id: RoomId, at: OffsetDateTime) -> StoreResult<bool>;

    /// Rooms ordered by `last_message_at` descending, rooms without messages last
    async fn list_rooms(&self, status: Option<RoomStatus>) -> StoreResult<Vec<Room>>;

    // ---------------------------------------------------------------------
    // Messages
    // ---------------------------------------------------------------------

    async fn insert_message(&self, message: &Message) -> StoreResult<()>;

    async fn find_message(&self, message_id: MessageId) -> StoreResult<Option<Message>>;

    /// Messages of a room ascending by `created_at`, at most `limit`
    async fn list_messages(&self, room_id: RoomId, limit: usize) -> StoreResult<Vec<Message>>;

    async fn count_messages(&self, room_id: RoomId) -> StoreResult<u64>;

    /// Customer-authored, non-deleted messages created strictly after `after`
    /// (all of them when `after` is `None`)
    async fn count_customer_messages_after(
        &self,
        room_id: RoomId,
        after: Option<OffsetDateTime>,
    ) -> StoreResult<u64>;

    /// Newest customer message created at or before `at`
    async fn latest_customer_message_at_or_before(
        &self,
        room_id: RoomId,
        at: OffsetDateTime,
    ) -> StoreResult<Option<Message>>;

    async fn set_message_intent(&self, message_id: MessageId, intent: &str, confidence: f64) -> StoreResult<bool>;

    /// Whole-array rewrite of a message's suggestions
    async fn set_message_suggestions(&self, message_id: MessageId, suggestions: &[Suggestion]) -> StoreResult<bool>;

    async fn soft_delete_message(&self, message_id: MessageId) -> StoreResult<bool>;

    // ---------------------------------------------------------------------
    // Intent audit
    // ---------------------------------------------------------------------

    async fn insert_intent_entry(&self, entry: &IntentAuditEntry) -> StoreResult<()>;

    /// Entries ascending by `created_at`
    async fn list_intent_entries_for_message(&self, message_id: MessageId) -> StoreResult<Vec<IntentAuditEntry>>;

    /// Entries ascending by `created_at`
    async fn list_intent_entries_for_room(&self, room_id: RoomId) -> StoreResult<Vec<IntentAuditEntry>>;

    // ---------------------------------------------------------------------
    // Erasure
    // ---------------------------------------------------------------------

    /// Delete a customer's room with its messages and audit entries.
    /// Returns the number of documents removed.
    async fn delete_customer_data(&self, customer_id: UserId) -> StoreResult<u64>;
}
