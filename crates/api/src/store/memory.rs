//! In-memory chat store

use std::collections::HashMap;

use async_trait::async_trait;
use chatdesk_shared::{
    IntentAuditEntry, Message, MessageId, MessageSummary, Room, RoomId, RoomStatus, StoreError,
    StoreResult, Suggestion, UserId, UserType,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::ChatStore;

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, Room>,
    /// Unique index on `customer_id`
    rooms_by_customer: HashMap<UserId, RoomId>,
    messages: HashMap<MessageId, Message>,
    /// Message ids per room in insertion order
    room_messages: HashMap<RoomId, Vec<MessageId>>,
    intent_audit: Vec<IntentAuditEntry>,
}

impl Tables {
    fn messages_of(&self, room_id: RoomId) -> impl Iterator<Item = &Message> {
        self.room_messages
            .get(&room_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.messages.get(id))
    }
}

/// Process-local store. Contents live as long as the process.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_room(&self, room_id: RoomId) -> StoreResult<Option<Room>> {
        let tables = self.tables.read().await;
        Ok(tables.rooms.get(&room_id).cloned())
    }

    async fn find_room_by_customer(&self, customer_id: UserId) -> StoreResult<Option<Room>> {
        let tables = self.tables.read().await;
        Ok(tables
            .rooms_by_customer
            .get(&customer_id)
            .and_then(|id| tables.rooms.get(id))
            .cloned())
    }

    async fn insert_room(&self, room: &Room) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.rooms_by_customer.contains_key(&room.customer_id) {
            return Err(StoreError::Duplicate(format!(
                "room for customer {} already exists",
                room.customer_id
            )));
        }
        if tables.rooms.contains_key(&room.id) {
            return Err(StoreError::Duplicate(format!("room {} already exists", room.id)));
        }
        tables.rooms_by_customer.insert(room.customer_id, room.id);
        tables.rooms.insert(room.id, room.clone());
        Ok(())
    }

    async fn update_room_display_name(&self, room_id: RoomId, display_name: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.customer_display_name = display_name.to_string();
                true
            }
            None => false,
        })
    }

    async fn set_room_status(&self, room_id: RoomId, status: RoomStatus) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.status = status;
                true
            }
            None => false,
        })
    }

    async fn set_room_last_message(&self, room_id: RoomId, summary: &MessageSummary) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.last_message_at = Some(summary.created_at);
                room.last_message = Some(summary.clone());
                true
            }
            None => false,
        })
    }

    async fn set_agent_last_read_at(&self, room_id: RoomId, at: OffsetDateTime) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.rooms.get_mut(&room_id) {
            Some(room) => {
                room.agent_last_read_at = Some(at);
                true
            }
            None => false,
        })
    }

    async fn list_rooms(&self, status: Option<RoomStatus>) -> StoreResult<Vec<Room>> {
        let tables = self.tables.read().await;
        let mut rooms: Vec<Room> = tables
            .rooms
            .values()
            .filter(|room| status.map_or(true, |s| room.status == s))
            .cloned()
            .collect();
        // None sorts below Some, so reversing puts rooms without messages last
        rooms.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(rooms)
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.messages.contains_key(&message.id) {
            return Err(StoreError::Duplicate(format!("message {} already exists", message.id)));
        }
        if !tables.rooms.contains_key(&message.room_id) {
            return Err(StoreError::Backend(format!(
                "room {} does not exist",
                message.room_id
            )));
        }
        tables
            .room_messages
            .entry(message.room_id)
            .or_default()
            .push(message.id);
        tables.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn find_message(&self, message_id: MessageId) -> StoreResult<Option<Message>> {
        let tables = self.tables.read().await;
        Ok(tables.messages.get(&message_id).cloned())
    }

    async fn list_messages(&self, room_id: RoomId, limit: usize) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        let mut messages: Vec<Message> = tables.messages_of(room_id).cloned().collect();
        // Stable sort keeps insertion order for equal timestamps
        messages.sort_by_key(|m| m.created_at);
        messages.truncate(limit);
        Ok(messages)
    }

    async fn count_messages(&self, room_id: RoomId) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .room_messages
            .get(&room_id)
            .map_or(0, |ids| ids.len() as u64))
    }

    async fn count_customer_messages_after(
        &self,
        room_id: RoomId,
        after: Option<OffsetDateTime>,
    ) -> StoreResult<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages_of(room_id)
            .filter(|m| m.user_type == UserType::Customer && !m.is_deleted)
            .filter(|m| after.map_or(true, |at| m.created_at > at))
            .count() as u64)
    }

    async fn latest_customer_message_at_or_before(
        &self,
        room_id: RoomId,
        at: OffsetDateTime,
    ) -> StoreResult<Option<Message>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages_of(room_id)
            .filter(|m| m.user_type == UserType::Customer && m.created_at <= at)
            .max_by_key(|m| m.created_at)
            .cloned())
    }

    async fn set_message_intent(&self, message_id: MessageId, intent: &str, confidence: f64) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.messages.get_mut(&message_id) {
            Some(message) => {
                message.intent = Some(intent.to_string());
                message.intent_confidence = Some(confidence);
                true
            }
            None => false,
        })
    }

    async fn set_message_suggestions(&self, message_id: MessageId, suggestions: &[Suggestion]) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.messages.get_mut(&message_id) {
            Some(message) => {
                message.suggestions = suggestions.to_vec();
                true
            }
            None => false,
        })
    }

    async fn soft_delete_message(&self, message_id: MessageId) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        Ok(match tables.messages.get_mut(&message_id) {
            Some(message) => {
                message.is_deleted = true;
                true
            }
            None => false,
        })
    }

    async fn insert_intent_entry(&self, entry: &IntentAuditEntry) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.intent_audit.push(entry.clone());
        Ok(())
    }

    async fn list_intent_entries_for_message(&self, message_id: MessageId) -> StoreResult<Vec<IntentAuditEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<IntentAuditEntry> = tables
            .intent_audit
            .iter()
            .filter(|e| e.message_id == message_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn list_intent_entries_for_room(&self, room_id: RoomId) -> StoreResult<Vec<IntentAuditEntry>> {
        let tables = self.tables.read().await;
        let mut entries: Vec<IntentAuditEntry> = tables
            .intent_audit
            .iter()
            .filter(|e| e.room_id == room_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn delete_customer_data(&self, customer_id: UserId) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let Some(room_id) = tables.rooms_by_customer.remove(&customer_id) else {
            return Ok(0);
        };

        let mut deleted = 0u64;
        if tables.rooms.remove(&room_id).is_some() {
            deleted += 1;
        }
        for id in tables.room_messages.remove(&room_id).unwrap_or_default() {
            if tables.messages.remove(&id).is_some() {
                deleted += 1;
            }
        }
        let before = tables.intent_audit.len();
        tables.intent_audit.retain(|e| e.room_id != room_id);
        deleted += (before - tables.intent_audit.len()) as u64;

        Ok(deleted)
    }
}
