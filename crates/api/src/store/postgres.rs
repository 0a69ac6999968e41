//! PostgreSQL chat store

use async_trait::async_trait;
use chatdesk_shared::{
    AuditEntryId, IntentAuditEntry, Message, MessageId, MessageSummary, Room, RoomId, RoomStatus,
    StoreError, StoreResult, Suggestion, UserId, UserType,
};
use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::ChatStore;

const ROOM_COLUMNS: &str = "id, customer_id, customer_display_name, status, created_at, \
     last_message, last_message_at, agent_last_read_at";

const MESSAGE_COLUMNS: &str = "id, room_id, user_id, user_type, content, created_at, \
     reply_to_message_id, intent, intent_confidence, suggestions, is_deleted";

const AUDIT_COLUMNS: &str =
    "id, message_id, room_id, intent, confidence, classified_by, created_at, note";

#[derive(Debug, FromRow)]
struct RoomRow {
    id: Uuid,
    customer_id: Uuid,
    customer_display_name: String,
    status: String,
    created_at: OffsetDateTime,
    last_message: Option<Json<MessageSummary>>,
    last_message_at: Option<OffsetDateTime>,
    agent_last_read_at: Option<OffsetDateTime>,
}

impl TryFrom<RoomRow> for Room {
    type Error = StoreError;

    fn try_from(row: RoomRow) -> Result<Self, Self::Error> {
        Ok(Room {
            id: RoomId(row.id),
            customer_id: UserId(row.customer_id),
            customer_display_name: row.customer_display_name,
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("room {}: {e}", row.id)))?,
            created_at: row.created_at,
            last_message: row.last_message.map(|Json(summary)| summary),
            last_message_at: row.last_message_at,
            agent_last_read_at: row.agent_last_read_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    room_id: Uuid,
    user_id: Uuid,
    user_type: String,
    content: String,
    created_at: OffsetDateTime,
    reply_to_message_id: Option<Uuid>,
    intent: Option<String>,
    intent_confidence: Option<f64>,
    suggestions: Json<Vec<Suggestion>>,
    is_deleted: bool,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let user_type: UserType = row
            .user_type
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("message {}: {e}", row.id)))?;

        Ok(Message {
            id: MessageId(row.id),
            room_id: RoomId(row.room_id),
            user_id: UserId(row.user_id),
            user_type,
            content: row.content,
            created_at: row.created_at,
            reply_to_message_id: row.reply_to_message_id.map(MessageId),
            intent: row.intent,
            intent_confidence: row.intent_confidence,
            suggestions: row.suggestions.0,
            is_deleted: row.is_deleted,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    message_id: Uuid,
    room_id: Uuid,
    intent: String,
    confidence: f64,
    classified_by: String,
    created_at: OffsetDateTime,
    note: Option<String>,
}

impl From<AuditRow> for IntentAuditEntry {
    fn from(row: AuditRow) -> Self {
        IntentAuditEntry {
            id: AuditEntryId(row.id),
            message_id: MessageId(row.message_id),
            room_id: RoomId(row.room_id),
            intent: row.intent,
            confidence: row.confidence,
            classified_by: row.classified_by,
            created_at: row.created_at,
            note: row.note,
        }
    }
}

fn rooms_from_rows(rows: Vec<RoomRow>) -> StoreResult<Vec<Room>> {
    rows.into_iter().map(Room::try_from).collect()
}

fn messages_from_rows(rows: Vec<MessageRow>) -> StoreResult<Vec<Message>> {
    rows.into_iter().map(Message::try_from).collect()
}

/// Store backed by the `chat_rooms`, `chat_messages`, and `intent_audit` tables
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_room(&self, room_id: RoomId) -> StoreResult<Option<Room>> {
        let row: Option<RoomRow> =
            sqlx::query_as(&format!("SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE id = $1"))
                .bind(room_id.0)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Room::try_from).transpose()
    }

    async fn find_room_by_customer(&self, customer_id: UserId) -> StoreResult<Option<Room>> {
        let row: Option<RoomRow> = sqlx::query_as(&format!(
            "SELECT {ROOM_COLUMNS} FROM chat_rooms WHERE customer_id = $1"
        ))
        .bind(customer_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Room::try_from).transpose()
    }

    async fn insert_room(&self, room: &Room) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_rooms (
                id, customer_id, customer_display_name, status, created_at,
                last_message, last_message_at, agent_last_read_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(room.id.0)
        .bind(room.customer_id.0)
        .bind(&room.customer_display_name)
        .bind(room.status.as_str())
        .bind(room.created_at)
        .bind(room.last_message.as_ref().map(Json))
        .bind(room.last_message_at)
        .bind(room.agent_last_read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_room_display_name(&self, room_id: RoomId, display_name: &str) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE chat_rooms SET customer_display_name = $2 WHERE id = $1")
            .bind(room_id.0)
            .bind(display_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_room_status(&self, room_id: RoomId, status: RoomStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE chat_rooms SET status = $2 WHERE id = $1")
            .bind(room_id.0)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_room_last_message(&self, room_id: RoomId, summary: &MessageSummary) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE chat_rooms SET last_message = $2, last_message_at = $3 WHERE id = $1",
        )
        .bind(room_id.0)
        .bind(Json(summary))
        .bind(summary.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_agent_last_read_at(&self, room_id: RoomId, at: OffsetDateTime) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE chat_rooms SET agent_last_read_at = $2 WHERE id = $1")
            .bind(room_id.0)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_rooms(&self, status: Option<RoomStatus>) -> StoreResult<Vec<Room>> {
        let rows: Vec<RoomRow> = sqlx::query_as(&format!(
            r#"
            SELECT {ROOM_COLUMNS} FROM chat_rooms
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            "#
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rooms_from_rows(rows)
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (
                id, room_id, user_id, user_type, content, created_at,
                reply_to_message_id, intent, intent_confidence, suggestions, is_deleted
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(message.id.0)
        .bind(message.room_id.0)
        .bind(message.user_id.0)
        .bind(message.user_type.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .bind(message.reply_to_message_id.map(|id| id.0))
        .bind(&message.intent)
        .bind(message.intent_confidence)
        .bind(Json(&message.suggestions))
        .bind(message.is_deleted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_message(&self, message_id: MessageId) -> StoreResult<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE id = $1"
        ))
        .bind(message_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Message::try_from).transpose()
    }

    async fn list_messages(&self, room_id: RoomId, limit: usize) -> StoreResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM chat_messages
            WHERE room_id = $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        ))
        .bind(room_id.0)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        messages_from_rows(rows)
    }

    async fn count_messages(&self, room_id: RoomId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE room_id = $1")
            .bind(room_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_customer_messages_after(
        &self,
        room_id: RoomId,
        after: Option<OffsetDateTime>,
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM chat_messages
            WHERE room_id = $1
              AND user_type = 'customer'
              AND NOT is_deleted
              AND ($2::TIMESTAMPTZ IS NULL OR created_at > $2)
            "#,
        )
        .bind(room_id.0)
        .bind(after)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn latest_customer_message_at_or_before(
        &self,
        room_id: RoomId,
        at: OffsetDateTime,
    ) -> StoreResult<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            r#"
            SELECT {MESSAGE_COLUMNS} FROM chat_messages
            WHERE room_id = $1 AND user_type = 'customer' AND created_at <= $2
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(room_id.0)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Message::try_from).transpose()
    }

    async fn set_message_intent(&self, message_id: MessageId, intent: &str, confidence: f64) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE chat_messages SET intent = $2, intent_confidence = $3 WHERE id = $1",
        )
        .bind(message_id.0)
        .bind(intent)
        .bind(confidence)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_message_suggestions(&self, message_id: MessageId, suggestions: &[Suggestion]) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE chat_messages SET suggestions = $2 WHERE id = $1")
            .bind(message_id.0)
            .bind(Json(suggestions))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete_message(&self, message_id: MessageId) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE chat_messages SET is_deleted = TRUE WHERE id = $1")
            .bind(message_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_intent_entry(&self, entry: &IntentAuditEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO intent_audit (
                id, message_id, room_id, intent, confidence, classified_by, created_at, note
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.0)
        .bind(entry.message_id.0)
        .bind(entry.room_id.0)
        .bind(&entry.intent)
        .bind(entry.confidence)
        .bind(&entry.classified_by)
        .bind(entry.created_at)
        .bind(&entry.note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_intent_entries_for_message(&self, message_id: MessageId) -> StoreResult<Vec<IntentAuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(&format!(
            "SELECT {AUDIT_COLUMNS} FROM intent_audit WHERE message_id = $1 ORDER BY created_at ASC"
        ))
        .bind(message_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(IntentAuditEntry::from).collect())
    }

    async fn list_intent_entries_for_room(&self, room_id: RoomId) -> StoreResult<Vec<IntentAuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(&format!(
            "SELECT {AUDIT_COLUMNS} FROM intent_audit WHERE room_id = $1 ORDER BY created_at ASC"
        ))
        .bind(room_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(IntentAuditEntry::from).collect())
    }

    async fn delete_customer_data(&self, customer_id: UserId) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let audit = sqlx::query(
            r#"
            DELETE FROM intent_audit
            WHERE room_id IN (SELECT id FROM chat_rooms WHERE customer_id = $1)
            "#,
        )
        .bind(customer_id.0)
        .execute(&mut *tx)
        .await?;

        let messages = sqlx::query(
            r#"
            DELETE FROM chat_messages
            WHERE room_id IN (SELECT id FROM chat_rooms WHERE customer_id = $1)
            "#,
        )
        .bind(customer_id.0)
        .execute(&mut *tx)
        .await?;

        let rooms = sqlx::query("DELETE FROM chat_rooms WHERE customer_id = $1")
            .bind(customer_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(audit.rows_affected() + messages.rows_affected() + rooms.rows_affected())
    }
}
