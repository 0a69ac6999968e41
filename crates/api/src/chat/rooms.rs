//! Room lifecycle: idempotent creation, closure, read receipts

use chatdesk_shared::{LastSeen, Room, RoomId, RoomOverview, RoomStatus, StoreError, UserId};
use futures::future::try_join_all;
use time::OffsetDateTime;

use super::{ChatError, ChatResult, ChatService};
use crate::auth::AuthUser;
use crate::websocket::ServerEvent;

impl ChatService {
    /// Look up the customer's room, creating it on first contact.
    ///
    /// Returns `(room, created)`. Concurrent first contacts race on the
    /// store's unique `customer_id`; the loser re-reads the winner's room.
    pub async fn get_or_create_room(&self, customer_id: UserId, display_name: &str) -> ChatResult<(Room, bool)> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ChatError::Validation("display name is empty".to_string()));
        }

        if let Some(room) = self.store.find_room_by_customer(customer_id).await? {
            return Ok((self.refresh_display_name(room, display_name).await?, false));
        }

        let room = Room::new(customer_id, display_name.to_string(), self.clock.now());
        match self.store.insert_room(&room).await {
            Ok(()) => {
                tracing::info!(room_id = %room.id, customer_id = %customer_id, "Room created");
                self.broadcaster
                    .emit_to_roster(ServerEvent::NewRoom { room: room.clone() })
                    .await;
                Ok((room, true))
            }
            Err(StoreError::Duplicate(_)) => {
                tracing::debug!(customer_id = %customer_id, "Lost room creation race, re-reading");
                let room = self
                    .store
                    .find_room_by_customer(customer_id)
                    .await?
                    .ok_or(ChatError::NotFound("room"))?;
                Ok((self.refresh_display_name(room, display_name).await?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_display_name(&self, mut room: Room, display_name: &str) -> ChatResult<Room> {
        if room.customer_display_name != display_name {
            self.store.update_room_display_name(room.id, display_name).await?;
            room.customer_display_name = display_name.to_string();
        }
        Ok(room)
    }

    pub async fn room(&self, room_id: RoomId) -> ChatResult<Room> {
        self.store
            .find_room(room_id)
            .await?
            .ok_or(ChatError::NotFound("room"))
    }

    /// Agents may act on any room; customers only on their own
    pub async fn room_for(&self, room_id: RoomId, user: &AuthUser) -> ChatResult<Room> {
        let room = self.room(room_id).await?;
        if user.is_agent() || room.customer_id == user.user_id {
            Ok(room)
        } else {
            Err(ChatError::Forbidden)
        }
    }

    /// Dashboard listing, most recent activity first
    pub async fn list_rooms(&self, status: Option<RoomStatus>) -> ChatResult<Vec<RoomOverview>> {
        let rooms = self.store.list_rooms(status).await?;
        let overviews = try_join_all(rooms.into_iter().map(|room| async move {
            let unread_count = self
                .store
                .count_customer_messages_after(room.id, room.agent_last_read_at)
                .await?;
            Ok::<_, StoreError>(RoomOverview { room, unread_count })
        }))
        .await?;
        Ok(overviews)
    }

    pub async fn close(&self, room_id: RoomId) -> ChatResult<Room> {
        let _guard = self.sequencer.lock(room_id).await;
        let mut room = self.room(room_id).await?;
        if room.status == RoomStatus::Closed {
            return Ok(room);
        }

        if !self.store.set_room_status(room_id, RoomStatus::Closed).await? {
            return Err(ChatError::NotFound("room"));
        }
        room.status = RoomStatus::Closed;
        tracing::info!(room_id = %room_id, "Room closed");

        self.announce_status(room_id, RoomStatus::Closed).await;
        Ok(room)
    }

    /// Reopen a closed room that received a new message. Caller holds the
    /// room's sequencer lock.
    pub(super) async fn reactivate(&self, room: &mut Room) -> ChatResult<()> {
        self.store.set_room_status(room.id, RoomStatus::Active).await?;
        room.status = RoomStatus::Active;
        tracing::info!(room_id = %room.id, "Closed room reactivated by new message");

        self.announce_status(room.id, RoomStatus::Active).await;
        Ok(())
    }

    async fn announce_status(&self, room_id: RoomId, status: RoomStatus) {
        self.broadcaster
            .emit_to_room(room_id, ServerEvent::RoomUpdated { room_id, status })
            .await;
        self.broadcaster
            .emit_to_roster(ServerEvent::UpdateRoomList { room_id })
            .await;
    }

    /// Customer messages the agent side has not read yet
    pub async fn compute_unread_count(&self, room_id: RoomId) -> ChatResult<u64> {
        let room = self.room(room_id).await?;
        Ok(self
            .store
            .count_customer_messages_after(room_id, room.agent_last_read_at)
            .await?)
    }

    /// Record that the agent side has read the room up to now. Taken under
    /// the room's sequencer lock so the mark never falls inside a send.
    pub async fn mark_read_by_agent(&self, room_id: RoomId) -> ChatResult<OffsetDateTime> {
        let _guard = self.sequencer.lock(room_id).await;
        let at = self.clock.now();
        if !self.store.set_agent_last_read_at(room_id, at).await? {
            return Err(ChatError::NotFound("room"));
        }
        tracing::debug!(room_id = %room_id, "Room marked read by agent");
        Ok(at)
    }

    /// Newest customer message at or before the agent's read mark
    pub async fn last_seen_by_customer(&self, room_id: RoomId) -> ChatResult<Option<LastSeen>> {
        let room = self.room(room_id).await?;
        let Some(read_at) = room.agent_last_read_at else {
            return Ok(None);
        };

        let message = self
            .store
            .latest_customer_message_at_or_before(room_id, read_at)
            .await?;
        Ok(message.map(|m| LastSeen {
            user_id: m.user_id,
            user_type: m.user_type,
            last_message_id: m.id,
        }))
    }

    /// Erase a customer's room, messages and intent history
    pub async fn delete_customer_data(&self, customer_id: UserId) -> ChatResult<u64> {
        let deleted = self.store.delete_customer_data(customer_id).await?;
        tracing::info!(customer_id = %customer_id, deleted, "Customer data deleted");
        Ok(deleted)
    }
}
