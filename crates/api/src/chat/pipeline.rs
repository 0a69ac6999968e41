//! Message pipeline: persist, project, fan out, hand off to classification

use std::collections::HashMap;

use chatdesk_shared::{
    Message, MessageId, MessageSummary, MessageView, RoomId, RoomStatus, UserId, UserType,
};

use super::{ChatError, ChatResult, ChatService};
use crate::auth::AuthUser;
use crate::websocket::ServerEvent;

impl ChatService {
    /// Send a message into a room.
    ///
    /// The room's sequencer lock is held from timestamp assignment until the
    /// broadcast has been queued, so members observe persistence order.
    /// Classification is queued after the lock is released and never delays
    /// or fails the send.
    pub async fn send(
        &self,
        room_id: RoomId,
        user_id: UserId,
        user_type: UserType,
        content: &str,
        reply_to_message_id: Option<MessageId>,
    ) -> ChatResult<MessageView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation("message content is empty".to_string()));
        }

        let guard = self.sequencer.lock(room_id).await;

        let mut room = self.room(room_id).await?;
        if room.status == RoomStatus::Closed {
            self.reactivate(&mut room).await?;
        }
        let is_first = self.store.count_messages(room_id).await? == 0;

        let view = self
            .persist_and_deliver(room_id, user_id, user_type, content.to_string(), reply_to_message_id)
            .await?;

        if user_type == UserType::Customer && is_first {
            self.send_auto_reply(room_id).await;
        }

        drop(guard);

        if user_type == UserType::Customer {
            self.classification
                .schedule(view.message.id, view.message.content.clone());
        }

        Ok(view)
    }

    /// One greeting per room, authored by the configured agent. Goes through
    /// the same persist and fan-out steps but never triggers another reply.
    async fn send_auto_reply(&self, room_id: RoomId) {
        let Some(auto_reply) = &self.settings.auto_reply else {
            return;
        };

        match self
            .persist_and_deliver(room_id, auto_reply.agent_id, UserType::Agent, auto_reply.text.clone(), None)
            .await
        {
            Ok(view) => {
                tracing::debug!(room_id = %room_id, message_id = %view.message.id, "Auto reply sent");
            }
            Err(e) => {
                tracing::warn!(room_id = %room_id, error = %e, "Failed to send auto reply");
            }
        }
    }

    async fn persist_and_deliver(
        &self,
        room_id: RoomId,
        user_id: UserId,
        user_type: UserType,
        content: String,
        reply_to_message_id: Option<MessageId>,
    ) -> ChatResult<MessageView> {
        let message = Message::new(
            room_id,
            user_id,
            user_type,
            content,
            self.clock.now(),
            reply_to_message_id,
        );
        self.store.insert_message(&message).await?;

        tracing::debug!(
            room_id = %room_id,
            message_id = %message.id,
            user_type = %user_type,
            "Message persisted"
        );

        let reply_to_message = match reply_to_message_id {
            Some(target) => self.resolve_reply(room_id, target).await,
            None => None,
        };

        if let Err(e) = self
            .store
            .set_room_last_message(room_id, &MessageSummary::from(&message))
            .await
        {
            tracing::warn!(room_id = %room_id, error = %e, "Failed to project last message onto room");
        }

        let view = MessageView {
            message,
            reply_to_message,
        };

        self.broadcaster
            .emit_to_room(
                room_id,
                ServerEvent::NewMessage {
                    room_id,
                    message: view.clone(),
                },
            )
            .await;
        self.broadcaster
            .emit_to_roster(ServerEvent::UpdateRoomList { room_id })
            .await;

        Ok(view)
    }

    /// Snapshot of a reply target. Missing, deleted or foreign-room targets
    /// and lookup failures all yield `None`.
    async fn resolve_reply(&self, room_id: RoomId, target: MessageId) -> Option<Box<Message>> {
        match self.store.find_message(target).await {
            Ok(Some(message)) if reply_target_visible(&message, room_id) => Some(Box::new(message)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(message_id = %target, error = %e, "Failed to resolve reply target");
                None
            }
        }
    }

    /// Messages in ascending `created_at` order, each with its reply snapshot.
    /// Soft-deleted messages are included and flagged.
    pub async fn history(&self, room_id: RoomId, limit: usize) -> ChatResult<Vec<MessageView>> {
        self.room(room_id).await?;
        let messages = self.store.list_messages(room_id, limit).await?;

        let by_id: HashMap<MessageId, &Message> = messages.iter().map(|m| (m.id, m)).collect();
        let mut snapshots: HashMap<MessageId, Option<Box<Message>>> = HashMap::new();

        for target in messages.iter().filter_map(|m| m.reply_to_message_id) {
            if snapshots.contains_key(&target) {
                continue;
            }
            let snapshot = match by_id.get(&target) {
                Some(message) if reply_target_visible(message, room_id) => {
                    Some(Box::new((*message).clone()))
                }
                Some(_) => None,
                None => self.resolve_reply(room_id, target).await,
            };
            snapshots.insert(target, snapshot);
        }

        Ok(messages
            .iter()
            .map(|message| MessageView {
                message: message.clone(),
                reply_to_message: message
                    .reply_to_message_id
                    .and_then(|target| snapshots.get(&target).cloned().flatten()),
            })
            .collect())
    }

    /// Agents may read any message; customers only those in their own room
    pub async fn message_for(&self, message_id: MessageId, user: &AuthUser) -> ChatResult<Message> {
        let message = self.message(message_id).await?;
        if !user.is_agent() {
            self.room_for(message.room_id, user).await?;
        }
        Ok(message)
    }

    /// Soft delete. The message stays in history flagged as deleted.
    pub async fn delete_message(&self, message_id: MessageId) -> ChatResult<Message> {
        let mut message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(ChatError::NotFound("message"))?;

        if !message.is_deleted {
            if !self.store.soft_delete_message(message_id).await? {
                return Err(ChatError::NotFound("message"));
            }
            message.is_deleted = true;
            tracing::info!(message_id = %message_id, room_id = %message.room_id, "Message soft-deleted");
        }
        Ok(message)
    }
}

fn reply_target_visible(message: &Message, room_id: RoomId) -> bool {
    !message.is_deleted && message.room_id == room_id
}
