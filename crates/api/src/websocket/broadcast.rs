//! Broadcast fan-out
//!
//! Delivery is best-effort and at-most-once to whoever is a member when the
//! event is emitted. There is no replay for late joiners.

use chatdesk_shared::RoomId;
use uuid::Uuid;

use super::events::ServerEvent;
use super::presence::{Channel, PresenceRegistry};

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Recipients whose socket had already closed
    pub failed: usize,
}

#[derive(Clone)]
pub struct Broadcaster {
    presence: PresenceRegistry,
}

impl Broadcaster {
    pub fn new(presence: PresenceRegistry) -> Self {
        Self { presence }
    }

    /// Send to every member of a channel
    pub async fn emit(&self, channel: Channel, event: ServerEvent) -> DeliveryReport {
        self.fan_out(channel, event, None).await
    }

    /// Send to every member except the originating session
    pub async fn emit_except(&self, channel: Channel, event: ServerEvent, skip_session: Uuid) -> DeliveryReport {
        self.fan_out(channel, event, Some(skip_session)).await
    }

    pub async fn emit_to_room(&self, room_id: RoomId, event: ServerEvent) -> DeliveryReport {
        self.emit(Channel::Room(room_id), event).await
    }

    pub async fn emit_to_roster(&self, event: ServerEvent) -> DeliveryReport {
        self.emit(Channel::AgentRoster, event).await
    }

    async fn fan_out(&self, channel: Channel, event: ServerEvent, skip_session: Option<Uuid>) -> DeliveryReport {
        let members = self.presence.members_of(channel).await;
        let mut report = DeliveryReport::default();

        for conn in members {
            if Some(conn.session_id) == skip_session {
                continue;
            }
            match conn.send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(
                        session_id = %conn.session_id,
                        "Failed to send event to connection (likely closed)"
                    );
                }
            }
        }

        tracing::debug!(
            channel = ?channel,
            event_type = event.kind(),
            recipients = report.delivered,
            failed = report.failed,
            "Broadcast event"
        );

        report
    }
}
