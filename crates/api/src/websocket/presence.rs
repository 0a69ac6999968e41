//! Presence registry
//!
//! Tracks authenticated sessions and which channels each one listens on.
//! Two tables, both behind one lock so they never disagree:
//!
//! - sessions: session id -> connection plus the channels it joined
//! - channels: channel -> member session ids
//!
//! A channel entry exists only while it has members.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chatdesk_shared::RoomId;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::Connection;

/// Multicast target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Room(RoomId),
    /// Every connected agent. Joined automatically on registration.
    AgentRoster,
}

struct Session {
    conn: Arc<Connection>,
    channels: HashSet<Channel>,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, Session>,
    channels: HashMap<Channel, HashSet<Uuid>>,
}

impl Tables {
    fn add_member(&mut self, session_id: Uuid, channel: Channel) -> bool {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };
        session.channels.insert(channel);
        self.channels.entry(channel).or_default().insert(session_id);
        true
    }

    fn remove_member(&mut self, session_id: Uuid, channel: Channel) -> bool {
        let removed = self
            .sessions
            .get_mut(&session_id)
            .is_some_and(|session| session.channels.remove(&channel));

        if let Some(members) = self.channels.get_mut(&channel) {
            members.remove(&session_id);
            if members.is_empty() {
                self.channels.remove(&channel);
            }
        }
        removed
    }
}

/// Registry of live sessions, shared by every connection
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    tables: Arc<RwLock<Tables>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an authenticated connection. Agents join the roster channel.
    pub async fn register(&self, conn: Connection) -> Arc<Connection> {
        let conn = Arc::new(conn);
        let mut tables = self.tables.write().await;

        tables.sessions.insert(
            conn.session_id,
            Session {
                conn: Arc::clone(&conn),
                channels: HashSet::new(),
            },
        );
        if conn.user_type.is_agent() {
            tables.add_member(conn.session_id, Channel::AgentRoster);
        }

        tracing::info!(
            session_id = %conn.session_id,
            user_id = %conn.user_id,
            user_type = %conn.user_type,
            total_connections = tables.sessions.len(),
            "WebSocket connection added"
        );

        conn
    }

    /// Returns false if the session is unknown
    pub async fn join(&self, session_id: Uuid, channel: Channel) -> bool {
        let mut tables = self.tables.write().await;
        let joined = tables.add_member(session_id, channel);
        if joined {
            tracing::debug!(
                session_id = %session_id,
                channel = ?channel,
                channel_size = tables.channels.get(&channel).map_or(0, HashSet::len),
                "Session joined channel"
            );
        }
        joined
    }

    /// Returns false if the session was not a member
    pub async fn leave(&self, session_id: Uuid, channel: Channel) -> bool {
        let mut tables = self.tables.write().await;
        let left = tables.remove_member(session_id, channel);
        if left {
            tracing::debug!(session_id = %session_id, channel = ?channel, "Session left channel");
        }
        left
    }

    /// Connections currently listening on a channel
    pub async fn members_of(&self, channel: Channel) -> Vec<Arc<Connection>> {
        let tables = self.tables.read().await;
        tables
            .channels
            .get(&channel)
            .into_iter()
            .flatten()
            .filter_map(|id| tables.sessions.get(id))
            .map(|session| Arc::clone(&session.conn))
            .collect()
    }

    /// Remove a session and prune it from every channel it belonged to
    pub async fn on_disconnect(&self, session_id: Uuid) -> Option<Arc<Connection>> {
        let mut tables = self.tables.write().await;
        let session = tables.sessions.remove(&session_id)?;

        for channel in &session.channels {
            if let Some(members) = tables.channels.get_mut(channel) {
                members.remove(&session_id);
                if members.is_empty() {
                    tables.channels.remove(channel);
                }
            }
        }

        tracing::info!(
            session_id = %session_id,
            user_id = %session.conn.user_id,
            channel_count = session.channels.len(),
            remaining_connections = tables.sessions.len(),
            "WebSocket connection removed"
        );

        Some(session.conn)
    }

    pub async fn session(&self, session_id: Uuid) -> Option<Arc<Connection>> {
        let tables = self.tables.read().await;
        tables.sessions.get(&session_id).map(|s| Arc::clone(&s.conn))
    }

    pub async fn is_member(&self, session_id: Uuid, channel: Channel) -> bool {
        let tables = self.tables.read().await;
        tables
            .channels
            .get(&channel)
            .is_some_and(|members| members.contains(&session_id))
    }

    /// Get statistics about live sessions
    pub async fn stats(&self) -> PresenceStats {
        let tables = self.tables.read().await;
        PresenceStats {
            active_connections: tables.sessions.len(),
            active_channels: tables.channels.len(),
            agents_online: tables
                .channels
                .get(&Channel::AgentRoster)
                .map_or(0, HashSet::len),
        }
    }
}

/// Statistics about WebSocket sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PresenceStats {
    pub active_connections: usize,
    /// Channels with at least one member
    pub active_channels: usize,
    pub agents_online: usize,
}
