//! Per-room serialization of writes

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chatdesk_shared::RoomId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle lock entries are pruned once the table grows past this
const PRUNE_THRESHOLD: usize = 1024;

/// One async lock per room. Holding it spans timestamp assignment,
/// persistence and broadcast, so a room's delivery order equals its
/// persistence order. Rooms never contend with each other.
#[derive(Default)]
pub struct RoomSequencer {
    locks: Mutex<HashMap<RoomId, Arc<AsyncMutex<()>>>>,
}

impl RoomSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, room_id: RoomId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() >= PRUNE_THRESHOLD {
                // Only the table holds a reference: nobody is waiting or holding it
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(room_id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked_rooms(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
