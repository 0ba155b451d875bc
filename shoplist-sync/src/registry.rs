//! Room membership: list slug → connections currently viewing it.
//!
//! A connection views one list at a time, so the registry keeps a reverse
//! index alongside the room table. Both live under one lock so a join and
//! a concurrent leave can never leave them disagreeing. Rooms exist only
//! while they have members.

use std::collections::{HashMap, HashSet};

use shoplist_core::ListSlug;
use tokio::sync::RwLock;

use crate::connection::ConnectionId;

/// Result of a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Newly added to the room.
    Joined,
    /// Already a member; nothing changed.
    AlreadyMember,
    /// Moved here from another room.
    Moved { from: ListSlug },
}

#[derive(Debug, Default)]
struct Membership {
    rooms: HashMap<ListSlug, HashSet<ConnectionId>>,
    room_of: HashMap<ConnectionId, ListSlug>,
}

impl Membership {
    /// Remove `conn` from `room`, dropping the room once it is empty.
    fn detach(&mut self, conn: &ConnectionId, room: &ListSlug) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(conn);
            if members.is_empty() {
                self.rooms.remove(room);
                log::debug!("Room {room} removed (empty)");
            }
        }
    }
}

/// In-memory room registry.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    inner: RwLock<Membership>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` to `room`, creating the room if needed. Idempotent.
    pub async fn join(&self, room: &ListSlug, conn: ConnectionId) -> JoinOutcome {
        let mut m = self.inner.write().await;

        let previous = m.room_of.insert(conn, room.clone());
        let outcome = match previous {
            Some(prev) if prev == *room => return JoinOutcome::AlreadyMember,
            Some(prev) => {
                m.detach(&conn, &prev);
                JoinOutcome::Moved { from: prev }
            }
            None => JoinOutcome::Joined,
        };

        m.rooms.entry(room.clone()).or_default().insert(conn);
        outcome
    }

    /// Remove `conn` from whatever room it is in. Returns that room.
    pub async fn leave(&self, conn: &ConnectionId) -> Option<ListSlug> {
        let mut m = self.inner.write().await;
        let room = m.room_of.remove(conn)?;
        m.detach(conn, &room);
        Some(room)
    }

    /// Snapshot of the current members of `room` (empty if none).
    pub async fn members_of(&self, room: &ListSlug) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub async fn room_of(&self, conn: &ConnectionId) -> Option<ListSlug> {
        self.inner.read().await.room_of.get(conn).cloned()
    }

    pub async fn member_count(&self, room: &ListSlug) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map_or(0, HashSet::len)
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    /// Slugs of all rooms with at least one member.
    pub async fn active_rooms(&self) -> Vec<ListSlug> {
        self.inner.read().await.rooms.keys().cloned().collect()
    }
}
