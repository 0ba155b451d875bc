//! Fan-out of list events to every connection in a room.
//!
//! Publishing is fire-and-forget: the event is encoded once, the room's
//! member list is snapshotted, and each member's outbound queue gets a
//! `try_send`. Nothing waits on delivery and nothing is retried; the store
//! holds the canonical state and a reload recovers anything missed.
//!
//! ```text
//! mutation API ──publish(room, event)──► members_of(room)  (snapshot)
//!                                             │
//!                        ┌────────────────────┼────────────────────┐
//!                        ▼                    ▼                    ▼
//!                   queue(conn A)        queue(conn B)        queue(conn C)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use shoplist_core::{ListEvent, ListSlug};
use tokio::sync::mpsc::error::TrySendError;

use crate::connection::{ConnectionId, Connections};
use crate::protocol::{encode_event, ProtocolError};
use crate::registry::RoomRegistry;

/// Statistics for monitoring broadcast health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub events_published: u64,
    pub frames_queued: u64,
    pub frames_dropped: u64,
}

/// Counters touched on every publish; read via `stats()`.
#[derive(Debug, Default)]
struct AtomicBroadcastStats {
    events_published: AtomicU64,
    frames_queued: AtomicU64,
    frames_dropped: AtomicU64,
}

/// Publishes events into rooms. Cheap to clone; hand one to the mutation API.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    registry: Arc<RoomRegistry>,
    connections: Arc<Connections>,
    stats: Arc<AtomicBroadcastStats>,
}

impl EventBroadcaster {
    pub fn new(registry: Arc<RoomRegistry>, connections: Arc<Connections>) -> Self {
        Self {
            registry,
            connections,
            stats: Arc::new(AtomicBroadcastStats::default()),
        }
    }

    /// Send `event` to every current member of `room`.
    ///
    /// Returns how many connections the frame was queued for. An empty or
    /// unknown room yields `Ok(0)`.
    pub async fn publish(&self, room: &ListSlug, event: &ListEvent) -> Result<usize, ProtocolError> {
        self.fan_out(room, event, None).await
    }

    /// Like [`publish`](Self::publish) but skips the connection that caused
    /// the mutation.
    pub async fn publish_except(
        &self,
        room: &ListSlug,
        event: &ListEvent,
        origin: ConnectionId,
    ) -> Result<usize, ProtocolError> {
        self.fan_out(room, event, Some(origin)).await
    }

    async fn fan_out(
        &self,
        room: &ListSlug,
        event: &ListEvent,
        skip: Option<ConnectionId>,
    ) -> Result<usize, ProtocolError> {
        if event.list_slug() != room {
            log::warn!(
                "Publishing {} for list {} into room {room}",
                event.channel(),
                event.list_slug()
            );
        }

        let mut members = self.registry.members_of(room).await;
        if let Some(origin) = skip {
            members.retain(|m| *m != origin);
        }
        self.stats.events_published.fetch_add(1, Ordering::Relaxed);
        if members.is_empty() {
            log::debug!("No listeners in {room} for {}", event.channel());
            return Ok(0);
        }

        let frame = encode_event(event)?;
        let targets = self.connections.senders_for(&members).await;

        let mut queued = 0;
        for (conn, sender) in targets {
            match sender.try_send(frame.clone()) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Outbound queue full for {conn}; dropped {}", event.channel());
                }
                // Mid-disconnect; nothing to do.
                Err(TrySendError::Closed(_)) => {}
            }
        }
        self.stats
            .frames_queued
            .fetch_add(queued as u64, Ordering::Relaxed);

        log::debug!("{} → {room}: queued for {queued} connection(s)", event.channel());
        Ok(queued)
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            events_published: self.stats.events_published.load(Ordering::Relaxed),
            frames_queued: self.stats.frames_queued.load(Ordering::Relaxed),
            frames_dropped: self.stats.frames_dropped.load(Ordering::Relaxed),
        }
    }
}
