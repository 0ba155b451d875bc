//! Client-side owner of one list's cached snapshot.
//!
//! `LiveList` sits between a [`SyncClient`](crate::client::SyncClient)'s
//! event channel and whatever renders the list. Events are folded in one at a
//! time, in the order they arrive. The connection status is tracked alongside
//! so the UI can show a loading or stale indicator.

use shoplist_core::{Applied, ItemSnapshot, ListSlug, ListSnapshot};
use tokio::sync::mpsc;

use crate::client::{ConnectionState, SyncEvent};

/// Live view of a single list.
#[derive(Debug, Clone)]
pub struct LiveList {
    slug: ListSlug,
    snapshot: Option<ListSnapshot>,
    status: ConnectionState,
    needs_refetch: bool,
    last_rejection: Option<String>,
}

impl LiveList {
    pub fn new(slug: ListSlug) -> Self {
        Self {
            slug,
            snapshot: None,
            status: ConnectionState::Disconnected,
            needs_refetch: false,
            last_rejection: None,
        }
    }

    /// Install an authoritative snapshot fetched from the store.
    ///
    /// Clears the refetch flag. A snapshot of a different list is refused.
    pub fn seed(&mut self, snapshot: ListSnapshot) -> bool {
        if snapshot.slug() != &self.slug {
            log::warn!(
                "Refusing snapshot of {} for live list {}",
                snapshot.slug(),
                self.slug
            );
            return false;
        }
        self.snapshot = Some(snapshot);
        self.needs_refetch = false;
        true
    }

    /// Record that a connection attempt has started.
    pub fn set_status(&mut self, status: ConnectionState) {
        self.status = status;
    }

    /// Fold one client event in.
    pub fn handle(&mut self, event: SyncEvent) -> Applied {
        match event {
            SyncEvent::Remote(event) => match self.snapshot.as_mut() {
                Some(snapshot) => snapshot.apply(&event),
                None => {
                    log::debug!("No snapshot of {} yet; ignoring {}", self.slug, event.channel());
                    Applied::Unchanged
                }
            },
            SyncEvent::Joined {
                list_slug,
                rejoined,
            } => {
                if list_slug == self.slug {
                    self.status = ConnectionState::Connected;
                    if rejoined {
                        // Anything published while we were away is gone.
                        self.needs_refetch = true;
                    }
                }
                Applied::Unchanged
            }
            SyncEvent::Rejected(message) => {
                self.last_rejection = Some(message);
                Applied::Unchanged
            }
            SyncEvent::Disconnected => {
                self.status = ConnectionState::Disconnected;
                Applied::Unchanged
            }
        }
    }

    /// Drain `events` until the channel closes, applying each in order.
    ///
    /// Returns the number of events that changed the snapshot.
    pub async fn follow(&mut self, events: &mut mpsc::Receiver<SyncEvent>) -> usize {
        let mut changed = 0;
        while let Some(event) = events.recv().await {
            if self.handle(event) == Applied::Changed {
                changed += 1;
            }
        }
        changed
    }

    pub fn slug(&self) -> &ListSlug {
        &self.slug
    }

    /// Current items in display order; empty until seeded.
    pub fn items(&self) -> &[ItemSnapshot] {
        self.snapshot.as_ref().map(ListSnapshot::items).unwrap_or(&[])
    }

    pub fn snapshot(&self) -> Option<&ListSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    /// True until both a snapshot is loaded and the join is acknowledged.
    pub fn is_loading(&self) -> bool {
        self.snapshot.is_none() || self.status != ConnectionState::Connected
    }

    /// A snapshot is shown but live updates are not flowing.
    pub fn is_stale(&self) -> bool {
        self.snapshot.is_some() && self.status != ConnectionState::Connected
    }

    pub fn needs_refetch(&self) -> bool {
        self.needs_refetch
    }

    pub fn last_rejection(&self) -> Option<&str> {
        self.last_rejection.as_deref()
    }
}
