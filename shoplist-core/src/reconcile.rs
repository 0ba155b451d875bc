//! Client-side merge of live events into a cached list.
//!
//! The cache is an ordered `Vec<ItemSnapshot>`. Every event is folded in
//! without touching the network, and after every event the sequence obeys
//! [`display_order`]: open items first (newest first), then completed
//! items (oldest completion first).
//!
//! Delivery is best effort, so every handler tolerates duplicates:
//!
//! | Event           | Present id                  | Absent id        |
//! |-----------------|-----------------------------|------------------|
//! | `ItemsAdded`    | skipped                     | prepended        |
//! | `ItemCompleted` | replaced, whole list sorted | no-op            |
//! | `ItemDeleted`   | removed                     | no-op            |

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::event::ListEvent;
use crate::item::{ItemId, ItemSnapshot, ListSlug};

/// Whether applying an event changed the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

/// Display order of two items.
///
/// Equal keys compare `Equal`; callers rely on a stable sort to keep the
/// existing relative order in that case.
pub fn display_order(a: &ItemSnapshot, b: &ItemSnapshot) -> Ordering {
    match (a.completed_at, b.completed_at) {
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a_done), Some(b_done)) => a_done.cmp(&b_done),
        (None, None) => b.created_at.cmp(&a.created_at),
    }
}

/// Locally cached view of one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSnapshot {
    slug: ListSlug,
    items: Vec<ItemSnapshot>,
}

impl ListSnapshot {
    /// Seed from an authoritative fetch. The fetched order is normalised so
    /// the invariant holds from the start.
    pub fn new(slug: ListSlug, mut items: Vec<ItemSnapshot>) -> Self {
        items.sort_by(display_order);
        Self { slug, items }
    }

    pub fn empty(slug: ListSlug) -> Self {
        Self {
            slug,
            items: Vec::new(),
        }
    }

    pub fn slug(&self) -> &ListSlug {
        &self.slug
    }

    pub fn items(&self) -> &[ItemSnapshot] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemSnapshot> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Number of items not yet checked off.
    pub fn open_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_completed()).count()
    }

    /// Fold one event into the snapshot in place.
    ///
    /// Events for another list are ignored.
    pub fn apply(&mut self, event: &ListEvent) -> Applied {
        if event.list_slug() != &self.slug {
            log::debug!(
                "Ignoring {} for list {} in snapshot of {}",
                event.channel(),
                event.list_slug(),
                self.slug
            );
            return Applied::Unchanged;
        }

        match event {
            ListEvent::ItemsAdded { items, .. } => self.prepend(items),
            ListEvent::ItemCompleted { item, .. } => self.complete(item),
            ListEvent::ItemDeleted { item_id, .. } => self.delete(*item_id),
        }
    }

    fn prepend(&mut self, added: &[ItemSnapshot]) -> Applied {
        let mut seen: HashSet<ItemId> = self.items.iter().map(|item| item.id).collect();
        let fresh: Vec<ItemSnapshot> = added
            .iter()
            .filter(|item| seen.insert(item.id))
            .cloned()
            .collect();

        if fresh.is_empty() {
            return Applied::Unchanged;
        }

        let needs_sort = fresh.iter().any(ItemSnapshot::is_completed);
        let mut merged = fresh;
        merged.append(&mut self.items);
        self.items = merged;
        if needs_sort {
            self.items.sort_by(display_order);
        }
        Applied::Changed
    }

    fn complete(&mut self, updated: &ItemSnapshot) -> Applied {
        let Some(slot) = self.items.iter_mut().find(|item| item.id == updated.id) else {
            return Applied::Unchanged;
        };
        if *slot == *updated {
            return Applied::Unchanged;
        }

        *slot = updated.clone();
        // Full re-sort on every completion.
        self.items.sort_by(display_order);
        Applied::Changed
    }

    fn delete(&mut self, id: ItemId) -> Applied {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() == before {
            Applied::Unchanged
        } else {
            Applied::Changed
        }
    }
}

/// Pure reducer form of [`ListSnapshot::apply`].
pub fn reduce(mut snapshot: ListSnapshot, event: &ListEvent) -> ListSnapshot {
    snapshot.apply(event);
    snapshot
}

/// Reducer over a cache entry that may not be loaded yet.
///
/// Without a snapshot there is nothing to merge into, so the event is
/// dropped and the next full fetch provides the state.
pub fn reduce_cached(snapshot: Option<ListSnapshot>, event: &ListEvent) -> Option<ListSnapshot> {
    snapshot.map(|s| reduce(s, event))
}

/// True when every adjacent pair obeys [`display_order`].
pub fn is_display_ordered(items: &[ItemSnapshot]) -> bool {
    items
        .windows(2)
        .all(|pair| display_order(&pair[0], &pair[1]) != Ordering::Greater)
}
