//! Mutation events broadcast to everyone viewing a list.
//!
//! On the wire an event is an adjacently tagged JSON object:
//!
//! ```text
//! {"channel":"ItemDeleted","payload":{"listSlug":"groceries","itemId":5}}
//! ```
//!
//! Payload keys also accept the older `shoppingList*` spellings so frames
//! from the previous client keep decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::item::{ItemId, ItemSnapshot, ListSlug};

/// A change to one list, emitted after the store write succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all_fields = "camelCase")]
pub enum ListEvent {
    /// One or more new items, newest batch first on every client.
    ItemsAdded {
        #[serde(alias = "shoppingListSlug", alias = "shoppingListItemSlug")]
        list_slug: ListSlug,
        #[serde(alias = "shoppingListItems")]
        items: Vec<ItemSnapshot>,
    },
    /// An item was checked off; `item` carries `completedAt`/`completedBy`.
    ItemCompleted {
        #[serde(alias = "shoppingListSlug", alias = "shoppingListItemSlug")]
        list_slug: ListSlug,
        #[serde(alias = "shoppingListItem")]
        item: ItemSnapshot,
    },
    ItemDeleted {
        #[serde(alias = "shoppingListSlug")]
        list_slug: ListSlug,
        #[serde(alias = "shoppingListItemId")]
        item_id: ItemId,
    },
}

/// Reasons an inbound event is rejected before it reaches a snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("item {0} has a blank name")]
    BlankName(ItemId),
    #[error("completion event for item {0} carries no completedAt")]
    NotCompleted(ItemId),
    #[error("item {0} names a completer but has no completedAt")]
    CompleterWithoutTimestamp(ItemId),
}

impl ListEvent {
    pub fn items_added(list_slug: ListSlug, items: Vec<ItemSnapshot>) -> Self {
        Self::ItemsAdded { list_slug, items }
    }

    pub fn item_completed(list_slug: ListSlug, item: ItemSnapshot) -> Self {
        Self::ItemCompleted { list_slug, item }
    }

    pub fn item_deleted(list_slug: ListSlug, item_id: ItemId) -> Self {
        Self::ItemDeleted { list_slug, item_id }
    }

    pub fn list_slug(&self) -> &ListSlug {
        match self {
            Self::ItemsAdded { list_slug, .. }
            | Self::ItemCompleted { list_slug, .. }
            | Self::ItemDeleted { list_slug, .. } => list_slug,
        }
    }

    /// Wire channel name of this variant.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::ItemsAdded { .. } => "ItemsAdded",
            Self::ItemCompleted { .. } => "ItemCompleted",
            Self::ItemDeleted { .. } => "ItemDeleted",
        }
    }

    /// Schema checks beyond what deserialization enforces.
    pub fn validate(&self) -> Result<(), EventError> {
        match self {
            Self::ItemsAdded { items, .. } => items.iter().try_for_each(validate_item),
            Self::ItemCompleted { item, .. } => {
                validate_item(item)?;
                if item.completed_at.is_none() {
                    return Err(EventError::NotCompleted(item.id));
                }
                Ok(())
            }
            Self::ItemDeleted { .. } => Ok(()),
        }
    }
}

fn validate_item(item: &ItemSnapshot) -> Result<(), EventError> {
    if item.name.trim().is_empty() {
        return Err(EventError::BlankName(item.id));
    }
    if item.completed_by.is_some() && item.completed_at.is_none() {
        return Err(EventError::CompleterWithoutTimestamp(item.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::UserIdentity;
    use chrono::{TimeZone, Utc};

    fn slug() -> ListSlug {
        ListSlug::parse("groceries").unwrap()
    }

    fn milk() -> ItemSnapshot {
        let t = Utc.with_ymd_and_hms(2024, 5, 4, 8, 0, 0).unwrap();
        ItemSnapshot::new(1, "Milk", t, UserIdentity::new("u1", "Jane"))
    }

    #[test]
    fn test_wire_shape_deleted() {
        let event = ListEvent::item_deleted(slug(), 5);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "channel": "ItemDeleted",
                "payload": {"listSlug": "groceries", "itemId": 5}
            })
        );
    }

    #[test]
    fn test_wire_shape_added() {
        let event = ListEvent::items_added(slug(), vec![milk()]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["channel"], "ItemsAdded");
        assert_eq!(json["payload"]["listSlug"], "groceries");
        assert_eq!(json["payload"]["items"][0]["name"], "Milk");
    }

    #[test]
    fn test_legacy_payload_keys() {
        let raw = r#"{"channel":"ItemDeleted","payload":{"shoppingListSlug":"groceries","shoppingListItemId":9}}"#;
        let event: ListEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event, ListEvent::item_deleted(slug(), 9));

        let raw = r#"{"channel":"ItemsAdded","payload":{"shoppingListItemSlug":"groceries","shoppingListItems":[]}}"#;
        let event: ListEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event, ListEvent::items_added(slug(), vec![]));
    }

    #[test]
    fn test_unknown_channel_rejected() {
        let raw = r#"{"channel":"ItemRenamed","payload":{"listSlug":"groceries"}}"#;
        assert!(serde_json::from_str::<ListEvent>(raw).is_err());
    }

    #[test]
    fn test_channel_matches_tag() {
        for event in [
            ListEvent::items_added(slug(), vec![]),
            ListEvent::item_completed(slug(), milk()),
            ListEvent::item_deleted(slug(), 1),
        ] {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["channel"], event.channel());
            assert_eq!(event.list_slug(), &slug());
        }
    }

    #[test]
    fn test_validate_completion_needs_timestamp() {
        let event = ListEvent::item_completed(slug(), milk());
        assert_eq!(event.validate(), Err(EventError::NotCompleted(1)));

        let done = milk().completed(Utc::now(), UserIdentity::new("u2", "Bob"));
        assert!(ListEvent::item_completed(slug(), done).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_names_and_orphan_completer() {
        let mut blank = milk();
        blank.name = "   ".into();
        assert_eq!(
            ListEvent::items_added(slug(), vec![blank]).validate(),
            Err(EventError::BlankName(1))
        );

        let mut orphan = milk();
        orphan.completed_by = Some(UserIdentity::new("u2", "Bob"));
        assert_eq!(
            ListEvent::items_added(slug(), vec![orphan]).validate(),
            Err(EventError::CompleterWithoutTimestamp(1))
        );
    }
}
