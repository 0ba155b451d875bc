//! Shopping list value types shared by server and client.
//!
//! Everything here is an immutable value object as far as the sync layer is
//! concerned: the store produces these from the rows it just wrote, and the
//! client only ever replaces whole items, never patches fields.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Item primary key, unique within a list.
pub type ItemId = u64;

/// Width of the slug column in the store.
pub const MAX_SLUG_LEN: usize = 255;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    #[error("list slug is empty")]
    Empty,
    #[error("list slug is {0} bytes, limit is {MAX_SLUG_LEN}")]
    TooLong(usize),
    #[error("list slug has leading or trailing whitespace")]
    Padded,
}

/// Public identifier of a shopping list; doubles as the room key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListSlug(String);

impl ListSlug {
    pub fn parse(raw: impl Into<String>) -> Result<Self, SlugError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SlugError::Empty);
        }
        if raw.len() > MAX_SLUG_LEN {
            return Err(SlugError::TooLong(raw.len()));
        }
        if raw.trim() != raw {
            return Err(SlugError::Padded);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ListSlug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ListSlug> for String {
    fn from(slug: ListSlug) -> Self {
        slug.0
    }
}

impl fmt::Display for ListSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Measurement unit for an item's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "kg")]
    Kilogram,
    #[serde(rename = "g")]
    Gram,
    #[serde(rename = "L")]
    Litre,
    #[serde(rename = "ml")]
    Millilitre,
    #[serde(rename = "pcs")]
    Pieces,
}

impl Unit {
    pub const ALL: [Unit; 5] = [
        Unit::Kilogram,
        Unit::Gram,
        Unit::Litre,
        Unit::Millilitre,
        Unit::Pieces,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Kilogram => "kg",
            Unit::Gram => "g",
            Unit::Litre => "L",
            Unit::Millilitre => "ml",
            Unit::Pieces => "pcs",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A resolved user record, as attached to items by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            email: None,
            image: None,
        }
    }

    /// Name to show next to an item; falls back to the user id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One shopping list item as of the write that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub unit: Option<Unit>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_by: UserIdentity,
    #[serde(default)]
    pub completed_by: Option<UserIdentity>,
}

impl ItemSnapshot {
    /// A freshly added, uncompleted item.
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        created_by: UserIdentity,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            quantity: None,
            unit: None,
            created_at,
            updated_at: None,
            completed_at: None,
            created_by,
            completed_by: None,
        }
    }

    pub fn with_quantity(mut self, quantity: u32, unit: Option<Unit>) -> Self {
        self.quantity = Some(quantity);
        self.unit = unit;
        self
    }

    /// Copy of this item marked completed by `by` at `at`.
    pub fn completed(&self, at: DateTime<Utc>, by: UserIdentity) -> Self {
        Self {
            updated_at: Some(at),
            completed_at: Some(at),
            completed_by: Some(by),
            ..self.clone()
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Row label, e.g. `Milk (2 L)`.
    pub fn label(&self) -> String {
        match (self.quantity, self.unit) {
            (Some(q), Some(unit)) => format!("{} ({q} {unit})", self.name),
            (Some(q), None) => format!("{} ({q})", self.name),
            _ => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn alice() -> UserIdentity {
        UserIdentity::new("u-alice", "Alice")
    }

    #[test]
    fn test_slug_validation() {
        assert!(ListSlug::parse("groceries").is_ok());
        assert_eq!(ListSlug::parse(""), Err(SlugError::Empty));
        assert_eq!(ListSlug::parse(" groceries"), Err(SlugError::Padded));
        assert_eq!(
            ListSlug::parse("x".repeat(256)),
            Err(SlugError::TooLong(256))
        );
        assert!(ListSlug::parse("x".repeat(255)).is_ok());
    }

    #[test]
    fn test_slug_rejected_on_deserialize() {
        let err = serde_json::from_str::<ListSlug>("\"\"");
        assert!(err.is_err());
        let ok: ListSlug = serde_json::from_str("\"weekend-bbq\"").unwrap();
        assert_eq!(ok.as_str(), "weekend-bbq");
    }

    #[test]
    fn test_unit_wire_names() {
        let encoded: Vec<String> = Unit::ALL
            .iter()
            .map(|u| serde_json::to_string(u).unwrap())
            .collect();
        assert_eq!(encoded, ["\"kg\"", "\"g\"", "\"L\"", "\"ml\"", "\"pcs\""]);
        assert!(serde_json::from_str::<Unit>("\"liters\"").is_err());
    }

    #[test]
    fn test_item_camel_case_fields() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let item = ItemSnapshot::new(7, "Milk", t, alice()).with_quantity(2, Some(Unit::Litre));
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["unit"], "L");
        assert_eq!(json["createdBy"]["name"], "Alice");
        assert!(json["completedAt"].is_null());
        assert!(json["completedBy"].is_null());
    }

    #[test]
    fn test_item_accepts_store_row_shape() {
        // Extra row columns are ignored; optional columns may be absent.
        let raw = r#"{
            "id": 3,
            "shoppingListId": 12,
            "name": "Eggs",
            "quantity": 12,
            "unit": "pcs",
            "createdById": "u-bob",
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-01T10:00:00.000Z",
            "completedAt": null,
            "completedById": null,
            "createdBy": {"id": "u-bob", "name": "Bob", "email": "bob@example.com", "image": null},
            "completedBy": null
        }"#;
        let item: ItemSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(item.id, 3);
        assert_eq!(item.unit, Some(Unit::Pieces));
        assert_eq!(item.created_by.display_name(), "Bob");
        assert!(!item.is_completed());
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let raw = r#"{"id":1,"name":"Rice","quantity":-1,"createdAt":"2024-03-01T10:00:00Z","createdBy":{"id":"u"}}"#;
        assert!(serde_json::from_str::<ItemSnapshot>(raw).is_err());
    }

    #[test]
    fn test_completed_copy() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let done = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let item = ItemSnapshot::new(1, "Bread", t, alice());
        let bob = UserIdentity::new("u-bob", "Bob");

        let completed = item.completed(done, bob.clone());
        assert!(completed.is_completed());
        assert_eq!(completed.completed_by, Some(bob));
        assert_eq!(completed.created_at, t);
        assert!(!item.is_completed());
    }

    #[test]
    fn test_label() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let plain = ItemSnapshot::new(1, "Butter", t, alice());
        assert_eq!(plain.label(), "Butter");
        assert_eq!(plain.clone().with_quantity(2, Some(Unit::Kilogram)).label(), "Butter (2 kg)");
        assert_eq!(plain.with_quantity(3, None).label(), "Butter (3)");
    }

    #[test]
    fn test_display_name_fallback() {
        let anon = UserIdentity {
            id: "u-42".into(),
            name: None,
            email: None,
            image: None,
        };
        assert_eq!(anon.display_name(), "u-42");
    }
}
