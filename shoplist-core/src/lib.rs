//! # shoplist-core: Shared list model and live-update reconciliation
//!
//! Value types for shopping list items, the mutation events broadcast when
//! a list changes, and the pure merge that folds those events into a
//! client's cached copy of the list.
//!
//! ```text
//!   store write ──► ListEvent ──► (sync layer) ──► ListSnapshot::apply
//!                                                     │
//!                                                     ▼
//!                                   open items (newest first)
//!                                   completed items (oldest first)
//! ```
//!
//! ## Modules
//!
//! - [`item`]: `ItemSnapshot`, `ListSlug`, `Unit`, `UserIdentity`
//! - [`event`]: `ListEvent` tagged union and its validation
//! - [`reconcile`]: snapshot reducer and display ordering

pub mod item;
pub mod event;
pub mod reconcile;

pub use item::{ItemId, ItemSnapshot, ListSlug, SlugError, Unit, UserIdentity, MAX_SLUG_LEN};
pub use event::{EventError, ListEvent};
pub use reconcile::{
    display_order, is_display_ordered, reduce, reduce_cached, Applied, ListSnapshot,
};
