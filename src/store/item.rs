//! # Item Model
//!
//! Every persisted domain object — note, notebook, tag, reminder, settings
//! entry, history session, attachment manifest — is an [`Item`].
//!
//! Soft deletion is modeled as a tagged variant rather than a `deleted`
//! boolean: an item is either [`Active`](Item::Active) with a payload, or a
//! [`Tombstone`](Item::Tombstone) that keeps the id alive so the deletion
//! can propagate to other replicas before physical removal. Every read path
//! has to match both cases explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::now_timestamp_millis;

/// Current schema version; the migrator brings older items up to this
pub const CURRENT_VERSION: u32 = 5;

/// Discriminator for the domain object an [`ActiveItem`] carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A note
    Note,
    /// A notebook grouping notes
    Notebook,
    /// A tag
    Tag,
    /// A reminder
    Reminder,
    /// A settings entry
    Settings,
    /// A note-history session snapshot
    Session,
    /// An attachment manifest
    Attachment,
}

impl ItemKind {
    /// Stable lowercase name, used in storage keys and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Note => "note",
            ItemKind::Notebook => "notebook",
            ItemKind::Tag => "tag",
            ItemKind::Reminder => "reminder",
            ItemKind::Settings => "settings",
            ItemKind::Session => "session",
            ItemKind::Attachment => "attachment",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live domain object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveItem {
    /// Unique id; also the storage key within the collection
    pub id: String,
    /// What kind of object the payload is
    pub kind: ItemKind,
    /// Schema version the payload was written at
    pub version: u32,
    /// Creation time, Unix millis
    pub date_created: i64,
    /// Last modification time, Unix millis
    pub date_modified: i64,
    /// The domain payload
    pub data: Value,
}

impl ActiveItem {
    /// Create a new item at the current schema version, timestamped now
    pub fn new(kind: ItemKind, id: impl Into<String>, data: Value) -> Self {
        let now = now_timestamp_millis();
        Self {
            id: id.into(),
            kind,
            version: CURRENT_VERSION,
            date_created: now,
            date_modified: now,
            data,
        }
    }
}

/// A soft-deleted item: the id survives, the payload is gone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Id of the deleted item
    pub id: String,
    /// When the deletion happened, Unix millis
    pub date_deleted: i64,
}

impl Tombstone {
    /// Tombstone an id as of now
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            date_deleted: now_timestamp_millis(),
        }
    }
}

/// A persisted item: live or soft-deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Item {
    /// Live item with a payload
    Active(ActiveItem),
    /// Soft-deleted marker retained for sync propagation
    Tombstone(Tombstone),
}

impl Item {
    /// The item's id, live or not
    pub fn id(&self) -> &str {
        match self {
            Item::Active(item) => &item.id,
            Item::Tombstone(t) => &t.id,
        }
    }

    /// Last-touched timestamp: `date_modified` for live items,
    /// `date_deleted` for tombstones
    pub fn date_modified(&self) -> i64 {
        match self {
            Item::Active(item) => item.date_modified,
            Item::Tombstone(t) => t.date_deleted,
        }
    }

    /// Whether this is a soft-delete marker
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Item::Tombstone(_))
    }

    /// Borrow the live item, if any
    pub fn as_active(&self) -> Option<&ActiveItem> {
        match self {
            Item::Active(item) => Some(item),
            Item::Tombstone(_) => None,
        }
    }

    /// Consume into the live item, if any
    pub fn into_active(self) -> Option<ActiveItem> {
        match self {
            Item::Active(item) => Some(item),
            Item::Tombstone(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_item_defaults() {
        let item = ActiveItem::new(ItemKind::Note, "n1", json!({"title": "hello"}));

        assert_eq!(item.id, "n1");
        assert_eq!(item.version, CURRENT_VERSION);
        assert_eq!(item.date_created, item.date_modified);
    }

    #[test]
    fn test_serde_state_tag() {
        let active = Item::Active(ActiveItem::new(ItemKind::Note, "n1", json!({})));
        let json = serde_json::to_string(&active).unwrap();
        assert!(json.contains("\"state\":\"active\""));

        let tombstone = Item::Tombstone(Tombstone::new("n1"));
        let json = serde_json::to_string(&tombstone).unwrap();
        assert!(json.contains("\"state\":\"tombstone\""));

        let parsed: Item = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_tombstone());
        assert_eq!(parsed.id(), "n1");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ItemKind::Note.as_str(), "note");
        assert_eq!(ItemKind::Session.to_string(), "session");
        assert_eq!(
            serde_json::to_string(&ItemKind::Notebook).unwrap(),
            "\"notebook\""
        );
    }

    #[test]
    fn test_active_accessors() {
        let item = Item::Active(ActiveItem::new(ItemKind::Tag, "t1", json!({"name": "work"})));
        assert!(!item.is_tombstone());
        assert_eq!(item.as_active().unwrap().data["name"], "work");
        assert!(item.into_active().is_some());

        let t = Item::Tombstone(Tombstone::new("t1"));
        assert!(t.as_active().is_none());
    }
}
