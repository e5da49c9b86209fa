use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier of a shopping list item.
///
/// Generated as a random UUID on creation and never changed afterwards.
/// Treated as an opaque string everywhere else, including on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a new random item ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl FromStr for ItemId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

/// Current time truncated to millisecond precision.
///
/// Item timestamps travel as epoch millis, so anything finer would make a
/// freshly pushed item compare as newer than its own remote copy.
pub fn now() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

/// Convert epoch millis into a UTC timestamp (epoch on overflow).
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub quantity: i32,
    pub note: Option<String>,
    pub is_bought: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    pub fn new(name: impl Into<String>, quantity: i32) -> Self {
        let now = now();
        Self {
            id: ItemId::new(),
            name: name.into(),
            quantity,
            note: None,
            is_bought: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_bought(mut self, is_bought: bool) -> Self {
        self.is_bought = is_bought;
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Returns a copy with new user-editable fields and a refreshed
    /// `updated_at`. Identity, creation time and bought state are kept.
    pub fn edited(&self, name: impl Into<String>, quantity: i32, note: Option<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            note,
            updated_at: self.next_update_time(),
            ..self.clone()
        }
    }

    /// Timestamp for the next user-initiated change. Always strictly later
    /// than the current one, even if the wall clock is behind it.
    pub fn next_update_time(&self) -> DateTime<Utc> {
        now().max(self.updated_at + Duration::milliseconds(1))
    }

    pub fn updated_millis(&self) -> i64 {
        self.updated_at.timestamp_millis()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let check = if self.is_bought { "[x]" } else { "[ ]" };
        write!(f, "{} {} x{}", check, self.name, self.quantity)?;
        if let Some(note) = &self.note {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}

/// An item as persisted locally, with its sync marker.
///
/// `synced_with_remote` is true only while the local copy is known to match
/// the remote copy as of `item.updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredItem {
    #[serde(flatten)]
    pub item: Item,
    pub synced_with_remote: bool,
}

impl StoredItem {
    pub fn new(item: Item, synced_with_remote: bool) -> Self {
        Self {
            item,
            synced_with_remote,
        }
    }

    pub fn unsynced(item: Item) -> Self {
        Self::new(item, false)
    }

    pub fn synced(item: Item) -> Self {
        Self::new(item, true)
    }

    pub fn id(&self) -> &ItemId {
        &self.item.id
    }

    pub fn with_synced(mut self, synced: bool) -> Self {
        self.synced_with_remote = synced;
        self
    }
}

/// Wire representation of an item. Timestamps are epoch millis and there is
/// no notion of "synced" on the remote side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteItem {
    pub id: ItemId,
    pub name: String,
    pub quantity: i32,
    #[serde(default)]
    pub note: Option<String>,
    pub is_bought: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl RemoteItem {
    pub fn into_item(self) -> Item {
        Item {
            id: self.id,
            name: self.name,
            quantity: self.quantity,
            note: self.note,
            is_bought: self.is_bought,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
        }
    }
}

impl From<&Item> for RemoteItem {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            quantity: item.quantity,
            note: item.note.clone(),
            is_bought: item.is_bought,
            created_at: item.created_at.timestamp_millis(),
            updated_at: item.updated_at.timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_new() {
        let item = Item::new("Milk", 2);
        assert_eq!(item.name, "Milk");
        assert_eq!(item.quantity, 2);
        assert!(item.note.is_none());
        assert!(!item.is_bought);
        assert_eq!(item.created_at, item.updated_at);
    }

    #[test]
    fn test_timestamps_have_millisecond_precision() {
        let item = Item::new("Eggs", 12);
        assert_eq!(item.updated_at.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_edited_keeps_identity_and_refreshes_updated_at() {
        let original = Item::new("Bread", 1)
            .with_bought(true)
            .with_updated_at(from_millis(100));

        let edited = original.edited("Rye bread", 2, Some("sliced".into()));

        assert_eq!(edited.id, original.id);
        assert_eq!(edited.created_at, original.created_at);
        assert!(edited.is_bought);
        assert_eq!(edited.name, "Rye bread");
        assert_eq!(edited.note.as_deref(), Some("sliced"));
        assert!(edited.updated_at > original.updated_at);
    }

    #[test]
    fn test_next_update_time_moves_past_a_future_timestamp() {
        let future = now() + chrono::Duration::hours(1);
        let item = Item::new("Tea", 1).with_updated_at(future);
        assert_eq!(
            item.next_update_time(),
            future + chrono::Duration::milliseconds(1)
        );
    }

    #[test]
    fn test_edits_in_the_same_millisecond_still_advance() {
        let item = Item::new("Tea", 1);
        let first = item.edited("Tea", 2, None);
        let second = first.edited("Tea", 3, None);
        assert!(first.updated_at > item.updated_at);
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn test_remote_item_wire_format() {
        let item = Item::new("Butter", 1)
            .with_note("salted")
            .with_updated_at(from_millis(1_700_000_000_123));
        let remote = RemoteItem::from(&item);

        let json = serde_json::to_value(&remote).unwrap();
        assert_eq!(json["id"], item.id.as_str());
        assert_eq!(json["isBought"], false);
        assert_eq!(json["updatedAt"], 1_700_000_000_123i64);
        assert_eq!(json["note"], "salted");

        assert_eq!(remote.into_item(), item);
    }

    #[test]
    fn test_remote_item_without_note() {
        let json = r#"{"id":"a","name":"Salt","quantity":1,"isBought":true,"createdAt":1,"updatedAt":2}"#;
        let remote: RemoteItem = serde_json::from_str(json).unwrap();
        assert!(remote.note.is_none());
        assert_eq!(remote.into_item().updated_millis(), 2);
    }

    #[test]
    fn test_item_display() {
        let item = Item::new("Apples", 6).with_note("green");
        assert_eq!(format!("{}", item), "[ ] Apples x6 (green)");
    }
}
