use super::{Collection, MediaItem, MediaType, TextItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Reorder,
}

/// A row-level change pushed to every connected viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub media_type: Option<MediaType>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub record: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub old_display_order: Option<i64>,
    /// Full id order of the collection after a reorder.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub order: Option<Vec<String>>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    fn new(collection: Collection, kind: ChangeKind) -> Self {
        let media_type = match collection {
            Collection::Media(media_type) => Some(media_type),
            Collection::Text => None,
        };
        Self {
            table: collection.table().to_string(),
            kind,
            media_type,
            id: None,
            record: None,
            old_display_order: None,
            order: None,
            at: Utc::now(),
        }
    }

    pub fn media_inserted(item: &MediaItem) -> Self {
        let mut event = Self::new(Collection::Media(item.media_type), ChangeKind::Insert);
        event.id = Some(item.id.clone());
        event.record = serde_json::to_value(item).ok();
        event
    }

    pub fn media_updated(item: &MediaItem, old_display_order: i64) -> Self {
        let mut event = Self::new(Collection::Media(item.media_type), ChangeKind::Update);
        event.id = Some(item.id.clone());
        event.record = serde_json::to_value(item).ok();
        event.old_display_order = Some(old_display_order);
        event
    }

    pub fn text_inserted(item: &TextItem) -> Self {
        let mut event = Self::new(Collection::Text, ChangeKind::Insert);
        event.id = Some(item.id.clone());
        event.record = serde_json::to_value(item).ok();
        event
    }

    pub fn text_updated(item: &TextItem, old_display_order: i64) -> Self {
        let mut event = Self::new(Collection::Text, ChangeKind::Update);
        event.id = Some(item.id.clone());
        event.record = serde_json::to_value(item).ok();
        event.old_display_order = Some(old_display_order);
        event
    }

    pub fn deleted(collection: Collection, id: &str) -> Self {
        let mut event = Self::new(collection, ChangeKind::Delete);
        event.id = Some(id.to_string());
        event
    }

    pub fn reordered(collection: Collection, order: Vec<String>) -> Self {
        let mut event = Self::new(collection, ChangeKind::Reorder);
        event.order = Some(order);
        event
    }

    pub fn collection(&self) -> Option<Collection> {
        match self.table.as_str() {
            "media_items" => self.media_type.map(Collection::Media),
            "text_items" => Some(Collection::Text),
            _ => None,
        }
    }
}

/// Frames sent to realtime subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ServerMessage {
    /// The full state, sent once when a subscriber connects.
    Snapshot {
        media: super::MediaLibrary,
        text: Vec<TextItem>,
    },
    Change { change: ChangeEvent },
    /// The subscriber fell behind and missed events; it must refetch.
    Resync { missed: u64 },
}
