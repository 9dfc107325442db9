use super::{MediaItem, MediaType, TextItem};
use serde::{Deserialize, Serialize};

/// Addresses one ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "collection", content = "type", rename_all = "lowercase")]
pub enum Collection {
    Media(MediaType),
    Text,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Media(_) => "media_items",
            Self::Text => "text_items",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Media(media_type) => write!(f, "{}", media_type),
            Self::Text => f.write_str("text"),
        }
    }
}

/// Rows that live in an ordered collection.
pub trait Ordered: Clone {
    fn id(&self) -> &str;
    fn display_order(&self) -> i64;
    fn set_display_order(&mut self, order: i64);
    fn created_at(&self) -> &str;
}

impl Ordered for MediaItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_order(&self) -> i64 {
        self.display_order
    }

    fn set_display_order(&mut self, order: i64) {
        self.display_order = order;
    }

    fn created_at(&self) -> &str {
        &self.uploaded_at
    }
}

impl Ordered for TextItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_order(&self) -> i64 {
        self.display_order
    }

    fn set_display_order(&mut self, order: i64) {
        self.display_order = order;
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }
}

/// Sorts by `display_order`, breaking ties by creation time and then id.
pub fn sort_by_display_order<T: Ordered>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.display_order()
            .cmp(&b.display_order())
            .then_with(|| a.created_at().cmp(b.created_at()))
            .then_with(|| a.id().cmp(b.id()))
    });
}
