use super::{media, text};
use crate::models::{MediaLibrary, TextItem};
use crate::Database;
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub media: MediaLibrary,
    pub text: Vec<TextItem>,
}

/// Case-insensitive substring match on names, and on text content.
/// A blank query matches everything.
pub fn search(db: &Database, query: &str) -> Result<SearchResults> {
    let needle = query.trim().to_lowercase();

    let mut library = media::list_library(db)?;
    let mut text_items = text::list_text(db)?;

    if !needle.is_empty() {
        for list in [&mut library.gifs, &mut library.images, &mut library.soundbites] {
            list.retain(|item| item.name.to_lowercase().contains(&needle));
        }
        text_items.retain(|item| {
            item.name.to_lowercase().contains(&needle) || item.content.to_lowercase().contains(&needle)
        });
    }

    Ok(SearchResults {
        media: library,
        text: text_items,
    })
}
