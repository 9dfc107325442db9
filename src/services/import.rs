//! Imports the JSON document kept by the earlier single-file backend:
//! `{"soundbites": [...], "gifs": [...], "images": [...]}`.

use super::detect::default_extension;
use super::media::{insert_media, now_timestamp};
use super::storage::url_filename;
use super::{clean_name, positions};
use crate::models::{Collection, MediaItem, MediaType};
use crate::Database;
use anyhow::Result;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct LegacyLibrary {
    #[serde(default)]
    pub soundbites: Vec<LegacyItem>,
    #[serde(default)]
    pub gifs: Vec<LegacyItem>,
    #[serde(default)]
    pub images: Vec<LegacyItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyItem {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub size: i64,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

pub fn parse_legacy(json: &str) -> Result<LegacyLibrary> {
    Ok(serde_json::from_str(json)?)
}

/// Appends every legacy item to its collection, keeping the array order.
/// Items whose id already exists are skipped, so re-running is harmless.
pub fn import_legacy(db: &Database, library: LegacyLibrary) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    let mut conn = db.get()?;
    let tx = positions::write_transaction(&mut conn)?;

    let groups = [
        (MediaType::Soundbites, library.soundbites),
        (MediaType::Gifs, library.gifs),
        (MediaType::Images, library.images),
    ];

    for (media_type, items) in groups {
        let mut next = positions::next_display_order(&tx, Collection::Media(media_type))?;

        for legacy in items {
            let id = legacy.id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM media_items WHERE id = ?",
                [&id],
                |row| row.get(0),
            )?;
            if exists > 0 {
                tracing::debug!("Skipping existing item {}", id);
                report.skipped += 1;
                continue;
            }

            let item = MediaItem {
                mime_type: guess_mime(&legacy.url, media_type),
                id,
                name: legacy_name(&legacy.name, &legacy.url, media_type),
                media_type,
                url: legacy.url,
                size: legacy.size,
                display_order: next,
                uploaded_at: legacy.uploaded_at.unwrap_or_else(now_timestamp),
                source_url: None,
                storage_path: None,
            };
            insert_media(&tx, &item)?;
            next += 1;
            report.imported += 1;
        }
    }

    tx.commit()?;
    Ok(report)
}

/// The stored name, or the URL's file name when the legacy name is blank.
fn legacy_name(name: &str, url: &str, media_type: MediaType) -> String {
    if let Ok(name) = clean_name(name) {
        return name;
    }
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| url_filename(&parsed))
        .unwrap_or_else(|| format!("untitled{}", default_extension(media_type)))
}

fn guess_mime(url: &str, media_type: MediaType) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| {
            match media_type {
                MediaType::Gifs => "image/gif",
                MediaType::Images => "image/jpeg",
                MediaType::Soundbites => "audio/mpeg",
            }
            .to_string()
        })
}
