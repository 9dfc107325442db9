use super::detect::{detect_media_type, sniff_mime};
use super::error::clean_name;
use super::storage::FileStore;
use super::{positions, ServiceError};
use crate::models::{Collection, MediaItem, MediaLibrary, MediaType, NewUpload};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

const MEDIA_COLUMNS: &str =
    "id, name, media_type, url, mime_type, size, display_order, uploaded_at, source_url, storage_path";

pub fn upload_media(
    db: &Database,
    store: &FileStore,
    max_bytes: usize,
    upload: NewUpload,
) -> Result<MediaItem> {
    if upload.data.is_empty() {
        return Err(ServiceError::invalid("No file uploaded").into());
    }
    if upload.data.len() > max_bytes {
        return Err(ServiceError::TooLarge { max: max_bytes }.into());
    }

    let mime_type = sniff_mime(&upload.data, Some(&upload.mime_type), &upload.original_name);
    let media_type = detect_media_type(&mime_type).ok_or(ServiceError::UnsupportedType)?;

    let storage_path = store.save(media_type, &upload.original_name, &upload.data)?;

    let mut item = MediaItem {
        id: Uuid::new_v4().to_string(),
        name: upload.display_name(),
        media_type,
        url: store.public_url(&storage_path),
        mime_type,
        size: upload.data.len() as i64,
        display_order: 0,
        uploaded_at: now_timestamp(),
        source_url: upload.source_url,
        storage_path: Some(storage_path.clone()),
    };

    if let Err(e) = append_media(db, &mut item) {
        // No row points at the file, so nothing would ever clean it up.
        if let Err(cleanup) = store.remove(&storage_path) {
            tracing::warn!("Failed to remove orphaned upload {}: {}", storage_path, cleanup);
        }
        return Err(e);
    }

    tracing::info!(id = %item.id, media_type = %item.media_type, size = item.size, "Stored upload");
    Ok(item)
}

/// Inserts at the end of its collection, assigning `display_order`.
fn append_media(db: &Database, item: &mut MediaItem) -> Result<()> {
    let mut conn = db.get()?;
    let tx = positions::write_transaction(&mut conn)?;
    item.display_order = positions::next_display_order(&tx, Collection::Media(item.media_type))?;
    insert_media(&tx, item)?;
    tx.commit()?;
    Ok(())
}

/// Inserts a fully-formed record, keeping its id and `display_order`.
pub fn insert_media(conn: &Connection, item: &MediaItem) -> Result<()> {
    conn.execute(
        "INSERT INTO media_items (id, name, media_type, url, mime_type, size, display_order, uploaded_at, source_url, storage_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            item.id,
            item.name,
            item.media_type.as_str(),
            item.url,
            item.mime_type,
            item.size,
            item.display_order,
            item.uploaded_at,
            item.source_url,
            item.storage_path,
        ],
    )?;
    Ok(())
}

pub fn media_exists(db: &Database, id: &str) -> Result<bool> {
    let conn = db.get()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM media_items WHERE id = ?", [id], |row| {
        row.get(0)
    })?;
    Ok(count > 0)
}

pub fn list_media(db: &Database, media_type: MediaType) -> Result<Vec<MediaItem>> {
    let conn = db.get()?;
    let sql = format!(
        "SELECT {} FROM media_items WHERE media_type = ?1 {}",
        MEDIA_COLUMNS,
        positions::order_clause(Collection::Media(media_type))
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map([media_type.as_str()], row_to_media)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn list_library(db: &Database) -> Result<MediaLibrary> {
    Ok(MediaLibrary {
        gifs: list_media(db, MediaType::Gifs)?,
        images: list_media(db, MediaType::Images)?,
        soundbites: list_media(db, MediaType::Soundbites)?,
    })
}

pub fn get_media(db: &Database, media_type: MediaType, id: &str) -> Result<Option<MediaItem>> {
    let conn = db.get()?;
    let sql = format!(
        "SELECT {} FROM media_items WHERE id = ?1 AND media_type = ?2",
        MEDIA_COLUMNS
    );
    let item = conn
        .query_row(&sql, (id, media_type.as_str()), row_to_media)
        .optional()?;
    Ok(item)
}

fn require_media(db: &Database, media_type: MediaType, id: &str) -> Result<MediaItem> {
    get_media(db, media_type, id)?.ok_or_else(|| ServiceError::not_found("Media").into())
}

pub fn rename_media(db: &Database, media_type: MediaType, id: &str, name: &str) -> Result<MediaItem> {
    let name = clean_name(name)?;
    let conn = db.get()?;
    let changed = conn.execute(
        "UPDATE media_items SET name = ?1 WHERE id = ?2 AND media_type = ?3",
        (&name, id, media_type.as_str()),
    )?;
    drop(conn);

    if changed == 0 {
        return Err(ServiceError::not_found("Media").into());
    }
    require_media(db, media_type, id)
}

/// Moves the item at `source` in front of the item at `target` and returns
/// the new id order of the collection.
pub fn reorder_media(db: &Database, media_type: MediaType, source: usize, target: usize) -> Result<Vec<String>> {
    let order = positions::reorder(db, Collection::Media(media_type), source, target)?;
    tracing::debug!(media_type = %media_type, source, target, "Reordered media");
    Ok(order)
}

/// Deletes the row, then its backing file. The file is only touched once the
/// row is gone; a file that cannot be removed is logged and left behind.
pub fn delete_media(db: &Database, store: &FileStore, media_type: MediaType, id: &str) -> Result<MediaItem> {
    let item = require_media(db, media_type, id)?;

    let mut conn = db.get()?;
    let tx = positions::write_transaction(&mut conn)?;
    tx.execute("DELETE FROM media_items WHERE id = ?", [id])?;
    positions::renumber(&tx, Collection::Media(media_type))?;
    tx.commit()?;
    drop(conn);

    if let Some(path) = item.storage_path.as_deref() {
        if let Err(e) = store.remove(path) {
            tracing::warn!("Storage delete error for {}: {}", path, e);
        }
    }

    tracing::info!(id = %id, media_type = %media_type, "Deleted media");
    Ok(item)
}

fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
    let media_type: String = row.get(2)?;
    let media_type = media_type.parse::<MediaType>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown media type '{}'", media_type).into(),
        )
    })?;

    Ok(MediaItem {
        id: row.get(0)?,
        name: row.get(1)?,
        media_type,
        url: row.get(3)?,
        mime_type: row.get(4)?,
        size: row.get(5)?,
        display_order: row.get(6)?,
        uploaded_at: row.get(7)?,
        source_url: row.get(8)?,
        storage_path: row.get(9)?,
    })
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
