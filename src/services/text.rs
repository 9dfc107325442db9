use super::error::clean_name;
use super::media::now_timestamp;
use super::{positions, ServiceError};
use crate::models::{Collection, TextItem, TextPatch};
use crate::Database;
use anyhow::Result;
use rusqlite::OptionalExtension;
use uuid::Uuid;

const TEXT_COLUMNS: &str = "id, name, content, display_order, created_at, updated_at";

pub fn create_text(db: &Database, name: &str, content: &str) -> Result<TextItem> {
    let name = clean_name(name)?;
    let now = now_timestamp();

    let mut conn = db.get()?;
    let tx = positions::write_transaction(&mut conn)?;
    let item = TextItem {
        id: Uuid::new_v4().to_string(),
        name,
        content: content.to_string(),
        display_order: positions::next_display_order(&tx, Collection::Text)?,
        created_at: now.clone(),
        updated_at: now,
    };
    tx.execute(
        "INSERT INTO text_items (id, name, content, display_order, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            item.id,
            item.name,
            item.content,
            item.display_order,
            item.created_at,
            item.updated_at,
        ],
    )?;
    tx.commit()?;

    Ok(item)
}

pub fn list_text(db: &Database) -> Result<Vec<TextItem>> {
    let conn = db.get()?;
    let sql = format!(
        "SELECT {} FROM text_items {}",
        TEXT_COLUMNS,
        positions::order_clause(Collection::Text)
    );
    let mut stmt = conn.prepare(&sql)?;
    let items = stmt
        .query_map([], row_to_text)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

pub fn get_text(db: &Database, id: &str) -> Result<Option<TextItem>> {
    let conn = db.get()?;
    let sql = format!("SELECT {} FROM text_items WHERE id = ?", TEXT_COLUMNS);
    let item = conn.query_row(&sql, [id], row_to_text).optional()?;
    Ok(item)
}

fn require_text(db: &Database, id: &str) -> Result<TextItem> {
    get_text(db, id)?.ok_or_else(|| ServiceError::not_found("Text item").into())
}

pub fn rename_text(db: &Database, id: &str, name: &str) -> Result<TextItem> {
    update_text(
        db,
        id,
        TextPatch {
            name: Some(name.to_string()),
            content: None,
        },
    )
}

/// Applies the fields present in `patch` and bumps `updated_at`.
pub fn update_text(db: &Database, id: &str, patch: TextPatch) -> Result<TextItem> {
    let name = patch.name.as_deref().map(clean_name).transpose()?;
    if name.is_none() && patch.content.is_none() {
        return Err(ServiceError::invalid("Nothing to update").into());
    }

    let conn = db.get()?;
    let changed = conn.execute(
        "UPDATE text_items SET name = COALESCE(?1, name), content = COALESCE(?2, content), updated_at = ?3 WHERE id = ?4",
        rusqlite::params![name, patch.content, now_timestamp(), id],
    )?;
    drop(conn);

    if changed == 0 {
        return Err(ServiceError::not_found("Text item").into());
    }
    require_text(db, id)
}

pub fn reorder_text(db: &Database, source: usize, target: usize) -> Result<Vec<String>> {
    positions::reorder(db, Collection::Text, source, target)
}

pub fn delete_text(db: &Database, id: &str) -> Result<TextItem> {
    let item = require_text(db, id)?;

    let mut conn = db.get()?;
    let tx = positions::write_transaction(&mut conn)?;
    tx.execute("DELETE FROM text_items WHERE id = ?", [id])?;
    positions::renumber(&tx, Collection::Text)?;
    tx.commit()?;

    Ok(item)
}

fn row_to_text(row: &rusqlite::Row) -> rusqlite::Result<TextItem> {
    Ok(TextItem {
        id: row.get(0)?,
        name: row.get(1)?,
        content: row.get(2)?,
        display_order: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
