use super::ordering::{move_item, validate_move};
use crate::models::Collection;
use crate::Database;
use anyhow::Result;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};

/// Table, tie-break column and row filter for one ordered collection.
struct Scope {
    table: &'static str,
    created_column: &'static str,
    filter: &'static str,
    params: Vec<String>,
}

fn scope(collection: Collection) -> Scope {
    match collection {
        Collection::Media(media_type) => Scope {
            table: "media_items",
            created_column: "uploaded_at",
            filter: "WHERE media_type = ?1",
            params: vec![media_type.as_str().to_string()],
        },
        Collection::Text => Scope {
            table: "text_items",
            created_column: "created_at",
            filter: "",
            params: Vec::new(),
        },
    }
}

/// SQL ordering clause shared by every listing of a collection.
pub fn order_clause(collection: Collection) -> String {
    let scope = scope(collection);
    format!("ORDER BY display_order ASC, {} ASC, id ASC", scope.created_column)
}

/// Ids of the collection in display order.
pub fn ordered_ids(conn: &Connection, collection: Collection) -> Result<Vec<String>> {
    let scope = scope(collection);
    let sql = format!(
        "SELECT id FROM {} {} {}",
        scope.table,
        scope.filter,
        order_clause(collection)
    );
    let mut stmt = conn.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(scope.params.iter()), |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// The `display_order` that appends a new row to the end of the collection.
pub fn next_display_order(conn: &Connection, collection: Collection) -> Result<i64> {
    let scope = scope(collection);
    let sql = format!(
        "SELECT COALESCE(MAX(display_order), -1) + 1 FROM {} {}",
        scope.table, scope.filter
    );
    let next = conn.query_row(&sql, params_from_iter(scope.params.iter()), |row| row.get(0))?;
    Ok(next)
}

fn write_positions(conn: &Connection, collection: Collection, ids: &[String]) -> Result<()> {
    let sql = format!("UPDATE {} SET display_order = ?1 WHERE id = ?2", scope(collection).table);
    let mut stmt = conn.prepare(&sql)?;
    for (pos, id) in ids.iter().enumerate() {
        stmt.execute((pos as i64, id))?;
    }
    Ok(())
}

/// Opens a transaction that holds the database write lock from its first
/// statement. Use it for every write that reads the current order first.
pub fn write_transaction(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Moves one row and renumbers the whole collection densely from zero,
/// atomically. Returns the resulting id order.
pub fn reorder(db: &Database, collection: Collection, source: usize, target: usize) -> Result<Vec<String>> {
    let mut conn = db.get()?;
    let tx = write_transaction(&mut conn)?;

    let mut ids = ordered_ids(&tx, collection)?;
    validate_move(ids.len(), source, target)?;
    move_item(&mut ids, source, target);
    write_positions(&tx, collection, &ids)?;

    tx.commit()?;
    Ok(ids)
}

/// Closes gaps left by deletions.
pub fn renumber(conn: &Connection, collection: Collection) -> Result<()> {
    let ids = ordered_ids(conn, collection)?;
    write_positions(conn, collection, &ids)
}
