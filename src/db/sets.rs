use std::collections::HashSet;

use rusqlite::{params, Connection, Row};

use crate::error::{Error, Result, StoreContext};
use crate::models::{Set, SetOrder, Song};

use super::connection::NOW_SQL;
use super::songs::{fetch_songs_for_set, insert_songs};

const SET_COLUMNS: &str = "id, title, position, created_at, updated_at";

fn set_from_row(row: &Row<'_>) -> rusqlite::Result<Set> {
    Ok(Set {
        id: row.get(0)?,
        title: row.get(1)?,
        position: row.get(2)?,
        songs: Vec::new(),
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Retrieve every set with its songs attached in position order. `rowid`
/// breaks creation-time ties so sets created within the same millisecond
/// still list newest first.
pub fn fetch_sets(conn: &Connection, order: SetOrder) -> Result<Vec<Set>> {
    let order_by = match order {
        SetOrder::Created => "created_at DESC, rowid DESC",
        SetOrder::Position => "position ASC, created_at DESC, rowid DESC",
    };
    let mut stmt = conn
        .prepare(&format!("SELECT {SET_COLUMNS} FROM sets ORDER BY {order_by}"))
        .store_context("failed to prepare set query")?;

    let mut sets = stmt
        .query_map([], set_from_row)
        .store_context("failed to load sets")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .store_context("failed to collect sets")?;

    for set in &mut sets {
        set.songs = fetch_songs_for_set(conn, &set.id)?;
    }

    Ok(sets)
}

/// Fetch one set with its songs, or `NotFound`.
pub fn fetch_set(conn: &Connection, id: &str) -> Result<Set> {
    let mut stmt = conn
        .prepare(&format!("SELECT {SET_COLUMNS} FROM sets WHERE id = ?1"))
        .store_context("failed to prepare set query")?;

    let mut rows = stmt
        .query_map([id], set_from_row)
        .store_context("failed to load set")?;

    let mut set = match rows.next() {
        Some(row) => row.store_context("failed to read set")?,
        None => return Err(Error::NotFound(id.to_string())),
    };
    set.songs = fetch_songs_for_set(conn, id)?;
    Ok(set)
}

/// Insert a set row and all of its songs in one transaction. Song positions
/// come from the slice order. Dropping the transaction on an early return
/// rolls everything back.
pub fn insert_set(conn: &mut Connection, id: &str, title: &str, songs: &[Song]) -> Result<()> {
    let tx = conn
        .transaction()
        .store_context("failed to start transaction")?;

    tx.execute(
        "INSERT INTO sets (id, title) VALUES (?1, ?2)",
        params![id, title],
    )
    .store_context("failed to insert set")?;

    insert_songs(&tx, id, songs)?;

    tx.commit().store_context("failed to commit new set")
}

/// Whole-set replacement: new title, every existing song row dropped, the
/// provided list inserted in order. Song rows not present in `songs` are gone
/// afterwards.
pub fn replace_set(conn: &mut Connection, id: &str, title: &str, songs: &[Song]) -> Result<()> {
    let tx = conn
        .transaction()
        .store_context("failed to start transaction")?;

    let updated = tx
        .execute(
            &format!("UPDATE sets SET title = ?1, updated_at = {NOW_SQL} WHERE id = ?2"),
            params![title, id],
        )
        .store_context("failed to update set")?;
    if updated == 0 {
        return Err(Error::NotFound(id.to_string()));
    }

    tx.execute("DELETE FROM songs WHERE set_id = ?1", params![id])
        .store_context("failed to clear songs")?;

    insert_songs(&tx, id, songs)?;

    tx.commit().store_context("failed to commit set update")
}

/// Remove a set row. The schema cascades to `songs`, so owned songs go with
/// it.
pub fn delete_set(conn: &Connection, id: &str) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM sets WHERE id = ?1", params![id])
        .store_context("failed to delete set")?;

    if deleted == 0 {
        Err(Error::NotFound(id.to_string()))
    } else {
        Ok(())
    }
}

/// Rewrite `sets.position` so the given ids read 0..n-1. `ids` must name
/// every stored set exactly once; a duplicate, a missing set or an unknown id
/// aborts the whole write.
pub fn write_set_positions(conn: &mut Connection, ids: &[String]) -> Result<()> {
    let distinct: HashSet<&str> = ids.iter().map(String::as_str).collect();
    if distinct.len() != ids.len() {
        return Err(Error::validation("Set order lists a set more than once."));
    }

    let tx = conn
        .transaction()
        .store_context("failed to start transaction")?;

    let stored: i64 = tx
        .query_row("SELECT COUNT(*) FROM sets", [], |row| row.get(0))
        .store_context("failed to count sets")?;
    if stored != ids.len() as i64 {
        return Err(Error::validation(format!(
            "Set order lists {} sets but the store holds {stored}.",
            ids.len()
        )));
    }

    {
        let mut stmt = tx
            .prepare("UPDATE sets SET position = ?1 WHERE id = ?2")
            .store_context("failed to prepare position update")?;
        for (position, id) in ids.iter().enumerate() {
            let updated = stmt
                .execute(params![position as i64, id])
                .store_context("failed to update set position")?;
            if updated == 0 {
                return Err(Error::NotFound(id.clone()));
            }
        }
    }

    tx.commit().store_context("failed to commit set order")
}
