use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Result, StoreContext};
use crate::models::{Color, Song};

fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
    let color: String = row.get(3)?;
    Ok(Song {
        id: row.get(0)?,
        title: row.get(1)?,
        lyrics: row.get(2)?,
        color: color.parse::<Color>().unwrap_or_default(),
        position: row.get(4)?,
    })
}

/// Songs owned by one set, in position order.
pub fn fetch_songs_for_set(conn: &Connection, set_id: &str) -> Result<Vec<Song>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, title, lyrics, color, position
             FROM songs
             WHERE set_id = ?1
             ORDER BY position",
        )
        .store_context("failed to prepare set songs query")?;

    let songs = stmt
        .query_map([set_id], song_from_row)
        .store_context("failed to iterate set songs")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .store_context("failed to collect set songs")?;

    Ok(songs)
}

/// Look up a single song by id.
pub fn fetch_song(conn: &Connection, id: &str) -> Result<Option<Song>> {
    conn.query_row(
        "SELECT id, title, lyrics, color, position FROM songs WHERE id = ?1",
        [id],
        song_from_row,
    )
    .optional()
    .store_context("failed to load song")
}

/// Insert the given songs under `set_id`. The stored position is the slice
/// index; whatever `position` the caller carried is ignored. Expected to run
/// inside the caller's transaction.
pub(crate) fn insert_songs(conn: &Connection, set_id: &str, songs: &[Song]) -> Result<()> {
    if songs.is_empty() {
        return Ok(());
    }

    let mut stmt = conn
        .prepare(
            "INSERT INTO songs (id, set_id, title, lyrics, color, position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .store_context("failed to prepare song insert")?;

    for (position, song) in songs.iter().enumerate() {
        stmt.execute(params![
            song.id,
            set_id,
            song.title,
            song.lyrics,
            song.color.as_str(),
            position as i64
        ])
        .store_context("failed to insert song")?;
    }

    Ok(())
}
