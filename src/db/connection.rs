use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StoreContext};
use crate::models::{Set, SetOrder, Song};

use super::{sets, songs};

/// Default timestamp expression. Millisecond resolution keeps creation order
/// meaningful for sets created in quick succession.
pub(crate) const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Outcome of [`Store::migrate_legacy_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyMigration {
    /// `sets.position` already existed; nothing was touched.
    AlreadyCurrent,
    /// The column was added and this many sets received a position.
    Backfilled { sets: usize },
}

/// Owned handle to the SQLite store. Opened once at startup, handed to the
/// repository layer, and closed explicitly at shutdown.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open the database file, ensure the schema exists, and upgrade a legacy
    /// `sets` table if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let mut store = Self::connect(path)?;
        store.create_schema()?;
        store.migrate_legacy_schema()?;
        Ok(store)
    }

    /// Fully initialized store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().store_context("failed to open SQLite database")?;
        let mut store = Self::from_connection(conn)?;
        store.create_schema()?;
        store.migrate_legacy_schema()?;
        Ok(store)
    }

    /// Open the database file without touching the schema. Used by the
    /// explicit `migrate-schema` command so it can report what it did.
    pub fn connect(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).store_context("failed to open SQLite database")?;
        debug!(path = %path.display(), "opened set store");
        Self::from_connection(conn)
    }

    /// Wrap an existing connection. Foreign keys are switched on here so the
    /// song cascade behaves the same in tests and in production.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])
            .store_context("failed to enable foreign keys")?;
        Ok(Self { conn })
    }

    /// Close the underlying connection, surfacing any error SQLite reports
    /// while finalizing.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, err)| err)
            .store_context("failed to close SQLite database")?;
        debug!("closed set store");
        Ok(())
    }

    /// Create both tables and their indexes if they are missing. Safe to run
    /// on every start.
    pub fn create_schema(&self) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS sets (
                        id TEXT PRIMARY KEY,
                        title TEXT NOT NULL,
                        position INTEGER NOT NULL DEFAULT 0,
                        created_at TEXT NOT NULL DEFAULT ({NOW_SQL}),
                        updated_at TEXT NOT NULL DEFAULT ({NOW_SQL})
                    )"
                ),
                [],
            )
            .store_context("failed to create sets table")?;

        self.conn
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS songs (
                        id TEXT PRIMARY KEY,
                        set_id TEXT NOT NULL,
                        title TEXT NOT NULL,
                        lyrics TEXT NOT NULL DEFAULT '',
                        color TEXT NOT NULL DEFAULT 'white',
                        position INTEGER NOT NULL DEFAULT 0,
                        created_at TEXT NOT NULL DEFAULT ({NOW_SQL}),
                        FOREIGN KEY(set_id) REFERENCES sets(id) ON DELETE CASCADE
                    )"
                ),
                [],
            )
            .store_context("failed to create songs table")?;

        self.conn
            .execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_songs_set_id ON songs(set_id);
                 CREATE INDEX IF NOT EXISTS idx_songs_position ON songs(position);",
            )
            .store_context("failed to create song indexes")?;

        // A legacy sets table has no position column yet; its index is created
        // by the migration instead.
        if self.has_set_position_column()? {
            self.conn
                .execute(
                    "CREATE INDEX IF NOT EXISTS idx_sets_position ON sets(position)",
                    [],
                )
                .store_context("failed to create set position index")?;
        }

        Ok(())
    }

    /// Add `sets.position` to databases created before sets were ordered and
    /// backfill it newest-first (most recent set gets 0). Sets sharing a
    /// creation timestamp keep their insertion order. Runs in one
    /// transaction; a second run sees the column and does nothing.
    pub fn migrate_legacy_schema(&mut self) -> Result<LegacyMigration> {
        if self.has_set_position_column()? {
            return Ok(LegacyMigration::AlreadyCurrent);
        }

        info!("adding position column to sets table");
        let tx = self
            .conn
            .transaction()
            .store_context("failed to start migration")?;

        tx.execute(
            "ALTER TABLE sets ADD COLUMN position INTEGER NOT NULL DEFAULT 0",
            [],
        )
        .store_context("failed to add position column")?;
        tx.execute(
            "CREATE INDEX IF NOT EXISTS idx_sets_position ON sets(position)",
            [],
        )
        .store_context("failed to create set position index")?;

        let ids = {
            let mut stmt = tx
                .prepare("SELECT id FROM sets ORDER BY created_at DESC, rowid DESC")
                .store_context("failed to prepare legacy set query")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .store_context("failed to load legacy sets")?
                .collect::<std::result::Result<Vec<_>, _>>()
                .store_context("failed to collect legacy sets")?;
            ids
        };

        {
            let mut update = tx
                .prepare("UPDATE sets SET position = ?1 WHERE id = ?2")
                .store_context("failed to prepare position backfill")?;
            for (position, id) in ids.iter().enumerate() {
                update
                    .execute(rusqlite::params![position as i64, id])
                    .store_context("failed to backfill set position")?;
            }
        }

        tx.commit().store_context("failed to commit migration")?;
        info!(sets = ids.len(), "initialized set positions");
        Ok(LegacyMigration::Backfilled { sets: ids.len() })
    }

    /// Schema introspection used by both the schema setup and the migration.
    pub fn has_set_position_column(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('sets') WHERE name = 'position'",
                [],
                |row| row.get(0),
            )
            .store_context("failed to inspect sets table")?;
        Ok(count > 0)
    }

    /// Cheap round trip used by the health probe.
    pub fn ping(&self) -> Result<()> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .store_context("store did not answer")?;
        Ok(())
    }

    pub fn list_sets(&self, order: SetOrder) -> Result<Vec<Set>> {
        sets::fetch_sets(&self.conn, order)
    }

    pub fn get_set(&self, id: &str) -> Result<Set> {
        sets::fetch_set(&self.conn, id)
    }

    pub fn create_set(&mut self, id: &str, title: &str, songs: &[Song]) -> Result<()> {
        sets::insert_set(&mut self.conn, id, title, songs)
    }

    pub fn replace_set(&mut self, id: &str, title: &str, songs: &[Song]) -> Result<()> {
        sets::replace_set(&mut self.conn, id, title, songs)
    }

    pub fn delete_set(&self, id: &str) -> Result<()> {
        sets::delete_set(&self.conn, id)
    }

    pub fn write_set_positions(&mut self, ids: &[String]) -> Result<()> {
        sets::write_set_positions(&mut self.conn, ids)
    }

    /// Look a song up by id regardless of owner.
    pub fn find_song(&self, id: &str) -> Result<Option<Song>> {
        songs::fetch_song(&self.conn, id)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
