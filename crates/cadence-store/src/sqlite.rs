//! SQLite store backend (feature `sqlite`).
//!
//! Keeps every tag in one `cells` table.  Used by host-side simulations
//! that want schedules to survive process restarts the way flash does on
//! the device.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::store::{Store, StoreTag};
use crate::{StoreError, StoreResult};

pub struct SqliteStore {
    conn:  Connection,
    depth: u32,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialise the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        debug!(path = %path.display(), "opening sqlite store");
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS cells (
                 tag   TEXT PRIMARY KEY,
                 value BLOB NOT NULL
             );",
        )?;
        Ok(Self { conn, depth: 0 })
    }
}

impl Store for SqliteStore {
    fn begin(&mut self) -> StoreResult<()> {
        if self.depth == 0 {
            self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        }
        self.depth += 1;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.depth == 0 {
            return Err(StoreError::NoTransaction);
        }
        if self.depth == 1 {
            self.conn.execute_batch("COMMIT;")?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if self.depth == 0 {
            return Err(StoreError::NoTransaction);
        }
        self.conn.execute_batch("ROLLBACK;")?;
        self.depth = 0;
        Ok(())
    }

    fn load(&mut self, tag: &StoreTag) -> StoreResult<Option<Vec<u8>>> {
        let value = self
            .conn
            .query_row("SELECT value FROM cells WHERE tag = ?1", [tag.as_str()], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn save(&mut self, tag: &StoreTag, value: &[u8]) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO cells (tag, value) VALUES (?1, ?2) \
             ON CONFLICT(tag) DO UPDATE SET value = excluded.value",
            rusqlite::params![tag.as_str(), value],
        )?;
        Ok(())
    }
}
