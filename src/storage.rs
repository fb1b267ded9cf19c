//! SQLite-backed alert state
//!
//! The only thing persisted across cycles is the last-notified reading id
//! and the vibration level that went with it, used to suppress repeat
//! vibration for a reading that was already acted upon. The engine treats
//! this store as opaque load/save.

use rusqlite::{params, Connection, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reading id used before any real reading has been notified, and in all
/// error payloads.
pub const DEFAULT_ID: i64 = 99;

/// State carried between refresh cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    /// Timestamp id of the last reading a payload was emitted for.
    pub last_id: i64,
    /// Vibration level emitted with that payload.
    pub last_vibe: u32,
}

impl Default for AlertState {
    fn default() -> Self {
        Self {
            last_id: DEFAULT_ID,
            last_vibe: 0,
        }
    }
}

/// Single-row SQLite store for [`AlertState`].
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Create or open the state database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// In-memory store, used by tests
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS alert_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                last_id INTEGER NOT NULL,
                last_vibe INTEGER NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );",
        )?;
        Ok(Self { conn })
    }

    /// Load the stored state, or the default when no cycle has run yet
    pub fn load(&self) -> Result<AlertState> {
        let mut stmt = self
            .conn
            .prepare("SELECT last_id, last_vibe FROM alert_state WHERE id = 1")?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(AlertState {
                last_id: row.get(0)?,
                last_vibe: row.get(1)?,
            }),
            None => Ok(AlertState::default()),
        }
    }

    /// Replace the stored state
    pub fn save(&self, state: &AlertState) -> Result<()> {
        self.conn.execute(
            "INSERT INTO alert_state (id, last_id, last_vibe, updated_at)
             VALUES (1, ?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET
                last_id = excluded.last_id,
                last_vibe = excluded.last_vibe,
                updated_at = excluded.updated_at",
            params![state.last_id, state.last_vibe],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_before_first_save_is_default() {
        let store = StateStore::in_memory().unwrap();
        assert_eq!(store.load().unwrap(), AlertState::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let store = StateStore::in_memory().unwrap();
        let state = AlertState {
            last_id: 1_700_000_123_456,
            last_vibe: 3,
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_save_overwrites_single_row() {
        let store = StateStore::in_memory().unwrap();
        store
            .save(&AlertState {
                last_id: 1,
                last_vibe: 1,
            })
            .unwrap();
        store
            .save(&AlertState {
                last_id: 2,
                last_vibe: 0,
            })
            .unwrap();
        let state = store.load().unwrap();
        assert_eq!(state.last_id, 2);
        assert_eq!(state.last_vibe, 0);
    }
}
