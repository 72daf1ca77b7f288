pub mod schema;

use crate::error::AppError;
use crate::services::clock::LogicalClock;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::watch;

/// Local durable store: the SQLite connection, the client's logical clock and
/// a change counter that ticks after every committed write.
///
/// Constructed explicitly and shared as `Arc<LocalStore>`; tests open
/// isolated in-memory instances.
pub struct LocalStore {
    conn: Mutex<Connection>,
    clock: LogicalClock,
    changes: watch::Sender<u64>,
}

impl LocalStore {
    /// Opens (and migrates) the database file, creating parent directories
    pub fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        log::info!("Opened local store at {}", path.to_string_lossy());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AppError> {
        schema::init_schema(&conn)?;

        // Continue the clock after the newest persisted timestamp
        let clock = LogicalClock::new();
        let newest: Option<i64> = conn.query_row(
            "SELECT MAX(ts) FROM (
                SELECT MAX(updated_at) AS ts FROM progress
                UNION ALL SELECT MAX(last_opened_at) FROM sets
                UNION ALL SELECT MAX(added_at) FROM sets
                UNION ALL SELECT MAX(created_at) FROM sync_queue
            )",
            [],
            |row| row.get(0),
        )?;
        if let Some(ts) = newest {
            clock.observe(ts);
        }

        let (changes, _rx) = watch::channel(0);

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
            changes,
        })
    }

    /// Runs a read-only query against the connection
    pub fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Other("Local store lock poisoned".to_string()))?;
        f(&conn)
    }

    /// Runs a write and notifies subscribers once it succeeded
    pub fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let result = {
            let conn = self
                .conn
                .lock()
                .map_err(|_| AppError::Other("Local store lock poisoned".to_string()))?;
            f(&conn)?
        };
        self.changes.send_modify(|revision| *revision += 1);
        Ok(result)
    }

    /// Next logical timestamp for this client
    pub fn now(&self) -> i64 {
        self.clock.tick()
    }

    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    /// Receiver that changes after every committed write
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Stable client id (created and stored if missing)
    pub fn client_id(&self) -> Result<String, AppError> {
        let existing = self.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM app_meta WHERE key = 'client_id'",
                    [],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let new_id = uuid::Uuid::new_v4().to_string();
        self.write(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO app_meta (key, value) VALUES ('client_id', ?1)",
                params![&new_id],
            )?;
            Ok(conn.query_row(
                "SELECT value FROM app_meta WHERE key = 'client_id'",
                [],
                |row| row.get::<_, String>(0),
            )?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_is_stable() {
        let store = LocalStore::open_in_memory().unwrap();
        let first = store.client_id().unwrap();
        let second = store.client_id().unwrap();
        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_write_bumps_revision_read_does_not() {
        let store = LocalStore::open_in_memory().unwrap();
        let rx = store.subscribe();
        let before = store.revision();

        store
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM sets", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.revision(), before);

        store
            .write(|conn| {
                conn.execute(
                    "INSERT INTO app_meta (key, value) VALUES ('theme', 'dark')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.revision(), before + 1);
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_failed_write_does_not_notify() {
        let store = LocalStore::open_in_memory().unwrap();
        let before = store.revision();
        let result: Result<(), AppError> = store.write(|conn| {
            conn.execute("INSERT INTO no_such_table VALUES (1)", [])?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn test_clock_resumes_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bricks.db");
        let future = crate::services::clock::now_millis() + 3_600_000;
        {
            let store = LocalStore::open(&path).unwrap();
            store
                .write(|conn| {
                    conn.execute(
                        "INSERT INTO sets (set_num, name, year, num_parts, added_at, last_opened_at)
                         VALUES ('6000-1', 'Castle', 1990, 100, ?1, ?1)",
                        [future],
                    )?;
                    Ok(())
                })
                .unwrap();
        }

        let reopened = LocalStore::open(&path).unwrap();
        assert!(reopened.now() > future);
    }
}
