use crate::error::AppError;
use crate::models::{SyncMutation, SyncOperation, SyncQueueItem};
use rusqlite::{params, Connection};
use std::collections::HashMap;

const QUEUE_COLUMNS: &str = "id, operation, payload, created_at, retry_count, last_retry_at";

/// Appends a mutation with `retry_count = 0`; returns its id
pub fn insert(conn: &Connection, mutation: &SyncMutation, created_at: i64) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO sync_queue (operation, payload, created_at, retry_count)
         VALUES (?1, ?2, ?3, 0)",
        params![mutation.operation(), mutation.payload_json()?, created_at],
    )?;

    Ok(conn.last_insert_rowid())
}

/// All queued items, oldest first (id breaks ties)
pub fn list_pending(conn: &Connection) -> Result<Vec<SyncQueueItem>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM sync_queue ORDER BY created_at ASC, id ASC",
        QUEUE_COLUMNS
    ))?;

    let items = stmt
        .query_map([], |row| SyncQueueItem::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(items)
}

pub fn count(conn: &Connection) -> Result<u32, AppError> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
    Ok(count)
}

/// Latest queued operation per set, read in one pass over the queue
pub fn pending_operations_by_set(
    conn: &Connection,
) -> Result<HashMap<String, SyncOperation>, AppError> {
    let mut latest = HashMap::new();
    for item in list_pending(conn)? {
        match item.mutation() {
            Ok(mutation) => {
                latest.insert(mutation.set_num().to_string(), mutation.operation());
            }
            Err(e) => log::warn!("Skipping unreadable queue item {}: {}", item.id, e),
        }
    }
    Ok(latest)
}

pub fn delete(conn: &Connection, id: i64) -> Result<(), AppError> {
    conn.execute("DELETE FROM sync_queue WHERE id = ?1", [id])?;
    Ok(())
}

/// Stores the new retry count of an item that stays queued
pub fn record_failure(
    conn: &Connection,
    id: i64,
    retry_count: u32,
    now: i64,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE sync_queue SET retry_count = ?1, last_retry_at = ?2 WHERE id = ?3",
        params![retry_count, now, id],
    )?;
    Ok(())
}

/// Removes an item and keeps a copy in `sync_dead_letters` (one transaction)
pub fn move_to_dead_letters(
    conn: &Connection,
    item: &SyncQueueItem,
    retry_count: u32,
    now: i64,
) -> Result<(), AppError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO sync_dead_letters (queue_id, operation, payload, created_at, retry_count, dropped_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item.id,
            item.operation,
            &item.payload,
            item.created_at,
            retry_count,
            now,
        ],
    )?;
    tx.execute("DELETE FROM sync_queue WHERE id = ?1", [item.id])?;
    tx.commit()?;
    Ok(())
}

pub fn count_dead_letters(conn: &Connection) -> Result<u32, AppError> {
    let count: u32 =
        conn.query_row("SELECT COUNT(*) FROM sync_dead_letters", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::init_schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn toggle(set_num: &str) -> SyncMutation {
        SyncMutation::ToggleOngoing {
            set_num: set_num.to_string(),
            value: true,
        }
    }

    #[test]
    fn test_pending_ordered_by_created_then_id() {
        let conn = setup();
        let late = insert(&conn, &toggle("late-1"), 20).unwrap();
        let first = insert(&conn, &toggle("a-1"), 10).unwrap();
        let second = insert(&conn, &toggle("b-1"), 10).unwrap();

        let ids: Vec<i64> = list_pending(&conn).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![first, second, late]);
        assert_eq!(count(&conn).unwrap(), 3);
    }

    #[test]
    fn test_record_failure_and_delete() {
        let conn = setup();
        let id = insert(&conn, &toggle("a-1"), 10).unwrap();
        record_failure(&conn, id, 2, 99).unwrap();

        let item = &list_pending(&conn).unwrap()[0];
        assert_eq!(item.retry_count, 2);
        assert_eq!(item.last_retry_at, Some(99));

        delete(&conn, id).unwrap();
        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_dead_letter_moves_item() {
        let conn = setup();
        insert(&conn, &toggle("a-1"), 10).unwrap();
        let item = list_pending(&conn).unwrap().remove(0);

        move_to_dead_letters(&conn, &item, 5, 100).unwrap();
        assert_eq!(count(&conn).unwrap(), 0);
        assert_eq!(count_dead_letters(&conn).unwrap(), 1);
    }

    #[test]
    fn test_pending_operations_keep_latest_per_set() {
        let conn = setup();
        insert(&conn, &toggle("a-1"), 10).unwrap();
        insert(
            &conn,
            &SyncMutation::RemoveSet {
                set_num: "a-1".to_string(),
            },
            20,
        )
        .unwrap();
        insert(&conn, &toggle("b-1"), 15).unwrap();

        let pending = pending_operations_by_set(&conn).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.get("a-1"), Some(&SyncOperation::RemoveSet));
        assert_eq!(pending.get("b-1"), Some(&SyncOperation::ToggleOngoing));
        assert_eq!(pending.get("c-1"), None);
    }
}
