use crate::error::AppError;
use crate::models::SetRecord;
use rusqlite::{params, Connection, OptionalExtension};

const SET_COLUMNS: &str = "set_num, name, year, num_parts, image_url, theme_id, theme_name,
     is_ongoing, is_hidden, added_at, last_opened_at";

/// Inserts a set or updates its metadata and flags.
///
/// `added_at` of an existing row is kept, `last_opened_at` only moves forward.
pub fn upsert_set(conn: &Connection, set: &SetRecord) -> Result<(), AppError> {
    set.validate()?;

    conn.execute(
        "INSERT INTO sets (set_num, name, year, num_parts, image_url, theme_id, theme_name,
                           is_ongoing, is_hidden, added_at, last_opened_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(set_num) DO UPDATE SET
            name = excluded.name,
            year = excluded.year,
            num_parts = excluded.num_parts,
            image_url = excluded.image_url,
            theme_id = excluded.theme_id,
            theme_name = excluded.theme_name,
            is_ongoing = excluded.is_ongoing,
            is_hidden = excluded.is_hidden,
            last_opened_at = MAX(sets.last_opened_at, excluded.last_opened_at)",
        params![
            &set.set_num,
            &set.name,
            set.year,
            set.num_parts,
            &set.image_url,
            set.theme_id,
            &set.theme_name,
            set.is_ongoing,
            set.is_hidden,
            set.added_at,
            set.last_opened_at,
        ],
    )?;

    Ok(())
}

/// Refreshes name, year, parts and theme of a stored set. Flags are left
/// alone and missing sets are not created. Returns false if the set is not stored.
pub fn update_metadata(conn: &Connection, set: &SetRecord) -> Result<bool, AppError> {
    set.validate()?;

    let rows = conn.execute(
        "UPDATE sets SET name = ?1, year = ?2, num_parts = ?3, image_url = ?4,
                         theme_id = ?5, theme_name = ?6
         WHERE set_num = ?7",
        params![
            &set.name,
            set.year,
            set.num_parts,
            &set.image_url,
            set.theme_id,
            &set.theme_name,
            &set.set_num,
        ],
    )?;

    Ok(rows > 0)
}

pub fn get_set(conn: &Connection, set_num: &str) -> Result<SetRecord, AppError> {
    find_set(conn, set_num)?.ok_or_else(|| AppError::NotFound(format!("Set {}", set_num)))
}

pub fn find_set(conn: &Connection, set_num: &str) -> Result<Option<SetRecord>, AppError> {
    let set = conn
        .query_row(
            &format!("SELECT {} FROM sets WHERE set_num = ?1", SET_COLUMNS),
            [set_num],
            |row| SetRecord::try_from(row),
        )
        .optional()?;

    Ok(set)
}

/// Sets ordered by most recently opened first
pub fn list_recent_sets(
    conn: &Connection,
    include_hidden: bool,
) -> Result<Vec<SetRecord>, AppError> {
    let query = if include_hidden {
        format!(
            "SELECT {} FROM sets ORDER BY last_opened_at DESC, set_num",
            SET_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM sets WHERE is_hidden = 0 ORDER BY last_opened_at DESC, set_num",
            SET_COLUMNS
        )
    };

    let mut stmt = conn.prepare(&query)?;
    let sets = stmt
        .query_map([], |row| SetRecord::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(sets)
}

/// Deletes a set together with its cached inventory and progress.
/// Returns false if the set was not stored locally.
pub fn remove_set(conn: &Connection, set_num: &str) -> Result<bool, AppError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM progress WHERE set_num = ?1", [set_num])?;
    tx.execute("DELETE FROM inventories WHERE set_num = ?1", [set_num])?;
    let removed = tx.execute("DELETE FROM sets WHERE set_num = ?1", [set_num])?;
    tx.commit()?;

    Ok(removed > 0)
}

pub fn set_ongoing(conn: &Connection, set_num: &str, value: bool) -> Result<(), AppError> {
    let rows = conn.execute(
        "UPDATE sets SET is_ongoing = ?1 WHERE set_num = ?2",
        params![value, set_num],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Set {}", set_num)));
    }
    Ok(())
}

pub fn set_hidden(conn: &Connection, set_num: &str, value: bool) -> Result<(), AppError> {
    let rows = conn.execute(
        "UPDATE sets SET is_hidden = ?1 WHERE set_num = ?2",
        params![value, set_num],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Set {}", set_num)));
    }
    Ok(())
}

/// Marks a set as opened (moves it to the top of the recent list)
pub fn touch_opened(conn: &Connection, set_num: &str, now: i64) -> Result<(), AppError> {
    let rows = conn.execute(
        "UPDATE sets SET last_opened_at = MAX(last_opened_at, ?1) WHERE set_num = ?2",
        params![now, set_num],
    )?;
    if rows == 0 {
        return Err(AppError::NotFound(format!("Set {}", set_num)));
    }
    Ok(())
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

    fn set(set_num: &str, opened: i64) -> SetRecord {
        let mut set = SetRecord::new(set_num, "Galaxy Explorer", 1979, 338);
        set.added_at = opened;
        set.last_opened_at = opened;
        set
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = setup();
        upsert_set(&conn, &set("497-1", 10)).unwrap();

        let loaded = get_set(&conn, "497-1").unwrap();
        assert_eq!(loaded.name, "Galaxy Explorer");
        assert!(!loaded.is_hidden);
        assert!(matches!(get_set(&conn, "nope"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_upsert_keeps_added_at() {
        let conn = setup();
        upsert_set(&conn, &set("497-1", 10)).unwrap();
        upsert_set(&conn, &set("497-1", 50)).unwrap();

        let loaded = get_set(&conn, "497-1").unwrap();
        assert_eq!(loaded.added_at, 10);
        assert_eq!(loaded.last_opened_at, 50);
    }

    #[test]
    fn test_recent_order_and_hidden_filter() {
        let conn = setup();
        upsert_set(&conn, &set("a-1", 10)).unwrap();
        upsert_set(&conn, &set("b-1", 30)).unwrap();
        upsert_set(&conn, &set("c-1", 20)).unwrap();
        set_hidden(&conn, "c-1", true).unwrap();

        let all: Vec<String> = list_recent_sets(&conn, true)
            .unwrap()
            .into_iter()
            .map(|s| s.set_num)
            .collect();
        assert_eq!(all, vec!["b-1", "c-1", "a-1"]);

        let visible: Vec<String> = list_recent_sets(&conn, false)
            .unwrap()
            .into_iter()
            .map(|s| s.set_num)
            .collect();
        assert_eq!(visible, vec!["b-1", "a-1"]);
    }

    #[test]
    fn test_update_metadata_keeps_flags() {
        let conn = setup();
        upsert_set(&conn, &set("497-1", 10)).unwrap();
        set_ongoing(&conn, "497-1", true).unwrap();

        let mut remote = set("497-1", 10);
        remote.name = "Galaxy Explorer (renamed)".to_string();
        assert!(update_metadata(&conn, &remote).unwrap());

        let loaded = get_set(&conn, "497-1").unwrap();
        assert!(loaded.is_ongoing);
        assert_eq!(loaded.name, "Galaxy Explorer (renamed)");
    }

    #[test]
    fn test_update_metadata_does_not_insert() {
        let conn = setup();
        assert!(!update_metadata(&conn, &set("497-1", 10)).unwrap());
        assert!(find_set(&conn, "497-1").unwrap().is_none());
    }

    #[test]
    fn test_remove_cascades() {
        let conn = setup();
        upsert_set(&conn, &set("497-1", 10)).unwrap();
        conn.execute(
            "INSERT INTO inventories (set_num, parts, fetched_at) VALUES ('497-1', '[]', 1)",
            [],
        )
        .unwrap();

        assert!(remove_set(&conn, "497-1").unwrap());
        assert!(!remove_set(&conn, "497-1").unwrap());
        let inventories: i64 = conn
            .query_row("SELECT COUNT(*) FROM inventories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(inventories, 0);
    }

    #[test]
    fn test_touch_opened_only_moves_forward() {
        let conn = setup();
        upsert_set(&conn, &set("497-1", 100)).unwrap();
        touch_opened(&conn, "497-1", 50).unwrap();
        assert_eq!(get_set(&conn, "497-1").unwrap().last_opened_at, 100);
        touch_opened(&conn, "497-1", 150).unwrap();
        assert_eq!(get_set(&conn, "497-1").unwrap().last_opened_at, 150);
    }
}
