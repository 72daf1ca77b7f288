use crate::error::AppError;
use crate::models::{clamp_found_qty, ProgressKey, ProgressRecord};
use crate::services::inventory_service;
use rusqlite::{params, Connection, OptionalExtension};

const PROGRESS_COLUMNS: &str =
    "set_num, part_num, color_id, is_spare, needed_qty, found_qty, updated_at";

/// Writes one progress record (insert or replace by key)
pub fn put_progress(conn: &Connection, record: &ProgressRecord) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO progress (id, set_num, part_num, color_id, is_spare, needed_qty, found_qty, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            needed_qty = excluded.needed_qty,
            found_qty = excluded.found_qty,
            updated_at = excluded.updated_at",
        params![
            record.key.encode(),
            &record.key.set_num,
            &record.key.part_num,
            record.key.color_id,
            record.key.is_spare,
            record.needed_qty,
            record.found_qty,
            record.updated_at,
        ],
    )?;

    Ok(())
}

pub fn get_progress(
    conn: &Connection,
    key: &ProgressKey,
) -> Result<Option<ProgressRecord>, AppError> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM progress WHERE id = ?1", PROGRESS_COLUMNS),
            [key.encode()],
            |row| ProgressRecord::try_from(row),
        )
        .optional()?;

    Ok(record)
}

/// All progress of a set in key order
pub fn list_for_set(conn: &Connection, set_num: &str) -> Result<Vec<ProgressRecord>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM progress WHERE set_num = ?1 ORDER BY id",
        PROGRESS_COLUMNS
    ))?;

    let records = stmt
        .query_map([set_num], |row| ProgressRecord::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Sets the found count of one part.
///
/// Negative counts are stored as 0. The needed count comes from the existing
/// record, then from `needed_hint`, then from the cached inventory.
pub fn update_progress(
    conn: &Connection,
    key: &ProgressKey,
    found_qty: i64,
    needed_hint: Option<u32>,
    now: i64,
) -> Result<ProgressRecord, AppError> {
    let needed_qty = resolve_needed_qty(conn, key, needed_hint)?;
    let record = ProgressRecord {
        key: key.clone(),
        needed_qty,
        found_qty: clamp_found_qty(found_qty),
        updated_at: now,
    };
    put_progress(conn, &record)?;

    Ok(record)
}

/// Applies several updates of one set in a single transaction
pub fn bulk_update_progress(
    conn: &Connection,
    set_num: &str,
    updates: &[(ProgressKey, i64, Option<u32>)],
    now: i64,
) -> Result<Vec<ProgressRecord>, AppError> {
    let tx = conn.unchecked_transaction()?;
    let mut records = Vec::with_capacity(updates.len());
    for (key, found_qty, needed_hint) in updates {
        if key.set_num != set_num {
            return Err(AppError::Validation(format!(
                "Progress for {} does not belong to set {}",
                key.set_num, set_num
            )));
        }
        records.push(update_progress(&tx, key, *found_qty, *needed_hint, now)?);
    }
    tx.commit()?;

    Ok(records)
}

/// Replaces all progress of a set with `records` (delete + insert, one transaction)
pub fn replace_for_set(
    conn: &Connection,
    set_num: &str,
    records: &[ProgressRecord],
) -> Result<(), AppError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM progress WHERE set_num = ?1", [set_num])?;
    for record in records {
        put_progress(&tx, record)?;
    }
    tx.commit()?;

    Ok(())
}

fn resolve_needed_qty(
    conn: &Connection,
    key: &ProgressKey,
    needed_hint: Option<u32>,
) -> Result<u32, AppError> {
    if let Some(existing) = get_progress(conn, key)? {
        return Ok(existing.needed_qty);
    }
    if let Some(needed) = needed_hint {
        return Ok(needed);
    }

    inventory_service::get_inventory(conn, &key.set_num)?
        .and_then(|inventory| inventory.needed_quantity(&key.part_num, key.color_id, key.is_spare))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Part {} (color {}) is not in the inventory of {}",
                key.part_num, key.color_id, key.set_num
            ))
        })
}
