use crate::error::AppError;
use crate::models::InventoryRecord;
use rusqlite::{params, Connection, OptionalExtension};

/// Stores an inventory, replacing any previous one for the set
pub fn save_inventory(conn: &Connection, inventory: &InventoryRecord) -> Result<(), AppError> {
    let parts = serde_json::to_string(&inventory.parts)?;
    let minifigs = inventory
        .minifigs
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        "INSERT OR REPLACE INTO inventories (set_num, parts, minifigs, fetched_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![&inventory.set_num, parts, minifigs, inventory.fetched_at],
    )?;

    Ok(())
}

pub fn get_inventory(
    conn: &Connection,
    set_num: &str,
) -> Result<Option<InventoryRecord>, AppError> {
    let row = conn
        .query_row(
            "SELECT parts, minifigs, fetched_at FROM inventories WHERE set_num = ?1",
            [set_num],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((parts, minifigs, fetched_at)) = row else {
        return Ok(None);
    };

    Ok(Some(InventoryRecord {
        set_num: set_num.to_string(),
        parts: serde_json::from_str(&parts)?,
        minifigs: minifigs.as_deref().map(serde_json::from_str).transpose()?,
        fetched_at,
    }))
}
