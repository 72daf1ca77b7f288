use rusqlite::{Connection, Result};

/// Newest schema version known to this build
pub const LATEST_VERSION: i32 = 4;

/// Initialize or upgrade the database schema for the brick tracker
pub fn init_schema(conn: &Connection) -> Result<()> {
    migrate_to(conn, LATEST_VERSION)
}

/// Applies every migration above the stored version up to `target`.
///
/// Each step runs in its own transaction together with its version row, so a
/// failed step leaves the database at the previous version.
pub(crate) fn migrate_to(conn: &Connection, target: i32) -> Result<()> {
    // Schema version table for migrations
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version = current_version(conn)?;

    for version in (current_version + 1)..=target {
        let tx = conn.unchecked_transaction()?;
        match version {
            1 => create_schema_v1(&tx)?,
            2 => create_sync_queue_v2(&tx)?,
            3 => add_hidden_flag_v3(&tx)?,
            4 => create_dead_letters_v4(&tx)?,
            _ => break,
        }
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
        tx.commit()?;
        log::info!("Applied schema migration {}", version);
    }

    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Version 1: entity tables
fn create_schema_v1(conn: &Connection) -> Result<()> {
    // Table: sets (user's collection)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sets (
            set_num TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            year INTEGER NOT NULL,
            num_parts INTEGER NOT NULL DEFAULT 0 CHECK(num_parts >= 0),
            image_url TEXT,
            theme_id INTEGER,
            theme_name TEXT,
            is_ongoing INTEGER NOT NULL DEFAULT 0 CHECK(is_ongoing IN (0,1)),
            added_at INTEGER NOT NULL,
            last_opened_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sets_last_opened ON sets(last_opened_at DESC)",
        [],
    )?;

    // Table: inventories (one parts list per set, stored as JSON)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS inventories (
            set_num TEXT PRIMARY KEY,
            parts TEXT NOT NULL,
            minifigs TEXT,
            fetched_at INTEGER NOT NULL
        )",
        [],
    )?;

    // Table: progress (found count per set/part/color/spare)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS progress (
            id BLOB PRIMARY KEY,
            set_num TEXT NOT NULL,
            part_num TEXT NOT NULL,
            color_id INTEGER NOT NULL,
            is_spare INTEGER NOT NULL CHECK(is_spare IN (0,1)),
            needed_qty INTEGER NOT NULL CHECK(needed_qty >= 0),
            found_qty INTEGER NOT NULL DEFAULT 0 CHECK(found_qty >= 0),
            updated_at INTEGER NOT NULL,
            UNIQUE(set_num, part_num, color_id, is_spare)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_progress_set ON progress(set_num)",
        [],
    )?;

    // Table: app_meta (client id and other key/value settings)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Version 2: durable mutation queue
fn create_sync_queue_v2(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            operation TEXT CHECK(operation IN ('addSet', 'removeSet', 'toggleOngoing', 'toggleHidden', 'updateProgress', 'bulkUpdateProgress')) NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0 CHECK(retry_count >= 0),
            last_retry_at INTEGER
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_queue_created ON sync_queue(created_at, id)",
        [],
    )?;

    Ok(())
}

/// Version 3: `is_hidden` flag on sets, backfilled for existing rows
fn add_hidden_flag_v3(conn: &Connection) -> Result<()> {
    let has_hidden: bool = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info('sets') WHERE name='is_hidden'",
        [],
        |row| row.get::<_, i32>(0).map(|c| c > 0),
    )?;

    if !has_hidden {
        conn.execute(
            "ALTER TABLE sets ADD COLUMN is_hidden INTEGER NOT NULL DEFAULT 0 CHECK(is_hidden IN (0,1))",
            [],
        )?;
    }

    let backfilled = conn.execute("UPDATE sets SET is_hidden = 0 WHERE is_hidden IS NULL", [])?;
    if backfilled > 0 {
        log::info!("Backfilled is_hidden for {} sets", backfilled);
    }

    Ok(())
}

/// Version 4: dead letters for mutations dropped at the retry cap
fn create_dead_letters_v4(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_dead_letters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queue_id INTEGER NOT NULL,
            operation TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            retry_count INTEGER NOT NULL,
            dropped_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}
