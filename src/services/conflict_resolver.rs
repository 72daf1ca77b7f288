//! Last-write-wins merge of remote progress into the local store
use crate::database::LocalStore;
use crate::error::AppError;
use crate::models::{ProgressKey, ProgressRecord};
use crate::services::clock::normalize_timestamp;
use crate::services::progress_service;
use brick_api::RemoteProgressRow;
use std::collections::BTreeMap;

/// Keeps local only if it is strictly newer; equal timestamps favour remote
pub fn lww_merge(local: Option<&ProgressRecord>, remote: ProgressRecord) -> ProgressRecord {
    match local {
        Some(local) if local.updated_at > remote.updated_at => local.clone(),
        _ => remote,
    }
}

/// Converts a server row into a record of `set_num`
pub fn from_remote(set_num: &str, row: &RemoteProgressRow) -> ProgressRecord {
    ProgressRecord {
        key: ProgressKey::new(set_num, &row.part_num, row.color_id, row.is_spare),
        needed_qty: row.needed_qty,
        found_qty: row.found_qty,
        updated_at: normalize_timestamp(&row.updated_at),
    }
}

/// Merged progress of one set, in key order.
///
/// Local records the server does not know about are kept unchanged.
pub fn resolve(
    set_num: &str,
    local: Vec<ProgressRecord>,
    remote: &[RemoteProgressRow],
) -> Vec<ProgressRecord> {
    let mut merged: BTreeMap<ProgressKey, ProgressRecord> = local
        .into_iter()
        .map(|record| (record.key.clone(), record))
        .collect();

    for row in remote {
        let incoming = from_remote(set_num, row);
        let winner = lww_merge(merged.get(&incoming.key), incoming);
        merged.insert(winner.key.clone(), winner);
    }

    merged.into_values().collect()
}

/// Merges server rows into the stored progress of a set.
///
/// Read, resolve and replace happen under one store lock and the replace is a
/// single transaction, so readers see either the old or the merged rows.
pub fn merge_from_remote(
    store: &LocalStore,
    set_num: &str,
    remote: &[RemoteProgressRow],
) -> Result<Vec<ProgressRecord>, AppError> {
    let merged = store.write(|conn| {
        let local = progress_service::list_for_set(conn, set_num)?;
        let merged = resolve(set_num, local, remote);
        progress_service::replace_for_set(conn, set_num, &merged)?;
        Ok(merged)
    })?;

    if let Some(newest) = merged.iter().map(|r| r.updated_at).max() {
        store.clock().observe(newest);
    }
    log::debug!(
        "Merged {} remote rows into {} ({} records)",
        remote.len(),
        set_num,
        merged.len()
    );

    Ok(merged)
}
