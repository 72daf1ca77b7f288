use crate::error::AppError;
use crate::models::ProgressKey;
use brick_api::SetPayload;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Kind of a queued mutation (stored in `sync_queue.operation`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SyncOperation {
    AddSet,
    RemoveSet,
    ToggleOngoing,
    ToggleHidden,
    UpdateProgress,
    BulkUpdateProgress,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::AddSet => "addSet",
            SyncOperation::RemoveSet => "removeSet",
            SyncOperation::ToggleOngoing => "toggleOngoing",
            SyncOperation::ToggleHidden => "toggleHidden",
            SyncOperation::UpdateProgress => "updateProgress",
            SyncOperation::BulkUpdateProgress => "bulkUpdateProgress",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "addSet" => Some(SyncOperation::AddSet),
            "removeSet" => Some(SyncOperation::RemoveSet),
            "toggleOngoing" => Some(SyncOperation::ToggleOngoing),
            "toggleHidden" => Some(SyncOperation::ToggleHidden),
            "updateProgress" => Some(SyncOperation::UpdateProgress),
            "bulkUpdateProgress" => Some(SyncOperation::BulkUpdateProgress),
            _ => None,
        }
    }
}

impl ToSql for SyncOperation {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SyncOperation {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        SyncOperation::from_str(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown sync operation '{}'", s).into()))
    }
}

/// Progress write as sent to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    #[serde(flatten)]
    pub key: ProgressKey,
    pub needed_qty: u32,
    pub found_qty: u32,
}

impl ProgressUpdate {
    pub fn to_row(&self) -> brick_api::ProgressRow {
        brick_api::ProgressRow {
            part_num: self.key.part_num.clone(),
            color_id: self.key.color_id,
            is_spare: self.key.is_spare,
            needed_qty: self.needed_qty,
            found_qty: self.found_qty,
        }
    }
}

/// A mutation that still has to reach the server
#[derive(Debug, Clone, PartialEq)]
pub enum SyncMutation {
    AddSet(SetPayload),
    RemoveSet { set_num: String },
    ToggleOngoing { set_num: String, value: bool },
    ToggleHidden { set_num: String, value: bool },
    UpdateProgress(ProgressUpdate),
    BulkUpdateProgress {
        set_num: String,
        updates: Vec<ProgressUpdate>,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetNumPayload {
    set_num: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlagPayload {
    set_num: String,
    value: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkPayload {
    set_num: String,
    updates: Vec<ProgressUpdate>,
}

impl SyncMutation {
    pub fn operation(&self) -> SyncOperation {
        match self {
            SyncMutation::AddSet(_) => SyncOperation::AddSet,
            SyncMutation::RemoveSet { .. } => SyncOperation::RemoveSet,
            SyncMutation::ToggleOngoing { .. } => SyncOperation::ToggleOngoing,
            SyncMutation::ToggleHidden { .. } => SyncOperation::ToggleHidden,
            SyncMutation::UpdateProgress(_) => SyncOperation::UpdateProgress,
            SyncMutation::BulkUpdateProgress { .. } => SyncOperation::BulkUpdateProgress,
        }
    }

    /// Set the mutation targets
    pub fn set_num(&self) -> &str {
        match self {
            SyncMutation::AddSet(set) => &set.set_num,
            SyncMutation::RemoveSet { set_num }
            | SyncMutation::ToggleOngoing { set_num, .. }
            | SyncMutation::ToggleHidden { set_num, .. }
            | SyncMutation::BulkUpdateProgress { set_num, .. } => set_num,
            SyncMutation::UpdateProgress(update) => &update.key.set_num,
        }
    }

    /// JSON body stored in `sync_queue.payload`
    pub fn payload_json(&self) -> Result<String, AppError> {
        let json = match self {
            SyncMutation::AddSet(set) => serde_json::to_string(set)?,
            SyncMutation::RemoveSet { set_num } => serde_json::to_string(&SetNumPayload {
                set_num: set_num.clone(),
            })?,
            SyncMutation::ToggleOngoing { set_num, value }
            | SyncMutation::ToggleHidden { set_num, value } => {
                serde_json::to_string(&FlagPayload {
                    set_num: set_num.clone(),
                    value: *value,
                })?
            }
            SyncMutation::UpdateProgress(update) => serde_json::to_string(update)?,
            SyncMutation::BulkUpdateProgress { set_num, updates } => {
                serde_json::to_string(&BulkPayload {
                    set_num: set_num.clone(),
                    updates: updates.clone(),
                })?
            }
        };
        Ok(json)
    }

    pub fn from_parts(operation: SyncOperation, payload: &str) -> Result<Self, AppError> {
        let mutation = match operation {
            SyncOperation::AddSet => SyncMutation::AddSet(serde_json::from_str(payload)?),
            SyncOperation::RemoveSet => {
                let p: SetNumPayload = serde_json::from_str(payload)?;
                SyncMutation::RemoveSet { set_num: p.set_num }
            }
            SyncOperation::ToggleOngoing => {
                let p: FlagPayload = serde_json::from_str(payload)?;
                SyncMutation::ToggleOngoing {
                    set_num: p.set_num,
                    value: p.value,
                }
            }
            SyncOperation::ToggleHidden => {
                let p: FlagPayload = serde_json::from_str(payload)?;
                SyncMutation::ToggleHidden {
                    set_num: p.set_num,
                    value: p.value,
                }
            }
            SyncOperation::UpdateProgress => {
                SyncMutation::UpdateProgress(serde_json::from_str(payload)?)
            }
            SyncOperation::BulkUpdateProgress => {
                let p: BulkPayload = serde_json::from_str(payload)?;
                SyncMutation::BulkUpdateProgress {
                    set_num: p.set_num,
                    updates: p.updates,
                }
            }
        };
        Ok(mutation)
    }
}

/// Row of the durable mutation queue
#[derive(Debug, Clone, PartialEq)]
pub struct SyncQueueItem {
    pub id: i64,
    pub operation: SyncOperation,
    pub payload: String,
    pub created_at: i64,
    pub retry_count: u32,
    pub last_retry_at: Option<i64>,
}

impl SyncQueueItem {
    pub fn mutation(&self) -> Result<SyncMutation, AppError> {
        SyncMutation::from_parts(self.operation, &self.payload)
    }
}

impl<'r> TryFrom<&Row<'r>> for SyncQueueItem {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(SyncQueueItem {
            id: row.get("id")?,
            operation: row.get("operation")?,
            payload: row.get("payload")?,
            created_at: row.get("created_at")?,
            retry_count: row.get("retry_count")?,
            last_retry_at: row.get("last_retry_at")?,
        })
    }
}

/// Counts of one replay pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplaySummary {
    pub success: u32,
    pub failed: u32,
    pub total: u32,
}
