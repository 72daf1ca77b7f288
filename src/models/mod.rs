pub mod inventory_record;
pub mod progress_record;
pub mod set_record;
pub mod sync_queue_item;

pub use brick_api::{MinifigEntry, PartLine};
pub use inventory_record::InventoryRecord;
pub use progress_record::{clamp_found_qty, ProgressKey, ProgressRecord};
pub use set_record::SetRecord;
pub use sync_queue_item::{
    ProgressUpdate, ReplaySummary, SyncMutation, SyncOperation, SyncQueueItem,
};
