pub mod background_sync;
pub mod clock;
pub mod conflict_resolver;
pub mod inventory_service;
pub mod progress_service;
pub mod projections;
pub mod queue_service;
pub mod remote_gateway;
pub mod set_service;
pub mod sync_queue;
pub mod sync_service;

#[cfg(test)]
pub(crate) mod test_support;

pub use background_sync::{BackgroundSync, SyncLogEntry};
pub use projections::Projection;
pub use remote_gateway::{ConnectivityFlag, HttpGateway, NetworkMonitor, RemoteGateway};
pub use sync_queue::{SyncQueue, SyncStatus};
pub use sync_service::{OpenedSet, PushOutcome, SyncService};
