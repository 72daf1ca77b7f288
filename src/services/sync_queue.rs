use crate::config::MAX_RETRY;
use crate::database::LocalStore;
use crate::error::AppError;
use crate::models::{ReplaySummary, SyncMutation, SyncQueueItem};
use crate::services::queue_service;
use crate::services::remote_gateway::{dispatch, NetworkMonitor, RemoteGateway};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// State shown by the sync indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Offline,
    Idle,
    Pending(u32),
    Syncing,
    Completed(ReplaySummary),
}

/// Durable queue of mutations that still have to reach the server.
///
/// Items are replayed in creation order. A failed item stays queued with an
/// incremented retry count until it reaches `max_retries`, then it is dropped
/// (or moved to `sync_dead_letters` if enabled).
pub struct SyncQueue {
    store: Arc<LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    network: Arc<dyn NetworkMonitor>,
    max_retries: u32,
    keep_dead_letters: bool,
    replaying: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

/// Releases the replay latch when a pass ends, including on early return
struct ReplayGuard<'a>(&'a AtomicBool);

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncQueue {
    pub fn new(
        store: Arc<LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        let (status, _rx) = watch::channel(SyncStatus::Idle);
        Self {
            store,
            gateway,
            network,
            max_retries: MAX_RETRY,
            keep_dead_letters: false,
            replaying: AtomicBool::new(false),
            status,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_dead_letters(mut self, keep: bool) -> Self {
        self.keep_dead_letters = keep;
        self
    }

    /// Persists a mutation for later replay; never touches the network
    pub fn enqueue(&self, mutation: &SyncMutation) -> Result<i64, AppError> {
        let created_at = self.store.now();
        let id = self
            .store
            .write(|conn| queue_service::insert(conn, mutation, created_at))?;
        log::debug!(
            "Queued {} for {} (id {})",
            mutation.operation().as_str(),
            mutation.set_num(),
            id
        );

        self.publish_pending()?;
        Ok(id)
    }

    pub fn pending_count(&self) -> Result<u32, AppError> {
        self.store.read(queue_service::count)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::SeqCst)
    }

    /// Sends every queued mutation once, oldest first.
    ///
    /// Returns an empty summary without doing anything when offline or when
    /// another replay is already running.
    pub async fn replay(&self) -> Result<ReplaySummary, AppError> {
        if !self.network.is_online() {
            log::debug!("Offline, skipping replay");
            self.status.send_replace(SyncStatus::Offline);
            return Ok(ReplaySummary::default());
        }

        if self
            .replaying
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Replay already in progress");
            return Ok(ReplaySummary::default());
        }
        let _guard = ReplayGuard(&self.replaying);

        let items = self.store.read(queue_service::list_pending)?;
        if items.is_empty() {
            self.status.send_replace(SyncStatus::Idle);
            return Ok(ReplaySummary::default());
        }

        self.status.send_replace(SyncStatus::Syncing);
        log::info!("Replaying {} queued mutations", items.len());

        let mut summary = ReplaySummary::default();
        for item in items {
            summary.total += 1;
            if self.replay_item(&item).await? {
                summary.success += 1;
            } else {
                summary.failed += 1;
            }
        }

        log::info!(
            "Replay finished: {} ok, {} failed of {}",
            summary.success,
            summary.failed,
            summary.total
        );
        self.status.send_replace(SyncStatus::Completed(summary));

        Ok(summary)
    }

    /// Returns true if the server accepted the item
    async fn replay_item(&self, item: &SyncQueueItem) -> Result<bool, AppError> {
        let mutation = match item.mutation() {
            Ok(mutation) => mutation,
            Err(e) => {
                log::error!(
                    "Dropping unreadable queue item {} ({}): {}",
                    item.id,
                    item.operation.as_str(),
                    e
                );
                self.store.write(|conn| queue_service::delete(conn, item.id))?;
                return Ok(false);
            }
        };

        match dispatch(self.gateway.as_ref(), &mutation).await {
            Ok(()) => {
                self.store.write(|conn| queue_service::delete(conn, item.id))?;
                Ok(true)
            }
            Err(e) => {
                let retry_count = item.retry_count + 1;
                let now = self.store.now();
                if retry_count >= self.max_retries {
                    log::warn!(
                        "Giving up on {} for {} after {} attempts: {}",
                        item.operation.as_str(),
                        mutation.set_num(),
                        retry_count,
                        e
                    );
                    self.store.write(|conn| {
                        if self.keep_dead_letters {
                            queue_service::move_to_dead_letters(conn, item, retry_count, now)
                        } else {
                            queue_service::delete(conn, item.id)
                        }
                    })?;
                } else {
                    log::warn!(
                        "Sync of {} for {} failed (attempt {}): {}",
                        item.operation.as_str(),
                        mutation.set_num(),
                        retry_count,
                        e
                    );
                    self.store.write(|conn| {
                        queue_service::record_failure(conn, item.id, retry_count, now)
                    })?;
                }
                Ok(false)
            }
        }
    }

    fn publish_pending(&self) -> Result<(), AppError> {
        if self.is_replaying() {
            return Ok(());
        }
        let pending = self.pending_count()?;
        self.status.send_replace(if pending == 0 {
            SyncStatus::Idle
        } else {
            SyncStatus::Pending(pending)
        });
        Ok(())
    }
}
