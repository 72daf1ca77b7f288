use crate::config::AppConfig;
use crate::database::LocalStore;
use crate::error::AppError;
use crate::models::{
    InventoryRecord, ProgressKey, ProgressRecord, ProgressUpdate, ReplaySummary, SetRecord,
    SyncMutation, SyncOperation,
};
use crate::services::clock::normalize_timestamp;
use crate::services::remote_gateway::{
    dispatch, ConnectivityFlag, HttpGateway, NetworkMonitor, RemoteGateway,
};
use crate::services::sync_queue::SyncQueue;
use crate::services::{
    conflict_resolver, inventory_service, progress_service, queue_service, set_service,
};
use brick_api::{BrickApiConfig, RemoteProgressRow};
use std::sync::Arc;

/// How a local change reached (or will reach) the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Synced,
    /// Stored in the sync queue under this id
    Queued(i64),
}

/// Everything the set screen needs after opening a set
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedSet {
    pub set: SetRecord,
    pub inventory: Option<InventoryRecord>,
    pub progress: Vec<ProgressRecord>,
}

/// Entry point for the UI: writes locally first, then pushes to the server
/// or queues the change for later.
pub struct SyncService {
    store: Arc<LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    network: Arc<ConnectivityFlag>,
    queue: Arc<SyncQueue>,
}

impl SyncService {
    pub fn new(
        store: Arc<LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        network: Arc<ConnectivityFlag>,
        queue: Arc<SyncQueue>,
    ) -> Self {
        Self {
            store,
            gateway,
            network,
            queue,
        }
    }

    /// Opens the store and wires the HTTP gateway from the configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let store = Arc::new(LocalStore::open(&config.database_path)?);
        let client_id = store.client_id()?;
        log::info!("Client id: {}", client_id);

        let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::new(BrickApiConfig {
            base_url: config.api.base_url.clone(),
            auth_token: config.api.auth_token.clone(),
            client_id,
            timeout_secs: config.api.timeout_secs,
        })?);
        let network = Arc::new(ConnectivityFlag::default());
        let queue = Arc::new(
            SyncQueue::new(store.clone(), gateway.clone(), network.clone())
                .with_max_retries(config.sync.max_retries)
                .with_dead_letters(config.sync.keep_dead_letters),
        );

        Ok(Self::new(store, gateway, network, queue))
    }

    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn RemoteGateway> {
        &self.gateway
    }

    pub fn network(&self) -> &Arc<ConnectivityFlag> {
        &self.network
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    pub async fn add_set(&self, mut set: SetRecord) -> Result<PushOutcome, AppError> {
        set.validate()?;
        let now = self.store.now();
        set.added_at = now;
        set.last_opened_at = now;

        self.store.write(|conn| set_service::upsert_set(conn, &set))?;
        log::info!("Added set {}", set.set_num);

        self.push(SyncMutation::AddSet(set.to_payload())).await
    }

    /// Removes the set with its inventory and progress
    pub async fn remove_set(&self, set_num: &str) -> Result<PushOutcome, AppError> {
        let removed = self
            .store
            .write(|conn| set_service::remove_set(conn, set_num))?;
        if !removed {
            log::debug!("Set {} was not stored locally", set_num);
        }

        self.push(SyncMutation::RemoveSet {
            set_num: set_num.to_string(),
        })
        .await
    }

    pub async fn toggle_ongoing(&self, set_num: &str, value: bool) -> Result<PushOutcome, AppError> {
        self.store
            .write(|conn| set_service::set_ongoing(conn, set_num, value))?;

        self.push(SyncMutation::ToggleOngoing {
            set_num: set_num.to_string(),
            value,
        })
        .await
    }

    pub async fn toggle_hidden(&self, set_num: &str, value: bool) -> Result<PushOutcome, AppError> {
        self.store
            .write(|conn| set_service::set_hidden(conn, set_num, value))?;

        self.push(SyncMutation::ToggleHidden {
            set_num: set_num.to_string(),
            value,
        })
        .await
    }

    /// Sets the found count of one part; negative counts become 0
    pub async fn update_progress(
        &self,
        key: &ProgressKey,
        found_qty: i64,
        needed_hint: Option<u32>,
    ) -> Result<PushOutcome, AppError> {
        let now = self.store.now();
        let record = self.store.write(|conn| {
            progress_service::update_progress(conn, key, found_qty, needed_hint, now)
        })?;

        self.push(SyncMutation::UpdateProgress(ProgressUpdate {
            key: record.key,
            needed_qty: record.needed_qty,
            found_qty: record.found_qty,
        }))
        .await
    }

    /// Several found counts of one set, stored in one transaction and sent as one call
    pub async fn bulk_update_progress(
        &self,
        set_num: &str,
        updates: &[(ProgressKey, i64, Option<u32>)],
    ) -> Result<PushOutcome, AppError> {
        let now = self.store.now();
        let records = self.store.write(|conn| {
            progress_service::bulk_update_progress(conn, set_num, updates, now)
        })?;

        self.push(SyncMutation::BulkUpdateProgress {
            set_num: set_num.to_string(),
            updates: records
                .into_iter()
                .map(|record| ProgressUpdate {
                    key: record.key,
                    needed_qty: record.needed_qty,
                    found_qty: record.found_qty,
                })
                .collect(),
        })
        .await
    }

    /// Marks the set as opened, makes sure its inventory is cached and
    /// refreshes its progress from the server when online.
    pub async fn open_set(&self, set_num: &str) -> Result<OpenedSet, AppError> {
        let now = self.store.now();
        self.store
            .write(|conn| set_service::touch_opened(conn, set_num, now))?;

        let inventory = self.ensure_inventory(set_num).await?;

        if self.network.is_online() {
            if let Err(e) = self.pull_progress(set_num).await {
                log::warn!("Could not refresh progress of {}: {}", set_num, e);
            }
        }

        let (set, progress) = self.store.read(|conn| {
            Ok((
                set_service::get_set(conn, set_num)?,
                progress_service::list_for_set(conn, set_num)?,
            ))
        })?;

        Ok(OpenedSet {
            set,
            inventory,
            progress,
        })
    }

    async fn ensure_inventory(&self, set_num: &str) -> Result<Option<InventoryRecord>, AppError> {
        if let Some(cached) = self
            .store
            .read(|conn| inventory_service::get_inventory(conn, set_num))?
        {
            return Ok(Some(cached));
        }
        if !self.network.is_online() {
            return Ok(None);
        }

        match self.gateway.fetch_inventory(set_num).await {
            Ok(payload) => {
                let inventory = InventoryRecord::from_payload(payload, self.store.now());
                self.store
                    .write(|conn| inventory_service::save_inventory(conn, &inventory))?;
                log::info!(
                    "Cached inventory of {} ({} lines)",
                    set_num,
                    inventory.parts.len()
                );
                Ok(Some(inventory))
            }
            Err(e) => {
                log::warn!("Could not fetch inventory of {}: {}", set_num, e);
                Ok(None)
            }
        }
    }

    /// Fetches the server progress of a set and merges it into the store
    pub async fn pull_progress(&self, set_num: &str) -> Result<Vec<ProgressRecord>, AppError> {
        let rows = self.gateway.fetch_progress(set_num).await?;
        self.merge_from_remote(set_num, &rows).await
    }

    /// Last-write-wins merge of server rows, followed by a replay of the queue
    pub async fn merge_from_remote(
        &self,
        set_num: &str,
        rows: &[RemoteProgressRow],
    ) -> Result<Vec<ProgressRecord>, AppError> {
        let merged = conflict_resolver::merge_from_remote(&self.store, set_num, rows)?;

        if let Err(e) = self.queue.replay().await {
            log::warn!("Replay after merge failed: {}", e);
        }

        Ok(merged)
    }

    /// Updates local sets from the server.
    ///
    /// Sets with queued changes only get their metadata refreshed: local flags
    /// stay until the changes are sent, and a set removed locally is not
    /// brought back before its `removeSet` reaches the server.
    pub async fn pull_sets(&self) -> Result<usize, AppError> {
        let remote = self.gateway.fetch_sets().await?;
        let fallback = self.store.now();

        let count = self.store.write(|conn| {
            let tx = conn.unchecked_transaction()?;
            let pending = queue_service::pending_operations_by_set(&tx)?;
            let mut applied = 0;
            for payload in &remote {
                let added_at = payload
                    .added_at
                    .as_ref()
                    .map(normalize_timestamp)
                    .filter(|ts| *ts > 0)
                    .unwrap_or(fallback);
                let set = SetRecord::from_payload(payload.clone(), added_at);

                match pending.get(&set.set_num) {
                    Some(SyncOperation::RemoveSet) => {
                        log::debug!("Skipping {}: removal not yet synced", set.set_num);
                    }
                    Some(_) => {
                        if set_service::update_metadata(&tx, &set)? {
                            applied += 1;
                        }
                    }
                    None => {
                        set_service::upsert_set(&tx, &set)?;
                        applied += 1;
                    }
                }
            }
            tx.commit()?;
            Ok(applied)
        })?;

        log::info!("Pulled {} of {} remote sets", count, remote.len());
        Ok(count)
    }

    pub fn enqueue(&self, mutation: &SyncMutation) -> Result<i64, AppError> {
        self.queue.enqueue(mutation)
    }

    pub async fn replay(&self) -> Result<ReplaySummary, AppError> {
        self.queue.replay().await
    }

    pub fn pending_count(&self) -> Result<u32, AppError> {
        self.queue.pending_count()
    }

    /// Sends a mutation now or queues it.
    ///
    /// While older mutations are queued the new one goes behind them so the
    /// server sees changes in the order they were made.
    async fn push(&self, mutation: SyncMutation) -> Result<PushOutcome, AppError> {
        if !self.network.is_online() {
            let id = self.queue.enqueue(&mutation)?;
            return Ok(PushOutcome::Queued(id));
        }

        if self.queue.pending_count()? > 0 {
            let id = self.queue.enqueue(&mutation)?;
            if let Err(e) = self.queue.replay().await {
                log::warn!("Replay failed: {}", e);
            }
            return Ok(PushOutcome::Queued(id));
        }

        match dispatch(self.gateway.as_ref(), &mutation).await {
            Ok(()) => Ok(PushOutcome::Synced),
            Err(e) => {
                log::warn!(
                    "Push of {} for {} failed, queueing: {}",
                    mutation.operation().as_str(),
                    mutation.set_num(),
                    e
                );
                let id = self.queue.enqueue(&mutation)?;
                Ok(PushOutcome::Queued(id))
            }
        }
    }
}
