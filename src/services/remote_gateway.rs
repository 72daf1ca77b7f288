use crate::error::AppError;
use crate::models::{ProgressUpdate, SyncMutation};
use async_trait::async_trait;
use brick_api::{
    BrickApiClient, BrickApiConfig, InventoryPayload, RemoteProgressRow, SetFlagsPatch, SetPayload,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// Server side of the sync: one call per mutation kind plus the reads used
/// for pulling. Every non-success answer is an `Err`.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn add_set(&self, set: &SetPayload) -> Result<(), AppError>;
    /// Absent sets count as removed
    async fn remove_set(&self, set_num: &str) -> Result<(), AppError>;
    async fn set_ongoing(&self, set_num: &str, value: bool) -> Result<(), AppError>;
    async fn set_hidden(&self, set_num: &str, value: bool) -> Result<(), AppError>;
    async fn upsert_progress(&self, update: &ProgressUpdate) -> Result<(), AppError>;
    async fn bulk_upsert_progress(
        &self,
        set_num: &str,
        updates: &[ProgressUpdate],
    ) -> Result<(), AppError>;
    async fn fetch_progress(&self, set_num: &str) -> Result<Vec<RemoteProgressRow>, AppError>;
    async fn fetch_sets(&self) -> Result<Vec<SetPayload>, AppError>;
    async fn fetch_inventory(&self, set_num: &str) -> Result<InventoryPayload, AppError>;

    /// Cheap reachability check used by the background loop
    async fn is_reachable(&self) -> bool {
        true
    }
}

/// Sends one queued mutation to the server
pub async fn dispatch(gateway: &dyn RemoteGateway, mutation: &SyncMutation) -> Result<(), AppError> {
    match mutation {
        SyncMutation::AddSet(set) => gateway.add_set(set).await,
        SyncMutation::RemoveSet { set_num } => gateway.remove_set(set_num).await,
        SyncMutation::ToggleOngoing { set_num, value } => {
            gateway.set_ongoing(set_num, *value).await
        }
        SyncMutation::ToggleHidden { set_num, value } => gateway.set_hidden(set_num, *value).await,
        SyncMutation::UpdateProgress(update) => gateway.upsert_progress(update).await,
        SyncMutation::BulkUpdateProgress { set_num, updates } => {
            gateway.bulk_upsert_progress(set_num, updates).await
        }
    }
}

/// Source of the online/offline signal
pub trait NetworkMonitor: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity flag set by the platform layer or the background probe
#[derive(Debug)]
pub struct ConnectivityFlag {
    online: AtomicBool,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    /// Returns true if the state changed
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            log::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
        previous != online
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// [`RemoteGateway`] over the tracker HTTP API
pub struct HttpGateway {
    client: BrickApiClient,
}

impl HttpGateway {
    pub fn new(config: BrickApiConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: BrickApiClient::new(config)?,
        })
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn add_set(&self, set: &SetPayload) -> Result<(), AppError> {
        Ok(self.client.put_set(set).await?)
    }

    async fn remove_set(&self, set_num: &str) -> Result<(), AppError> {
        Ok(self.client.delete_set(set_num).await?)
    }

    async fn set_ongoing(&self, set_num: &str, value: bool) -> Result<(), AppError> {
        let patch = SetFlagsPatch {
            is_ongoing: Some(value),
            ..SetFlagsPatch::default()
        };
        Ok(self.client.patch_set_flags(set_num, &patch).await?)
    }

    async fn set_hidden(&self, set_num: &str, value: bool) -> Result<(), AppError> {
        let patch = SetFlagsPatch {
            is_hidden: Some(value),
            ..SetFlagsPatch::default()
        };
        Ok(self.client.patch_set_flags(set_num, &patch).await?)
    }

    async fn upsert_progress(&self, update: &ProgressUpdate) -> Result<(), AppError> {
        Ok(self
            .client
            .put_progress(&update.key.set_num, &update.to_row())
            .await?)
    }

    async fn bulk_upsert_progress(
        &self,
        set_num: &str,
        updates: &[ProgressUpdate],
    ) -> Result<(), AppError> {
        let rows: Vec<_> = updates.iter().map(ProgressUpdate::to_row).collect();
        Ok(self.client.post_progress_bulk(set_num, &rows).await?)
    }

    async fn fetch_progress(&self, set_num: &str) -> Result<Vec<RemoteProgressRow>, AppError> {
        Ok(self.client.get_progress(set_num).await?)
    }

    async fn fetch_sets(&self) -> Result<Vec<SetPayload>, AppError> {
        Ok(self.client.get_sets().await?)
    }

    async fn fetch_inventory(&self, set_num: &str) -> Result<InventoryPayload, AppError> {
        Ok(self.client.get_inventory(set_num).await?)
    }

    async fn is_reachable(&self) -> bool {
        self.client.probe().await
    }
}
