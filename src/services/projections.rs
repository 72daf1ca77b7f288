use crate::database::LocalStore;
use crate::error::AppError;
use crate::models::{InventoryRecord, ProgressRecord, SetRecord};
use crate::services::{inventory_service, progress_service, set_service};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::watch;

type Query<T> = Box<dyn Fn(&Connection) -> Result<T, AppError> + Send + Sync>;

/// A query that is re-run whenever the store commits a write
pub struct Projection<T> {
    store: Arc<LocalStore>,
    changes: watch::Receiver<u64>,
    query: Query<T>,
}

impl<T> Projection<T> {
    pub fn new(
        store: Arc<LocalStore>,
        query: impl Fn(&Connection) -> Result<T, AppError> + Send + Sync + 'static,
    ) -> Self {
        let changes = store.subscribe();
        Self {
            store,
            changes,
            query: Box::new(query),
        }
    }

    pub fn current(&self) -> Result<T, AppError> {
        self.store.read(|conn| (self.query)(conn))
    }

    /// Waits for the next committed write, then returns the fresh result
    pub async fn changed(&mut self) -> Result<T, AppError> {
        self.changes
            .changed()
            .await
            .map_err(|_| AppError::Other("Local store closed".to_string()))?;
        self.changes.borrow_and_update();
        self.current()
    }

    pub fn has_changed(&self) -> bool {
        self.changes.has_changed().unwrap_or(false)
    }
}

/// Sets by last opened, newest first
pub fn recent_sets(store: Arc<LocalStore>, include_hidden: bool) -> Projection<Vec<SetRecord>> {
    Projection::new(store, move |conn| {
        set_service::list_recent_sets(conn, include_hidden)
    })
}

pub fn inventory(store: Arc<LocalStore>, set_num: &str) -> Projection<Option<InventoryRecord>> {
    let set_num = set_num.to_string();
    Projection::new(store, move |conn| {
        inventory_service::get_inventory(conn, &set_num)
    })
}

pub fn progress(store: Arc<LocalStore>, set_num: &str) -> Projection<Vec<ProgressRecord>> {
    let set_num = set_num.to_string();
    Projection::new(store, move |conn| progress_service::list_for_set(conn, &set_num))
}
