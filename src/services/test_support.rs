//! Scripted in-memory gateway for service tests
use crate::error::AppError;
use crate::models::{ProgressKey, ProgressUpdate};
use crate::services::remote_gateway::RemoteGateway;
use async_trait::async_trait;
use brick_api::{InventoryPayload, RemoteProgressRow, SetPayload};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    /// Outcome of the next mutating calls; `false` = fail. Empty = succeed.
    script: VecDeque<bool>,
    fail_all: bool,
    server_clock: i64,
    sets: HashMap<String, SetPayload>,
    progress: HashMap<ProgressKey, (u32, u32, i64)>,
    inventories: HashMap<String, InventoryPayload>,
    inventory_fetches: u32,
}

/// Fake server with upsert semantics. Mutating calls yield once before
/// answering so concurrent replays can interleave.
pub struct MockGateway {
    state: Mutex<MockState>,
    reachable: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                server_clock: 1_000,
                ..MockState::default()
            }),
            reachable: AtomicBool::new(true),
        }
    }

    /// Next mutating calls fail or succeed in this order
    pub fn script(&self, outcomes: &[bool]) {
        self.state.lock().unwrap().script.extend(outcomes);
    }

    pub fn fail_all(&self, fail: bool) {
        self.state.lock().unwrap().fail_all = fail;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Successful and failed mutating calls, as `"<operation> <set>"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn found_qty(&self, key: &ProgressKey) -> Option<u32> {
        self.state
            .lock()
            .unwrap()
            .progress
            .get(key)
            .map(|(_, found, _)| *found)
    }

    pub fn server_set(&self, set_num: &str) -> Option<SetPayload> {
        self.state.lock().unwrap().sets.get(set_num).cloned()
    }

    pub fn server_set_count(&self) -> usize {
        self.state.lock().unwrap().sets.len()
    }

    pub fn progress_count(&self) -> usize {
        self.state.lock().unwrap().progress.len()
    }

    pub fn inventory_fetches(&self) -> u32 {
        self.state.lock().unwrap().inventory_fetches
    }

    /// Seeds a server progress row with an explicit timestamp
    pub fn put_remote_progress(&self, key: ProgressKey, needed: u32, found: u32, updated_at: i64) {
        self.state
            .lock()
            .unwrap()
            .progress
            .insert(key, (needed, found, updated_at));
    }

    pub fn put_remote_set(&self, set: SetPayload) {
        self.state
            .lock()
            .unwrap()
            .sets
            .insert(set.set_num.clone(), set);
    }

    pub fn put_inventory(&self, inventory: InventoryPayload) {
        self.state
            .lock()
            .unwrap()
            .inventories
            .insert(inventory.set_num.clone(), inventory);
    }

    async fn mutate(
        &self,
        call: String,
        apply: impl FnOnce(&mut MockState),
    ) -> Result<(), AppError> {
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        let ok = !state.fail_all && state.script.pop_front().unwrap_or(true);
        if !ok {
            return Err(AppError::Remote(format!("{} rejected (503)", call)));
        }
        state.server_clock += 1;
        apply(&mut state);
        Ok(())
    }

    fn apply_progress(state: &mut MockState, update: &ProgressUpdate) {
        let now = state.server_clock;
        state
            .progress
            .insert(update.key.clone(), (update.needed_qty, update.found_qty, now));
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn add_set(&self, set: &SetPayload) -> Result<(), AppError> {
        let set = set.clone();
        self.mutate(format!("addSet {}", set.set_num), move |state| {
            state.sets.insert(set.set_num.clone(), set);
        })
        .await
    }

    async fn remove_set(&self, set_num: &str) -> Result<(), AppError> {
        let set_num = set_num.to_string();
        self.mutate(format!("removeSet {}", set_num), move |state| {
            state.sets.remove(&set_num);
            state.progress.retain(|key, _| key.set_num != set_num);
        })
        .await
    }

    async fn set_ongoing(&self, set_num: &str, value: bool) -> Result<(), AppError> {
        let set_num = set_num.to_string();
        self.mutate(format!("toggleOngoing {}", set_num), move |state| {
            if let Some(set) = state.sets.get_mut(&set_num) {
                set.is_ongoing = value;
            }
        })
        .await
    }

    async fn set_hidden(&self, set_num: &str, value: bool) -> Result<(), AppError> {
        let set_num = set_num.to_string();
        self.mutate(format!("toggleHidden {}", set_num), move |state| {
            if let Some(set) = state.sets.get_mut(&set_num) {
                set.is_hidden = value;
            }
        })
        .await
    }

    async fn upsert_progress(&self, update: &ProgressUpdate) -> Result<(), AppError> {
        let update = update.clone();
        self.mutate(
            format!("updateProgress {}", update.key.set_num),
            move |state| Self::apply_progress(state, &update),
        )
        .await
    }

    async fn bulk_upsert_progress(
        &self,
        set_num: &str,
        updates: &[ProgressUpdate],
    ) -> Result<(), AppError> {
        let updates = updates.to_vec();
        self.mutate(format!("bulkUpdateProgress {}", set_num), move |state| {
            for update in &updates {
                Self::apply_progress(state, update);
            }
        })
        .await
    }

    async fn fetch_progress(&self, set_num: &str) -> Result<Vec<RemoteProgressRow>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_all {
            return Err(AppError::Remote("fetch failed".to_string()));
        }
        Ok(state
            .progress
            .iter()
            .filter(|(key, _)| key.set_num == set_num)
            .map(|(key, (needed, found, updated_at))| RemoteProgressRow {
                part_num: key.part_num.clone(),
                color_id: key.color_id,
                is_spare: key.is_spare,
                needed_qty: *needed,
                found_qty: *found,
                updated_at: serde_json::Value::from(*updated_at),
            })
            .collect())
    }

    async fn fetch_sets(&self) -> Result<Vec<SetPayload>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_all {
            return Err(AppError::Remote("fetch failed".to_string()));
        }
        let mut sets: Vec<SetPayload> = state.sets.values().cloned().collect();
        sets.sort_by(|a, b| a.set_num.cmp(&b.set_num));
        Ok(sets)
    }

    async fn fetch_inventory(&self, set_num: &str) -> Result<InventoryPayload, AppError> {
        let mut state = self.state.lock().unwrap();
        state.inventory_fetches += 1;
        state
            .inventories
            .get(set_num)
            .cloned()
            .ok_or_else(|| AppError::Remote(format!("inventory {} (404)", set_num)))
    }

    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
