use crate::config::SyncSettings;
use crate::error::AppError;
use crate::models::ReplaySummary;
use crate::services::clock::now_millis;
use crate::services::sync_service::SyncService;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::Notify;

/// Session log is volatile and capped at this many entries
const MAX_LOG_ENTRIES: usize = 500;

/// In-memory session log entry (lost on restart)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncLogEntry {
    pub ts_ms: i64,
    pub sets_pulled: usize,
    pub summary: ReplaySummary,
}

/// Periodic replay of the sync queue on a dedicated thread.
///
/// Each tick probes the server, pulls the set list and replays the queue.
/// [`BackgroundSync::notify_online`] starts a tick right away.
pub struct BackgroundSync {
    service: Arc<SyncService>,
    interval: Duration,
    retry_delay: Duration,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    next_sync_at: Arc<AtomicI64>,
    log: Arc<Mutex<Vec<SyncLogEntry>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundSync {
    pub fn new(service: Arc<SyncService>, settings: &SyncSettings) -> Self {
        Self {
            service,
            interval: Duration::from_secs(settings.interval_secs.max(1)),
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
            running: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            next_sync_at: Arc::new(AtomicI64::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
            handle: Mutex::new(None),
        }
    }

    /// Starts the loop; returns false if it was already running
    pub fn start(&self) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            log::warn!("Background sync already running");
            return false;
        }

        log::info!(
            "Starting background sync with {} second interval",
            self.interval.as_secs()
        );

        let service = self.service.clone();
        let running = self.running.clone();
        let wake = self.wake.clone();
        let next_sync_at = self.next_sync_at.clone();
        let log_store = self.log.clone();
        let interval = self.interval;
        let retry_delay = self.retry_delay;

        let handle = std::thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("Failed to create sync runtime: {}", e);
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            };

            while running.load(Ordering::SeqCst) {
                runtime.block_on(async {
                    let wait = match perform_sync_cycle(&service).await {
                        Ok(entry) => {
                            log::info!("Background sync completed: {:?}", entry.summary);
                            append_log(&log_store, entry);
                            interval
                        }
                        Err(e) => {
                            log::error!("Background sync error: {}", e);
                            retry_delay + jitter(retry_delay)
                        }
                    };

                    if !running.load(Ordering::SeqCst) {
                        return;
                    }
                    next_sync_at.store(now_millis() + wait.as_millis() as i64, Ordering::SeqCst);
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = wake.notified() => {
                            log::debug!("Background sync woken early");
                        }
                    }
                });
            }

            log::info!("Background sync stopped");
        });

        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(handle);
        }
        true
    }

    /// Stops the loop after the current tick and waits for the thread
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("Stopping background sync");
        self.wake.notify_one();
        self.join();
    }

    /// Blocks until the loop thread has ended
    pub fn join(&self) {
        let handle = self.handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                log::error!("Background sync thread panicked");
            }
        }
    }

    /// Connectivity came back: mark online and sync without waiting
    pub fn notify_online(&self) {
        self.service.network().set_online(true);
        self.wake.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn next_sync_eta_seconds(&self) -> Option<u64> {
        if !self.is_running() {
            return None;
        }
        let target = self.next_sync_at.load(Ordering::SeqCst);
        let now = now_millis();
        if target <= now {
            Some(0)
        } else {
            Some(((target - now) / 1000) as u64)
        }
    }

    pub fn sync_log(&self) -> Vec<SyncLogEntry> {
        self.log.lock().map(|guard| guard.clone()).unwrap_or_default()
    }

    pub fn last_summary(&self) -> Option<ReplaySummary> {
        self.log
            .lock()
            .ok()
            .and_then(|guard| guard.last().map(|entry| entry.summary))
    }
}

impl Drop for BackgroundSync {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One tick: probe, pull remote sets, replay the queue
async fn perform_sync_cycle(service: &SyncService) -> Result<SyncLogEntry, AppError> {
    let reachable = service.gateway().is_reachable().await;
    service.network().set_online(reachable);
    if !reachable {
        return Err(AppError::Remote("Server not reachable".to_string()));
    }

    let sets_pulled = service.pull_sets().await?;
    let summary = service.replay().await?;

    Ok(SyncLogEntry {
        ts_ms: now_millis(),
        sets_pulled,
        summary,
    })
}

fn append_log(log_store: &Mutex<Vec<SyncLogEntry>>, entry: SyncLogEntry) {
    if let Ok(mut guard) = log_store.lock() {
        guard.push(entry);
        let len = guard.len();
        if len > MAX_LOG_ENTRIES {
            guard.drain(0..len - MAX_LOG_ENTRIES);
        }
    }
}

/// Up to a tenth of the retry delay, so clients do not retry in lockstep
fn jitter(retry_delay: Duration) -> Duration {
    use rand::Rng;

    let max_ms = (retry_delay.as_millis() / 10) as u64;
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::LocalStore;
    use crate::models::SyncMutation;
    use crate::services::remote_gateway::{ConnectivityFlag, NetworkMonitor};
    use crate::services::sync_queue::SyncQueue;
    use crate::services::test_support::MockGateway;
    use brick_api::SetPayload;
    use std::time::Instant;

    fn service(gateway: Arc<MockGateway>, online: bool) -> Arc<SyncService> {
        let store = Arc::new(LocalStore::open_in_memory().unwrap());
        let network = Arc::new(ConnectivityFlag::new(online));
        let queue = Arc::new(SyncQueue::new(
            store.clone(),
            gateway.clone(),
            network.clone(),
        ));
        Arc::new(SyncService::new(store, gateway, network, queue))
    }

    fn settings() -> SyncSettings {
        SyncSettings {
            interval_secs: 3600,
            retry_delay_secs: 3600,
            ..SyncSettings::default()
        }
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_first_tick_replays_queue() {
        let gateway = Arc::new(MockGateway::new());
        let service = service(gateway.clone(), false);
        service
            .enqueue(&SyncMutation::RemoveSet {
                set_num: "6000-1".to_string(),
            })
            .unwrap();

        let background = BackgroundSync::new(service.clone(), &settings());
        assert!(background.start());
        assert!(wait_for(|| background.last_summary().is_some()));

        assert_eq!(background.last_summary().unwrap().success, 1);
        assert_eq!(service.pending_count().unwrap(), 0);
        assert!(service.network().is_online());
        background.stop();
        assert!(!background.is_running());
    }

    #[test]
    fn test_notify_online_triggers_tick() {
        let gateway = Arc::new(MockGateway::new());
        let service = service(gateway.clone(), true);
        let background = BackgroundSync::new(service.clone(), &settings());
        background.start();
        assert!(wait_for(|| background.sync_log().len() == 1));

        service
            .enqueue(&SyncMutation::RemoveSet {
                set_num: "6000-1".to_string(),
            })
            .unwrap();
        background.notify_online();

        assert!(wait_for(|| background.sync_log().len() == 2));
        assert_eq!(service.pending_count().unwrap(), 0);
        assert!(background.next_sync_eta_seconds().is_some());
        background.stop();
    }

    #[test]
    fn test_tick_does_not_restore_set_removed_offline() {
        let gateway = Arc::new(MockGateway::new());
        gateway.put_remote_set(SetPayload {
            set_num: "6086-1".to_string(),
            name: "Black Knight's Castle".to_string(),
            year: 1992,
            num_parts: 588,
            image_url: None,
            theme_id: None,
            theme_name: None,
            is_ongoing: false,
            is_hidden: false,
            added_at: None,
        });
        let service = service(gateway.clone(), false);
        service
            .enqueue(&SyncMutation::RemoveSet {
                set_num: "6086-1".to_string(),
            })
            .unwrap();

        let background = BackgroundSync::new(service.clone(), &settings());
        background.start();
        assert!(wait_for(|| background.last_summary().is_some()));
        background.stop();

        let entry = background.sync_log()[0];
        assert_eq!(entry.sets_pulled, 0);
        assert_eq!(entry.summary.success, 1);
        assert_eq!(gateway.server_set_count(), 0);
        let local = service
            .store()
            .read(|conn| crate::services::set_service::find_set(conn, "6086-1"))
            .unwrap();
        assert!(local.is_none());
    }

    #[test]
    fn test_unreachable_server_marks_offline() {
        let gateway = Arc::new(MockGateway::new());
        gateway.set_reachable(false);
        let service = service(gateway.clone(), true);
        let background = BackgroundSync::new(service.clone(), &settings());
        background.start();

        assert!(wait_for(|| !service.network().is_online()));
        assert!(background.sync_log().is_empty());
        background.stop();
    }

    #[test]
    fn test_second_start_is_noop() {
        let gateway = Arc::new(MockGateway::new());
        let background = BackgroundSync::new(service(gateway, true), &settings());
        assert!(background.start());
        assert!(!background.start());
        background.stop();
        assert_eq!(background.next_sync_eta_seconds(), None);
    }

    #[test]
    fn test_log_is_capped() {
        let log_store = Mutex::new(Vec::new());
        for i in 0..(MAX_LOG_ENTRIES + 20) {
            append_log(
                &log_store,
                SyncLogEntry {
                    ts_ms: i as i64,
                    sets_pulled: 0,
                    summary: ReplaySummary::default(),
                },
            );
        }
        let entries = log_store.lock().unwrap();
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        assert_eq!(entries[0].ts_ms, 20);
    }

    #[test]
    fn test_jitter_bounded() {
        for _ in 0..100 {
            assert!(jitter(Duration::from_secs(60)) <= Duration::from_secs(6));
        }
    }
}
