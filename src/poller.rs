//! Background polling of `GET /api/status` into a process-wide cache.
//!
//! Every fetch takes a sequence number when it starts. A completion only lands if
//! no later-started fetch has landed first, so a slow response can never overwrite
//! fresher data. Failures keep the last good snapshot and flag it stale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use site_core::StatusSnapshot;

use crate::client::BackendClient;

#[derive(Clone, Debug, Default, Serialize)]
pub struct CachedStatus {
    /// `None` until the first successful poll.
    pub snapshot: Option<StatusSnapshot>,
    pub last_ok: Option<DateTime<Local>>,
    pub stale: bool,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct CacheState {
    status: CachedStatus,
    applied_seq: u64,
}

/// Single writer (the poller), many readers (every page).
#[derive(Clone, Default)]
pub struct StatusCache {
    inner: Arc<RwLock<CacheState>>,
    next_seq: Arc<AtomicU64>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the sequence number for a fetch that is about to start.
    pub fn begin(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Store `snapshot` unless a newer fetch already landed. Returns whether it was stored.
    pub async fn try_apply(&self, seq: u64, snapshot: StatusSnapshot) -> bool {
        let mut state = self.inner.write().await;
        if seq <= state.applied_seq {
            tracing::debug!("discarding stale status response seq={} applied={}", seq, state.applied_seq);
            return false;
        }
        state.applied_seq = seq;
        state.status = CachedStatus {
            snapshot: Some(snapshot),
            last_ok: Some(Local::now()),
            stale: false,
            last_error: None,
        };
        true
    }

    /// Record a failed fetch. Ignored when a newer fetch already succeeded.
    pub async fn mark_failed(&self, seq: u64, reason: String) -> bool {
        let mut state = self.inner.write().await;
        if seq <= state.applied_seq {
            return false;
        }
        state.status.stale = true;
        state.status.last_error = Some(reason);
        true
    }

    pub async fn current(&self) -> CachedStatus {
        self.inner.read().await.status.clone()
    }
}

/// Fetches status into a cache; cloned into every spawned task.
#[derive(Clone)]
pub struct Poller {
    client: BackendClient,
    cache: StatusCache,
}

impl Poller {
    pub fn new(client: BackendClient, cache: StatusCache) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &StatusCache {
        &self.cache
    }

    /// One guarded fetch. Returns whether the cache now holds this response.
    pub async fn poll_once(&self) -> bool {
        let seq = self.cache.begin();
        match self.client.fetch_status().await {
            Ok(snapshot) => {
                let stored = self.cache.try_apply(seq, snapshot).await;
                if stored {
                    tracing::debug!("status refreshed seq={}", seq);
                }
                stored
            }
            Err(err) => {
                tracing::warn!("status poll failed seq={} err={}", seq, err);
                self.cache.mark_failed(seq, err.to_string()).await;
                false
            }
        }
    }

    /// Start polling every `every`, first tick immediately.
    pub fn spawn(self, every: Duration) -> PollerHandle {
        let inflight: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));
        let tracked = inflight.clone();
        let timer = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // Independent fetch per tick; a slow one never delays the next.
                let poller = self.clone();
                let task = tokio::spawn(async move {
                    poller.poll_once().await;
                });
                let mut tasks = lock_tasks(&tracked);
                tasks.retain(|t| !t.is_finished());
                tasks.push(task);
            }
        });
        tracing::info!("status poller started interval_secs={}", every.as_secs());
        PollerHandle { timer, inflight }
    }
}

/// Owns the poll timer and its in-flight fetches. Dropping it stops both.
pub struct PollerHandle {
    timer: JoinHandle<()>,
    inflight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl PollerHandle {
    pub fn shutdown(self) {
        tracing::info!("status poller stopping");
        drop(self);
    }

    pub fn is_running(&self) -> bool {
        !self.timer.is_finished()
    }

    fn abort_all(&self) {
        self.timer.abort();
        for task in lock_tasks(&self.inflight).drain(..) {
            task.abort();
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.abort_all();
    }
}

fn lock_tasks(tasks: &Mutex<Vec<JoinHandle<()>>>) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
    match tasks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_soc(soc: f64) -> StatusSnapshot {
        let mut snap = StatusSnapshot::default();
        snap.ess.soc = soc;
        snap
    }

    #[tokio::test]
    async fn newer_request_wins() {
        let cache = StatusCache::new();
        let first = cache.begin();
        let second = cache.begin();

        assert!(cache.try_apply(second, snapshot_with_soc(80.0)).await);
        assert!(!cache.try_apply(first, snapshot_with_soc(10.0)).await);

        let current = cache.current().await;
        assert_eq!(current.snapshot.map(|s| s.ess.soc), Some(80.0));
    }

    #[tokio::test]
    async fn failure_keeps_last_snapshot() {
        let cache = StatusCache::new();
        let ok = cache.begin();
        cache.try_apply(ok, snapshot_with_soc(55.0)).await;

        let bad = cache.begin();
        assert!(cache.mark_failed(bad, "connection refused".to_string()).await);

        let current = cache.current().await;
        assert!(current.stale);
        assert_eq!(current.last_error.as_deref(), Some("connection refused"));
        assert_eq!(current.snapshot.map(|s| s.ess.soc), Some(55.0));
    }

    #[tokio::test]
    async fn late_failure_does_not_flag_fresh_data() {
        let cache = StatusCache::new();
        let older = cache.begin();
        let newer = cache.begin();
        cache.try_apply(newer, snapshot_with_soc(60.0)).await;

        assert!(!cache.mark_failed(older, "timeout".to_string()).await);
        assert!(!cache.current().await.stale);
    }

    #[tokio::test]
    async fn success_clears_stale() {
        let cache = StatusCache::new();
        let bad = cache.begin();
        cache.mark_failed(bad, "down".to_string()).await;
        assert!(cache.current().await.stale);
        assert!(cache.current().await.snapshot.is_none());

        let ok = cache.begin();
        cache.try_apply(ok, StatusSnapshot::default()).await;
        let current = cache.current().await;
        assert!(!current.stale);
        assert!(current.last_error.is_none());
        assert!(current.last_ok.is_some());
    }
}
