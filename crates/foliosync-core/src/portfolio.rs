//! Portfolio views, cache invalidation, and the sync orchestrator.
//!
//! The backend reconciles holdings across brokers asynchronously: a refresh
//! request is acknowledged before the work finishes. The orchestrator waits
//! a fixed settling delay after the ack, then invalidates cached views so
//! the next read re-fetches. The delay is an approximation, not a
//! completion signal; a polling-until-settled protocol would replace it if
//! the backend ever exposes one.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{ApiClient, ApiResult};

/// Read-only portfolio views served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortfolioView {
    Summary,
    NetPositions,
}

impl PortfolioView {
    /// Returns all cacheable views.
    pub fn all() -> &'static [PortfolioView] {
        &[PortfolioView::Summary, PortfolioView::NetPositions]
    }

    /// Returns the backend path for this view.
    pub fn path(&self) -> &'static str {
        match self {
            PortfolioView::Summary => "/portfolio/summary",
            PortfolioView::NetPositions => "/portfolio/net-positions",
        }
    }
}

struct CacheEntry {
    value: Value,
    stale: bool,
}

/// Per-view cache with explicit invalidation.
///
/// `fetch` returns the cached value while it is fresh; after
/// `invalidate_all`, the next read per view re-fetches exactly once.
pub struct PortfolioCache {
    client: Arc<ApiClient>,
    entries: Mutex<HashMap<PortfolioView, CacheEntry>>,
}

impl PortfolioCache {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            client,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the view's data, from cache when fresh.
    pub async fn fetch(&self, view: PortfolioView) -> ApiResult<Value> {
        {
            let entries = self.entries.lock().expect("portfolio cache poisoned");
            if let Some(entry) = entries.get(&view)
                && !entry.stale
            {
                return Ok(entry.value.clone());
            }
        }

        debug!(path = view.path(), "fetching portfolio view");
        let value: Value = self.client.get(view.path()).await?;
        self.entries
            .lock()
            .expect("portfolio cache poisoned")
            .insert(
                view,
                CacheEntry {
                    value: value.clone(),
                    stale: false,
                },
            );
        Ok(value)
    }

    /// Marks every cached view stale. Idempotent: invalidating twice still
    /// costs one re-fetch per view on the next read.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().expect("portfolio cache poisoned");
        for entry in entries.values_mut() {
            entry.stale = true;
        }
        debug!("portfolio cache invalidated");
    }
}

/// What a refresh trigger resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Refresh acknowledged, settled, caches invalidated.
    Completed,
    /// A refresh was already in flight; nothing was done.
    AlreadyRunning,
}

/// Triggers backend refreshes and invalidates dependent views.
pub struct SyncOrchestrator {
    client: Arc<ApiClient>,
    cache: Arc<PortfolioCache>,
    /// Re-entrancy guard: one refresh cycle at a time.
    in_flight: AtomicBool,
    settle: Duration,
    refreshing_tx: watch::Sender<bool>,
}

impl SyncOrchestrator {
    pub fn new(client: Arc<ApiClient>, cache: Arc<PortfolioCache>, settle: Duration) -> Self {
        let (refreshing_tx, _) = watch::channel(false);
        Self {
            client,
            cache,
            in_flight: AtomicBool::new(false),
            settle,
            refreshing_tx,
        }
    }

    /// Subscribes to the "refreshing" flag for UI consumption.
    pub fn subscribe_refreshing(&self) -> watch::Receiver<bool> {
        self.refreshing_tx.subscribe()
    }

    /// Runs one refresh cycle; overlapping calls are no-ops.
    ///
    /// On failure the in-flight guard is still cleared, but caches are NOT
    /// invalidated — no new data is guaranteed to exist.
    pub async fn trigger_refresh(&self) -> ApiResult<SyncOutcome> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("refresh already in flight, ignoring trigger");
            return Ok(SyncOutcome::AlreadyRunning);
        }

        let _ = self.refreshing_tx.send(true);
        let result = self.run_cycle().await;
        self.in_flight.store(false, Ordering::SeqCst);
        let _ = self.refreshing_tx.send(false);

        match result {
            Ok(()) => Ok(SyncOutcome::Completed),
            Err(e) => {
                warn!(error = %e, "portfolio refresh failed");
                Err(e)
            }
        }
    }

    async fn run_cycle(&self) -> ApiResult<()> {
        self.client.post_unit("/portfolio/refresh", &json!({})).await?;
        // The backend acks before reconciliation completes; give it time to
        // settle before trusting re-fetched data.
        tokio::time::sleep(self.settle).await;
        self.cache.invalidate_all();
        info!("portfolio refresh settled, caches invalidated");
        Ok(())
    }
}
