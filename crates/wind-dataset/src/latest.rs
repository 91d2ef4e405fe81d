//! Cache of the most recent dataset in a directory.
//!
//! Finding the latest dataset means scanning a directory and mapping a large
//! file, so the result is kept in a single slot and handed out again while
//! the directory's newest forecast time is unchanged. A persistent lookup
//! arms a timer; if no further persistent lookup refreshes it within the TTL
//! the slot is emptied and the cache's reference to the dataset dropped.
//!
//! The slot also records its deadline. An entry past the deadline is treated
//! as empty even if the timer task never ran, e.g. because the runtime that
//! spawned it has shut down.
//!
//! ```text
//! get_latest(dir)
//!      │
//!      ├─► scan dir for newest ready dataset
//!      │
//!      ├─► slot holds (same time, same dir)?  ──► hit: re-arm timer, return it
//!      │
//!      └─► miss: open dataset ──► persistent? store in slot + arm timer
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::DatasetConfig;
use crate::dataset::{Dataset, DatasetOptions};
use crate::error::Result;
use crate::naming::latest_entry;

/// Statistics for the latest-dataset cache.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LatestCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Datasets opened on a miss
    pub opens: u64,
    /// Slots cleared by the invalidation timer
    pub expirations: u64,
}

impl LatestCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct CachedLatest {
    dataset: Arc<Dataset>,
    directory: PathBuf,
}

#[derive(Default)]
struct Slot {
    entry: Option<CachedLatest>,
    /// Bumped on every arm; a timer only clears the slot it armed.
    generation: u64,
    expires_at: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    stats: LatestCacheStats,
}

impl Slot {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// The cached entry, or `None` once its deadline has passed.
    fn live_entry(&mut self) -> Option<&CachedLatest> {
        let expired = self
            .expires_at
            .map_or(false, |deadline| Instant::now() >= deadline);
        if expired {
            self.clear_expired();
        }
        self.entry.as_ref()
    }

    fn clear_expired(&mut self) {
        self.cancel_timer();
        self.expires_at = None;
        if self.entry.take().is_some() {
            self.stats.expirations += 1;
            debug!("Latest dataset cache expired");
        }
    }
}

/// Single-slot, TTL-bounded cache of the latest dataset.
///
/// The slot is guarded by a mutex which the invalidation timer also takes,
/// so the cache may be shared between tasks and threads.
pub struct LatestDatasetCache {
    slot: Arc<Mutex<Slot>>,
    options: DatasetOptions,
    ttl: Duration,
    default_directory: PathBuf,
}

static GLOBAL: Lazy<LatestDatasetCache> = Lazy::new(|| {
    let config = DatasetConfig::from_env().sanitized();
    LatestDatasetCache::new(&config, DatasetOptions::from(&config))
});

impl LatestDatasetCache {
    /// Create a cache using `options` to open datasets.
    ///
    /// The TTL and default directory come from `config`. Invalid fields
    /// are replaced by their defaults.
    pub fn new(config: &DatasetConfig, options: DatasetOptions) -> Self {
        let config = config.clone().sanitized();
        info!(
            ttl_secs = config.latest_ttl_secs,
            directory = %config.directory.display(),
            "Initializing latest dataset cache"
        );
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            options,
            ttl: config.latest_ttl(),
            default_directory: config.directory.clone(),
        }
    }

    /// Override the invalidation interval.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Process-wide cache configured from the environment.
    pub fn global() -> &'static LatestDatasetCache {
        &GLOBAL
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn default_directory(&self) -> &Path {
        &self.default_directory
    }

    /// Latest dataset in the default directory.
    pub async fn get_latest_default(&self, persistent: bool) -> Result<Arc<Dataset>> {
        let directory = self.default_directory.clone();
        self.get_latest(&directory, persistent).await
    }

    /// Find the most recent ready dataset in `directory` and return it,
    /// reusing the cached handle when it is still the latest.
    ///
    /// With `persistent`, the returned dataset is kept in the cache and the
    /// invalidation timer is (re-)armed. Without it, a cached dataset is
    /// still reused but a newly opened one is not stored.
    ///
    /// Fails with `NoDatasetFound` if the directory holds no ready dataset.
    /// A failed open leaves the cache untouched.
    pub async fn get_latest(&self, directory: &Path, persistent: bool) -> Result<Arc<Dataset>> {
        let directory = directory.to_path_buf();
        let suffix = self.options.suffix.clone();
        let scan_dir = directory.clone();
        let latest = tokio::task::spawn_blocking(move || latest_entry(&scan_dir, &suffix)).await??;
        debug!(
            directory = %directory.display(),
            forecast_time = %latest.forecast_time,
            "Found latest dataset"
        );

        {
            let mut slot = self.slot.lock().await;
            let cached = slot.live_entry().and_then(|cached| {
                (cached.dataset.forecast_time() == latest.forecast_time
                    && cached.directory == directory)
                    .then(|| Arc::clone(&cached.dataset))
            });

            if let Some(dataset) = cached {
                slot.stats.hits += 1;
                if persistent {
                    self.arm(&mut slot);
                }
                debug!(forecast_time = %latest.forecast_time, "Latest dataset cache hit");
                return Ok(dataset);
            }
            slot.stats.misses += 1;
        }

        let dataset = self.open(latest.forecast_time, &directory).await?;

        let mut slot = self.slot.lock().await;
        slot.stats.opens += 1;
        if persistent {
            // Replacing the entry drops the old handle; it closes once no
            // caller holds it any more.
            slot.entry = Some(CachedLatest {
                dataset: Arc::clone(&dataset),
                directory,
            });
            self.arm(&mut slot);
        }

        Ok(dataset)
    }

    /// Empty the slot and cancel the invalidation timer.
    pub async fn clear(&self) {
        let mut slot = self.slot.lock().await;
        slot.cancel_timer();
        slot.expires_at = None;
        if slot.entry.take().is_some() {
            debug!("Latest dataset cache cleared");
        }
    }

    pub async fn is_populated(&self) -> bool {
        self.slot.lock().await.live_entry().is_some()
    }

    /// Forecast time of the cached dataset, if any.
    pub async fn cached_forecast_time(&self) -> Option<DateTime<Utc>> {
        self.slot
            .lock()
            .await
            .live_entry()
            .map(|cached| cached.dataset.forecast_time())
    }

    pub async fn stats(&self) -> LatestCacheStats {
        self.slot.lock().await.stats.clone()
    }

    async fn open(&self, forecast_time: DateTime<Utc>, directory: &Path) -> Result<Arc<Dataset>> {
        let options = self.options.clone();
        let directory = directory.to_path_buf();
        let dataset =
            tokio::task::spawn_blocking(move || Dataset::open(forecast_time, directory, &options))
                .await??;
        Ok(Arc::new(dataset))
    }

    /// Start (or restart) the countdown that empties the slot.
    fn arm(&self, slot: &mut Slot) {
        slot.cancel_timer();
        slot.generation += 1;
        slot.expires_at = Some(Instant::now() + self.ttl);

        let generation = slot.generation;
        let weak = Arc::downgrade(&self.slot);
        let ttl = self.ttl;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            expire(weak, generation).await;
        }));
    }
}

/// Timer callback: empty the slot unless it was re-armed since.
async fn expire(slot: Weak<Mutex<Slot>>, generation: u64) {
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let mut slot = slot.lock().await;
    if slot.generation != generation {
        return;
    }

    slot.timer = None;
    slot.clear_expired();
}

impl Drop for LatestDatasetCache {
    fn drop(&mut self) {
        // A timer left running on contention only holds a `Weak` to the slot
        // and exits without touching anything once the slot is gone.
        if let Ok(mut slot) = self.slot.try_lock() {
            slot.cancel_timer();
        }
    }
}

/// Latest dataset in `directory`, via the process-wide cache.
pub async fn open_latest(directory: &Path, persistent: bool) -> Result<Arc<Dataset>> {
    LatestDatasetCache::global()
        .get_latest(directory, persistent)
        .await
}
