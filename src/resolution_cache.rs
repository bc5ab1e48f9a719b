//! Process-scoped cache of supported camera resolutions
//!
//! Probing a camera for its resolutions can take seconds, so every probe runs
//! on a blocking worker, at most `workers` at a time. Results are keyed by the
//! camera display name and are write-once: a cached list is never replaced or
//! evicted. Callers that need a list wait on a watch channel with a timeout
//! instead of polling.

use crate::config::CamSourceConfig;
use crate::platform::{lock_webcam, SharedWebcam};
use crate::types::Resolution;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};

lazy_static::lazy_static! {
    static ref GLOBAL_CACHE: ResolutionCache =
        ResolutionCache::new(CamSourceConfig::load_or_default().probing.workers);
}

/// Outcome of waiting for a camera's resolutions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeWait {
    Ready(Vec<Resolution>),
    /// The camera reported no resolutions
    Unusable,
    TimedOut,
    /// Nothing is cached or probing under that name
    NotScheduled,
}

#[derive(Debug, Clone)]
enum ProbeOutcome {
    Ready(Vec<Resolution>),
    Unusable,
}

enum CacheEntry {
    Probing(watch::Receiver<Option<ProbeOutcome>>),
    Ready(Arc<Vec<Resolution>>),
}

struct CacheInner {
    entries: Mutex<HashMap<String, CacheEntry>>,
    permits: Arc<Semaphore>,
    workers: AtomicUsize,
    probes_started: AtomicUsize,
}

/// Called once when a scheduled probe finds no resolutions
pub type UnusableCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone)]
pub struct ResolutionCache {
    inner: Arc<CacheInner>,
}

impl ResolutionCache {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                permits: Arc::new(Semaphore::new(workers)),
                workers: AtomicUsize::new(workers),
                probes_started: AtomicUsize::new(0),
            }),
        }
    }

    /// Cache shared by every dialog in the process
    pub fn global() -> ResolutionCache {
        GLOBAL_CACHE.clone()
    }

    pub fn workers(&self) -> usize {
        self.inner.workers.load(Ordering::SeqCst)
    }

    /// Change how many probes may run at once.
    ///
    /// Shrinking retires idle permits immediately and the rest as running probes finish.
    pub fn set_workers(&self, workers: usize) {
        let workers = workers.max(1);
        let previous = self.inner.workers.swap(workers, Ordering::SeqCst);
        if workers == previous {
            return;
        }
        log::info!("Resolution probe workers: {} -> {}", previous, workers);

        if workers > previous {
            self.inner.permits.add_permits(workers - previous);
            return;
        }

        let excess = previous - workers;
        let owed = excess - self.inner.permits.forget_permits(excess);
        if owed == 0 {
            return;
        }
        let permits = self.inner.permits.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Ok(busy) = permits.acquire_many_owned(owed as u32).await {
                        busy.forget();
                    }
                });
            }
            Err(_) => log::warn!(
                "No async runtime, {} busy probe workers stay until restart",
                owed
            ),
        }
    }

    /// Number of probes ever started by this cache
    pub fn probe_count(&self) -> usize {
        self.inner.probes_started.load(Ordering::SeqCst)
    }

    pub fn get(&self, name: &str) -> Option<Vec<Resolution>> {
        let entries = self.entries();
        match entries.get(name) {
            Some(CacheEntry::Ready(list)) => Some(list.as_ref().clone()),
            _ => None,
        }
    }

    pub fn is_cached(&self, name: &str) -> bool {
        matches!(self.entries().get(name), Some(CacheEntry::Ready(_)))
    }

    pub fn is_probing(&self, name: &str) -> bool {
        matches!(self.entries().get(name), Some(CacheEntry::Probing(_)))
    }

    /// Start probing `webcam` unless `name` is already cached or being probed.
    ///
    /// Returns `true` when a new probe was started.
    pub fn schedule(
        &self,
        name: &str,
        webcam: SharedWebcam,
        on_unusable: Option<UnusableCallback>,
    ) -> bool {
        let tx = {
            let mut entries = self.entries();
            if entries.contains_key(name) {
                log::debug!("Resolutions of {} already known or probing", name);
                return false;
            }
            let (tx, rx) = watch::channel(None);
            entries.insert(name.to_string(), CacheEntry::Probing(rx));
            tx
        };

        self.inner.probes_started.fetch_add(1, Ordering::SeqCst);
        log::debug!("Scheduling resolution probe for {}", name);

        let cache = self.clone();
        let name = name.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let permits = self.inner.permits.clone();
                handle.spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    let probed =
                        tokio::task::spawn_blocking(move || probe_resolutions(&webcam)).await;
                    let resolutions = probed.unwrap_or_else(|e| {
                        log::warn!("Resolution probe panicked: {}", e);
                        Vec::new()
                    });
                    cache.complete(&name, resolutions, tx, on_unusable);
                });
            }
            Err(_) => {
                log::debug!("No async runtime, probing {} on a dedicated thread", name);
                std::thread::spawn(move || {
                    let resolutions = probe_resolutions(&webcam);
                    cache.complete(&name, resolutions, tx, on_unusable);
                });
            }
        }

        true
    }

    /// Wait up to `timeout` for the resolutions of `name`
    pub async fn wait_for(&self, name: &str, timeout: Duration) -> ProbeWait {
        let mut rx = {
            let entries = self.entries();
            match entries.get(name) {
                Some(CacheEntry::Ready(list)) => return ProbeWait::Ready(list.as_ref().clone()),
                Some(CacheEntry::Probing(rx)) => rx.clone(),
                None => return ProbeWait::NotScheduled,
            }
        };

        let waited = tokio::time::timeout(timeout, async {
            match rx.wait_for(|outcome| outcome.is_some()).await {
                Ok(outcome) => outcome.clone(),
                Err(_) => None,
            }
        })
        .await;

        match waited {
            Ok(Some(ProbeOutcome::Ready(list))) => ProbeWait::Ready(list),
            Ok(Some(ProbeOutcome::Unusable)) | Ok(None) => ProbeWait::Unusable,
            Err(_) => {
                log::warn!("Timed out after {:?} waiting for resolutions of {}", timeout, name);
                ProbeWait::TimedOut
            }
        }
    }

    fn complete(
        &self,
        name: &str,
        resolutions: Vec<Resolution>,
        tx: watch::Sender<Option<ProbeOutcome>>,
        on_unusable: Option<UnusableCallback>,
    ) {
        let outcome = {
            let mut entries = self.entries();
            if resolutions.is_empty() {
                entries.remove(name);
                ProbeOutcome::Unusable
            } else {
                log::debug!("Cached {} resolutions for {}", resolutions.len(), name);
                entries.insert(name.to_string(), CacheEntry::Ready(Arc::new(resolutions.clone())));
                ProbeOutcome::Ready(resolutions)
            }
        };

        if matches!(outcome, ProbeOutcome::Unusable) {
            log::warn!(
                "Webcam {} didn't return any available resolutions, therefore it's unavailable",
                name
            );
            if let Some(callback) = on_unusable {
                callback();
            }
        }

        tx.send_replace(Some(outcome));
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // entries are write-once, so a poisoned map is still consistent
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn probe_resolutions(webcam: &SharedWebcam) -> Vec<Resolution> {
    match lock_webcam(webcam) {
        Ok(mut webcam) => webcam.supported_resolutions(),
        Err(e) => {
            log::warn!("Cannot probe resolutions: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedWebcam;

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_probe_caches_in_order() {
        let cache = ResolutionCache::new(3);
        let webcam = ScriptedWebcam::new("Cam1", 0)
            .with_resolutions(vec![Resolution::hd(), Resolution::vga()])
            .into_shared();

        assert!(cache.schedule("Cam1", webcam, None));
        assert_eq!(
            cache.wait_for("Cam1", WAIT).await,
            ProbeWait::Ready(vec![Resolution::hd(), Resolution::vga()])
        );
        assert!(cache.is_cached("Cam1"));
        assert_eq!(cache.get("Cam1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_second_schedule_is_noop() {
        let cache = ResolutionCache::new(3);
        let webcam = ScriptedWebcam::new("Cam1", 0);
        let counters = webcam.counters();
        let webcam = webcam.into_shared();

        assert!(cache.schedule("Cam1", webcam.clone(), None));
        cache.wait_for("Cam1", WAIT).await;
        assert!(!cache.schedule("Cam1", webcam, None));

        assert_eq!(cache.probe_count(), 1);
        assert_eq!(counters.resolution_queries(), 1);
    }

    #[tokio::test]
    async fn test_empty_probe_is_unusable_and_unset() {
        let cache = ResolutionCache::new(3);
        let webcam = ScriptedWebcam::new("Broken", 0)
            .with_resolutions(Vec::new())
            .into_shared();
        let flagged = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = flagged.clone();

        cache.schedule(
            "Broken",
            webcam,
            Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
        );

        assert_eq!(cache.wait_for("Broken", WAIT).await, ProbeWait::Unusable);
        assert!(flagged.load(Ordering::SeqCst));
        assert!(!cache.is_cached("Broken"));
        assert!(!cache.is_probing("Broken"));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let cache = ResolutionCache::new(1);
        let webcam = ScriptedWebcam::new("Slow", 0)
            .with_resolution_delay(Duration::from_millis(300))
            .into_shared();

        cache.schedule("Slow", webcam, None);
        assert_eq!(
            cache.wait_for("Slow", Duration::from_millis(20)).await,
            ProbeWait::TimedOut
        );
        assert!(matches!(cache.wait_for("Slow", WAIT).await, ProbeWait::Ready(_)));
    }

    #[tokio::test]
    async fn test_unknown_name_not_scheduled() {
        let cache = ResolutionCache::new(3);
        assert_eq!(
            cache.wait_for("nobody", Duration::from_millis(10)).await,
            ProbeWait::NotScheduled
        );
    }

    #[tokio::test]
    async fn test_workers_bound_concurrency() {
        let cache = ResolutionCache::new(1);
        let slow = ScriptedWebcam::new("A", 0)
            .with_resolution_delay(Duration::from_millis(200))
            .into_shared();
        let quick = ScriptedWebcam::new("B", 1).into_shared();

        cache.schedule("A", slow, None);
        cache.schedule("B", quick, None);

        // B queues behind A on the single worker
        assert_eq!(
            cache.wait_for("B", Duration::from_millis(50)).await,
            ProbeWait::TimedOut
        );
        assert!(matches!(cache.wait_for("B", WAIT).await, ProbeWait::Ready(_)));
    }

    #[tokio::test]
    async fn test_set_workers_resizes_permits() {
        let cache = ResolutionCache::new(3);

        cache.set_workers(5);
        assert_eq!(cache.workers(), 5);
        assert_eq!(cache.inner.permits.available_permits(), 5);

        cache.set_workers(1);
        assert_eq!(cache.workers(), 1);
        assert_eq!(cache.inner.permits.available_permits(), 1);

        cache.set_workers(0);
        assert_eq!(cache.workers(), 1);
    }

    #[tokio::test]
    async fn test_shrinking_retires_busy_workers() {
        let cache = ResolutionCache::new(2);
        for (index, name) in ["A", "B"].into_iter().enumerate() {
            let slow = ScriptedWebcam::new(name, index as u32)
                .with_resolution_delay(Duration::from_millis(100))
                .into_shared();
            cache.schedule(name, slow, None);
        }
        // both cameras hold a permit
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.inner.permits.available_permits(), 0);

        cache.set_workers(1);
        assert!(matches!(cache.wait_for("A", WAIT).await, ProbeWait::Ready(_)));
        assert!(matches!(cache.wait_for("B", WAIT).await, ProbeWait::Ready(_)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.inner.permits.available_permits(), 1);
    }

    #[test]
    fn test_schedule_without_runtime() {
        let cache = ResolutionCache::new(3);
        let webcam = ScriptedWebcam::new("Cam1", 0).into_shared();
        assert!(cache.schedule("Cam1", webcam, None));

        let rt = tokio::runtime::Runtime::new().unwrap();
        let waited = rt.block_on(cache.wait_for("Cam1", WAIT));
        assert!(matches!(waited, ProbeWait::Ready(_)));
    }
}
