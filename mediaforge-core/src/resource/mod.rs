//! Coalesced resolution of expensive, identifier-keyed work.
//!
//! A [`ResourceBroker`] guarantees that at most one computation per
//! identifier is in flight at any time. The first caller for an identifier
//! becomes the leader and dispatches the work to a bounded worker pool;
//! everyone arriving while the work is pending joins its waiter list and
//! receives the same result. Completed results are kept for a short TTL so
//! immediate re-requests are served from memory, and a background sweep
//! reclaims entries past expiry.
//!
//! The broker never looks inside results. A fetcher that wants to convey
//! failure returns an error-shaped value; it is cached and broadcast exactly
//! like a success, once.

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use mediaforge_config::ResourceBrokerConfig;
use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, warn};

/// One unit of work flowing through the broker. `metadata` is an opaque
/// payload handed to the fetcher untouched.
#[derive(Debug)]
pub struct WorkRequest<M> {
    pub identifier: String,
    pub metadata: M,
}

/// The computation a broker runs on cache misses.
#[async_trait]
pub trait FetchResource: Send + Sync + 'static {
    type Metadata: Send + 'static;
    type Output: Clone + Send + 'static;

    async fn fetch(&self, request: WorkRequest<Self::Metadata>) -> Self::Output;
}

/// Tuning knobs for a broker instance.
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    /// How long a completed result stays servable.
    pub result_ttl: Duration,
    /// How often the background sweep reclaims expired results.
    pub sweep_interval: Duration,
    /// Work queue capacity; dispatchers back-pressure when it fills.
    pub queue_depth: usize,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            result_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(300),
            queue_depth: 1024,
        }
    }
}

impl From<&ResourceBrokerConfig> for BrokerOptions {
    fn from(config: &ResourceBrokerConfig) -> Self {
        Self {
            result_ttl: Duration::from_secs(config.result_ttl_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
            queue_depth: config.queue_depth,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BrokerError {
    #[error("worker pool requires at least one worker")]
    NoWorkers,
}

/// Per-identifier lifecycle state. Pending entries are replaced, never
/// time-evicted; Complete entries expire after the result TTL.
enum Entry<R> {
    Pending { waiters: Vec<oneshot::Sender<R>> },
    Complete { result: R, stored_at: Instant },
}

type EntryMap<R> = Arc<Mutex<HashMap<String, Entry<R>>>>;

/// Deduplicating front door for a fetcher. See the module docs.
pub struct ResourceBroker<F: FetchResource> {
    entries: EntryMap<F::Output>,
    work_tx: Mutex<Option<mpsc::Sender<WorkRequest<F::Metadata>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sweeper: JoinHandle<()>,
    options: BrokerOptions,
}

impl<F: FetchResource> fmt::Debug for ResourceBroker<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBroker")
            .field("result_ttl", &self.options.result_ttl)
            .field("sweep_interval", &self.options.sweep_interval)
            .field("queue_depth", &self.options.queue_depth)
            .finish()
    }
}

impl<F: FetchResource> ResourceBroker<F> {
    /// Start a broker with `worker_count` workers and default options.
    pub fn new(worker_count: usize, fetcher: F) -> Result<Self, BrokerError> {
        Self::with_options(worker_count, fetcher, BrokerOptions::default())
    }

    pub fn with_options(
        worker_count: usize,
        fetcher: F,
        options: BrokerOptions,
    ) -> Result<Self, BrokerError> {
        if worker_count == 0 {
            return Err(BrokerError::NoWorkers);
        }

        let entries: EntryMap<F::Output> =
            Arc::new(Mutex::new(HashMap::new()));
        let (work_tx, work_rx) = mpsc::channel(options.queue_depth.max(1));
        let work_rx = Arc::new(Mutex::new(work_rx));
        let fetcher = Arc::new(fetcher);

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&work_rx),
                Arc::clone(&fetcher),
                Arc::clone(&entries),
            )));
        }

        let sweeper = tokio::spawn(sweep_loop(
            Arc::clone(&entries),
            options.sweep_interval,
            options.result_ttl,
        ));

        Ok(Self {
            entries,
            work_tx: Mutex::new(Some(work_tx)),
            workers: Mutex::new(handles),
            sweeper,
            options,
        })
    }

    /// Resolve `identifier`, computing it at most once concurrently.
    ///
    /// Always returns a receiver, whether the result was cached, already in
    /// flight, or freshly dispatched; the caller awaits it either way. After
    /// [`close`](Self::close), receivers resolve as channel errors.
    pub async fn resolve(
        &self,
        identifier: impl Into<String>,
        metadata: F::Metadata,
    ) -> oneshot::Receiver<F::Output> {
        let identifier = identifier.into();
        let (tx, rx) = oneshot::channel();

        // Lookup and waiter registration happen under one lock, so two
        // callers can never both observe "not found" for the same key.
        {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(&identifier) {
                Some(Entry::Complete { result, stored_at })
                    if stored_at.elapsed() < self.options.result_ttl =>
                {
                    debug!(identifier = %identifier, "resource cache hit");
                    let _ = tx.send(result.clone());
                    return rx;
                }
                Some(Entry::Pending { waiters }) => {
                    waiters.push(tx);
                    debug!(
                        identifier = %identifier,
                        waiters = waiters.len(),
                        "joined in-flight resource"
                    );
                    return rx;
                }
                // Miss, or a completed result past its TTL: this caller
                // becomes the leader.
                _ => {}
            }
            entries.insert(
                identifier.clone(),
                Entry::Pending { waiters: vec![tx] },
            );
        }

        let sender = self.work_tx.lock().await.clone();
        let request = WorkRequest {
            identifier: identifier.clone(),
            metadata,
        };
        let sent = match sender {
            Some(sender) => sender.send(request).await.is_ok(),
            None => false,
        };
        if sent {
            debug!(identifier = %identifier, "dispatched resource work");
        } else {
            // Pool closed: drop the pending entry so the key is not
            // wedged; every registered waiter observes a channel error.
            warn!(identifier = %identifier, "resource pool closed, dropping request");
            let mut entries = self.entries.lock().await;
            entries.remove(&identifier);
        }

        rx
    }

    /// Shut down the pool. Work already queued is drained; requests whose
    /// work never ran leave their receivers unresolved (callers see a
    /// channel error), which is the documented at-shutdown contract.
    pub async fn close(&self) {
        self.work_tx.lock().await.take();

        let handles: Vec<_> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }

        self.sweeper.abort();
    }

    #[cfg(test)]
    pub(crate) async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl<F: FetchResource> Drop for ResourceBroker<F> {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

async fn worker_loop<F: FetchResource>(
    worker_id: usize,
    work_rx: Arc<Mutex<mpsc::Receiver<WorkRequest<F::Metadata>>>>,
    fetcher: Arc<F>,
    entries: EntryMap<F::Output>,
) {
    loop {
        // Hold the receiver lock only while waiting for the next item;
        // the fetch itself runs unlocked so workers overlap.
        let request = {
            let mut rx = work_rx.lock().await;
            rx.recv().await
        };
        let Some(request) = request else {
            debug!(worker = worker_id, "resource worker shutting down");
            break;
        };

        let identifier = request.identifier.clone();
        let result = fetcher.fetch(request).await;

        let waiters = {
            let mut entries = entries.lock().await;
            match entries.insert(
                identifier.clone(),
                Entry::Complete {
                    result: result.clone(),
                    stored_at: Instant::now(),
                },
            ) {
                Some(Entry::Pending { waiters }) => waiters,
                _ => Vec::new(),
            }
        };

        debug!(
            identifier = %identifier,
            waiters = waiters.len(),
            "resource complete"
        );
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

async fn sweep_loop<R: Send + 'static>(
    entries: EntryMap<R>,
    interval: Duration,
    ttl: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let mut entries = entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| match entry {
            Entry::Complete { stored_at, .. } => stored_at.elapsed() < ttl,
            Entry::Pending { .. } => true,
        });
        let swept = before - entries.len();
        if swept > 0 {
            debug!(swept, "reclaimed expired resource results");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts invocations and tracks peak concurrency.
    struct CountingFetcher {
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    impl CountingFetcher {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                delay,
            }
        }
    }

    #[async_trait]
    impl FetchResource for Arc<CountingFetcher> {
        type Metadata = ();
        type Output = String;

        async fn fetch(&self, request: WorkRequest<()>) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            format!("result-{}", request.identifier)
        }
    }

    fn options(ttl_ms: u64, sweep_ms: u64) -> BrokerOptions {
        BrokerOptions {
            result_ttl: Duration::from_millis(ttl_ms),
            sweep_interval: Duration::from_millis(sweep_ms),
            queue_depth: 64,
        }
    }

    #[tokio::test]
    async fn concurrent_resolves_coalesce_to_one_fetch() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::from_millis(50)));
        let broker = ResourceBroker::new(4, Arc::clone(&fetcher)).unwrap();

        let mut receivers = Vec::new();
        for _ in 0..8 {
            receivers.push(broker.resolve("poster", ()).await);
        }

        let results = futures::future::join_all(receivers).await;
        for result in results {
            assert_eq!(result.unwrap(), "result-poster");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        broker.close().await;
    }

    #[tokio::test]
    async fn distinct_identifiers_fetch_independently() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::from_millis(5)));
        let broker = ResourceBroker::new(4, Arc::clone(&fetcher)).unwrap();

        let a = broker.resolve("a", ()).await.await.unwrap();
        let b = broker.resolve("b", ()).await.await.unwrap();

        assert_eq!(a, "result-a");
        assert_eq!(b, "result-b");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        broker.close().await;
    }

    #[tokio::test]
    async fn cached_result_is_served_without_refetch() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::from_millis(5)));
        let broker = ResourceBroker::new(2, Arc::clone(&fetcher)).unwrap();

        let first = broker.resolve("cover", ()).await.await.unwrap();
        let second = broker.resolve("cover", ()).await.await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        broker.close().await;
    }

    #[tokio::test]
    async fn expired_result_recomputes_exactly_once() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::from_millis(5)));
        let broker = ResourceBroker::with_options(
            2,
            Arc::clone(&fetcher),
            options(40, 10_000),
        )
        .unwrap();

        broker.resolve("banner", ()).await.await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        broker.resolve("banner", ()).await.await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

        broker.close().await;
    }

    #[tokio::test]
    async fn worker_pool_bounds_parallelism() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::from_millis(30)));
        let broker = ResourceBroker::new(1, Arc::clone(&fetcher)).unwrap();

        let receivers = vec![
            broker.resolve("x", ()).await,
            broker.resolve("y", ()).await,
            broker.resolve("z", ()).await,
        ];
        for rx in receivers {
            rx.await.unwrap();
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);

        broker.close().await;
    }

    #[tokio::test]
    async fn zero_workers_is_a_construction_error() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::ZERO));
        let err = ResourceBroker::new(0, fetcher).unwrap_err();
        assert_eq!(err, BrokerError::NoWorkers);
    }

    #[tokio::test]
    async fn resolve_after_close_yields_channel_error() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::ZERO));
        let broker = ResourceBroker::new(2, Arc::clone(&fetcher)).unwrap();

        broker.resolve("early", ()).await.await.unwrap();
        broker.close().await;

        let rx = broker.resolve("late", ()).await;
        assert!(rx.await.is_err());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sweep_reclaims_expired_entries() {
        let fetcher = Arc::new(CountingFetcher::new(Duration::ZERO));
        let broker = ResourceBroker::with_options(
            2,
            Arc::clone(&fetcher),
            options(10, 40),
        )
        .unwrap();

        broker.resolve("stale", ()).await.await.unwrap();
        assert_eq!(broker.entry_count().await, 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(broker.entry_count().await, 0);

        broker.close().await;
    }
}
