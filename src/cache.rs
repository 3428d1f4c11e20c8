//! Caching primitives behind every expensive derived result in the pipeline.
//!
//! [`DebouncedLazy`] is a compute-once single value with invalidation and
//! debounced recomputation; it is the single coalescing point for file-system
//! churn (watcher handlers call [`DebouncedLazy::refresh`] and nothing else).
//! [`PopulatedCache`] is a keyed map populated up-front by one async factory
//! call, used where a whole family of values is derived in one pass (the
//! highlighter's documentation-id fragments).

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::StrataError;

/// Async factory producing the cached value.
pub type Factory<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, StrataError>> + Send + Sync>;

/// Async factory producing all `(key, value)` pairs of a [`PopulatedCache`].
pub type PopulateFactory<K, V> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<(K, V)>, StrataError>> + Send + Sync>;

/// Default quiescence window before a scheduled recomputation runs.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// A thread-safe lazily computed value with debounced refresh.
///
/// - `value()` computes on first access; concurrent callers observe a single
///   computation.
/// - `refresh()` is non-blocking and schedules a recomputation after the
///   debounce window of quiescence; bursts coalesce to one run.
/// - While a recomputation is in flight, `value()` waits for it and returns
///   the most recently completed result.
/// - A factory error is handed to every waiting caller and replaces the
///   previous value; the next completed computation replaces it in turn.
pub struct DebouncedLazy<V> {
    inner: Arc<LazyInner<V>>,
}

impl<V> Clone for DebouncedLazy<V> {
    fn clone(&self) -> Self {
        DebouncedLazy {
            inner: self.inner.clone(),
        }
    }
}

struct LazyInner<V> {
    factory: Factory<V>,
    debounce: Duration,
    runtime: tokio::runtime::Handle,
    /// Most recently completed computation, success or failure.
    state: AsyncMutex<Option<Result<V, StrataError>>>,
    /// Serializes factory runs; waiting on it is how late callers join an
    /// in-flight computation.
    compute: AsyncMutex<()>,
    computing: AtomicBool,
    refresh_gen: AtomicU64,
    disposed: AtomicBool,
}

impl<V: Clone + Send + Sync + 'static> DebouncedLazy<V> {
    /// Must be called from within a tokio runtime; `refresh()` schedules its
    /// debounce timers onto the captured handle so it stays callable from
    /// watcher threads.
    pub fn new(factory: Factory<V>) -> Self {
        Self::with_debounce(factory, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(factory: Factory<V>, debounce: Duration) -> Self {
        DebouncedLazy {
            inner: Arc::new(LazyInner {
                factory,
                debounce,
                runtime: tokio::runtime::Handle::current(),
                state: AsyncMutex::new(None),
                compute: AsyncMutex::new(()),
                computing: AtomicBool::new(false),
                refresh_gen: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Current value, computing it on first access and after invalidation.
    pub async fn value(&self) -> Result<V, StrataError> {
        if !self.inner.computing.load(Ordering::SeqCst) {
            if let Some(res) = self.inner.current().await {
                return res;
            }
        }
        self.inner.compute_or_join().await
    }

    /// Schedule a recomputation to run once the debounce window has elapsed
    /// without another `refresh()`. Never blocks; safe to call from watcher
    /// callbacks.
    pub fn refresh(&self) {
        if self.inner.disposed.load(Ordering::SeqCst) {
            return;
        }
        let generation = self.inner.refresh_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        let _ = self.inner.runtime.spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            // Superseded by a later refresh; that one owns the recompute.
            if inner.refresh_gen.load(Ordering::SeqCst) != generation {
                return;
            }
            if inner.disposed.load(Ordering::SeqCst) {
                return;
            }
            inner.recompute().await;
        });
    }

    /// Cancel pending refreshes and release the value. Idempotent.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.refresh_gen.fetch_add(1, Ordering::SeqCst);
    }
}

impl<V: Clone + Send + Sync + 'static> LazyInner<V> {
    async fn current(&self) -> Option<Result<V, StrataError>> {
        self.state.lock().await.clone()
    }

    async fn compute_or_join(&self) -> Result<V, StrataError> {
        let _permit = self.compute.lock().await;
        // A computation may have completed while we waited for the permit.
        if let Some(res) = self.current().await {
            return res;
        }
        if self.disposed.load(Ordering::SeqCst) {
            return Err(StrataError::OperationCancelled);
        }
        self.computing.store(true, Ordering::SeqCst);
        let res = (self.factory)().await;
        *self.state.lock().await = Some(res.clone());
        self.computing.store(false, Ordering::SeqCst);
        res
    }

    async fn recompute(&self) {
        let _permit = self.compute.lock().await;
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        self.computing.store(true, Ordering::SeqCst);
        let res = (self.factory)().await;
        *self.state.lock().await = Some(res);
        self.computing.store(false, Ordering::SeqCst);
    }
}

/// A keyed cache populated by a single async factory returning all pairs.
///
/// At most one population runs at a time; accesses during population await
/// its result. After a successful population reads are snapshot clones of a
/// shared map. A failed population leaves the cache uninitialized so the next
/// access retries.
pub struct PopulatedCache<K, V> {
    factory: PopulateFactory<K, V>,
    map: RwLock<Option<Arc<HashMap<K, V>>>>,
    populate: AsyncMutex<()>,
}

impl<K, V> PopulatedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(factory: PopulateFactory<K, V>) -> Self {
        PopulatedCache {
            factory,
            map: RwLock::new(None),
            populate: AsyncMutex::new(()),
        }
    }

    pub async fn get(&self, key: &K) -> Result<Option<V>, StrataError> {
        let map = self.ensure_populated().await?;
        Ok(map.get(key).cloned())
    }

    pub async fn values(&self) -> Result<Vec<V>, StrataError> {
        let map = self.ensure_populated().await?;
        Ok(map.values().cloned().collect())
    }

    /// Drop the populated map; the next access re-populates.
    pub fn invalidate(&self) {
        *self.map.write() = None;
    }

    async fn ensure_populated(&self) -> Result<Arc<HashMap<K, V>>, StrataError> {
        if let Some(map) = self.map.read().clone() {
            return Ok(map);
        }
        let _permit = self.populate.lock().await;
        if let Some(map) = self.map.read().clone() {
            return Ok(map);
        }
        let pairs = (self.factory)().await?;
        let map = Arc::new(pairs.into_iter().collect::<HashMap<_, _>>());
        *self.map.write() = Some(map.clone());
        Ok(map)
    }
}
