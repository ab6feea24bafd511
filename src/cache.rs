//! Generic fetch / cache / invalidate layer used by every data-consuming view.
//!
//! Entries are addressed by [`CacheKey`] (resource name, acting identity, extra
//! params). At most one fetch per key is in flight: later readers subscribe to the
//! running fetch's broadcast channel instead of issuing a second network call.
//!
//! Fetches run on their own task, so a consumer that goes away mid-flight only
//! drops its receiver; the other waiters still get the result. Invalidation and
//! identity eviction detach an in-flight fetch by bumping the slot epoch, which
//! keeps a late result from being written back over the eviction. A fetch
//! whose future panics still settles its key as `Error`.
//!
//! Entries fetched with a credential are tagged `protected` so sign-out can drop
//! every one of them, including admin-wide keys that carry no identity.

use std::{
    any::Any,
    collections::{BTreeMap, HashMap},
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// CacheKey
///
/// `(resource name, scope params)`. User-scoped resources carry the acting
/// identity so one user's cart never answers for another's.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub name: String,
    pub identity: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl CacheKey {
    /// Key for a resource shared by everyone (menu, reviews).
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: None,
            params: BTreeMap::new(),
        }
    }

    /// Key for a resource owned by one identity (cart, orders, reservations).
    pub fn user(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: Some(email.into()),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn is_scoped_to(&self, email: &str) -> bool {
        self.identity.as_deref() == Some(email)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(identity) = &self.identity {
            write!(f, "@{identity}")?;
        }
        for (k, v) in &self.params {
            write!(f, ";{k}={v}")?;
        }
        Ok(())
    }
}

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Staleness
///
/// How long a ready entry stays authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Staleness {
    /// Fetched once per process lifetime unless explicitly invalidated.
    Indefinite,
    /// Refetched on every mount of a consuming view.
    #[default]
    RefetchOnMount,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceOptions {
    pub staleness: Staleness,
    /// Fetched with the session credential; evicted on every sign-out.
    pub protected: bool,
}

impl ResourceOptions {
    pub fn indefinite() -> Self {
        Self {
            staleness: Staleness::Indefinite,
            protected: false,
        }
    }

    pub fn refetch_on_mount() -> Self {
        Self {
            staleness: Staleness::RefetchOnMount,
            protected: false,
        }
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

/// CacheEntry
///
/// Read-only view of one key. `data` may still hold the previous value while
/// `status` is `Loading` or `Error`.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: CacheKey,
    pub data: Option<Arc<T>>,
    pub status: Status,
    pub error: Option<ClientError>,
}

impl<T> CacheEntry<T> {
    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn is_ready(&self) -> bool {
        self.status == Status::Ready
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

/// Boxed fetch future, the unit of work a fetcher produces.
pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

type Fetcher<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;
type Stored = Arc<dyn Any + Send + Sync>;
type Outcome = std::result::Result<Stored, ClientError>;

struct Slot {
    data: Option<Stored>,
    status: Status,
    error: Option<ClientError>,
    epoch: u64,
    protected: bool,
    // Weak so a fetch task that dies closes the channel for its waiters.
    in_flight: Option<broadcast::WeakSender<Outcome>>,
}

impl Slot {
    fn idle() -> Self {
        Self {
            data: None,
            status: Status::Idle,
            error: None,
            epoch: 0,
            protected: false,
            in_flight: None,
        }
    }
}

enum Begin {
    Hit(Stored),
    Wait(broadcast::Receiver<Outcome>),
    Start {
        sender: broadcast::Sender<Outcome>,
        epoch: u64,
    },
}

#[derive(Default)]
struct Inner {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    next_epoch: AtomicU64,
}

/// ResourceCache
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone, Default)]
pub struct ResourceCache {
    inner: Arc<Inner>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.inner.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Binds a key to its fetcher for a consuming view.
    pub fn use_resource<T, F, Fut>(
        &self,
        key: CacheKey,
        fetcher: F,
        options: ResourceOptions,
    ) -> ResourceHandle<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || Box::pin(fetcher()) as FetchFuture<T>);
        ResourceHandle {
            cache: self.clone(),
            key,
            fetcher,
            options,
        }
    }

    /// One-shot read-through honouring `options.staleness`.
    pub async fn read<T, F, Fut>(
        &self,
        key: &CacheKey,
        fetcher: F,
        options: ResourceOptions,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let force = options.staleness == Staleness::RefetchOnMount;
        self.fetch_with(key, force, options.protected, move || {
            Box::pin(fetcher()) as FetchFuture<T>
        })
        .await
    }

    async fn fetch_with<T, F>(
        &self,
        key: &CacheKey,
        force: bool,
        protected: bool,
        make: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> FetchFuture<T>,
    {
        let outcome = match self.begin(key, force, protected) {
            Begin::Hit(stored) => {
                debug!(key = %key, "cache hit");
                Ok(stored)
            }
            Begin::Wait(mut rx) => {
                debug!(key = %key, "joining in-flight fetch");
                receive(&mut rx).await
            }
            Begin::Start { sender, epoch } => {
                debug!(key = %key, epoch, "cache miss, fetching");
                let mut rx = sender.subscribe();
                let fut = make();
                let cache = self.clone();
                let task_key = key.clone();
                tokio::spawn(async move {
                    // A panicking fetcher surfaces here as a join error.
                    let outcome = match tokio::spawn(fut).await {
                        Ok(result) => result.map(|value| Arc::new(value) as Stored),
                        Err(e) => {
                            warn!(key = %task_key, error = %e, "fetch task failed");
                            Err(ClientError::Transport(format!("fetch failed: {e}")))
                        }
                    };
                    cache.complete(&task_key, epoch, &outcome);
                    // Receivers may all be gone; the result is simply discarded.
                    let _ = sender.send(outcome);
                });
                receive(&mut rx).await
            }
        };

        outcome.and_then(|stored| downcast(key, stored))
    }

    fn begin(&self, key: &CacheKey, force: bool, protected: bool) -> Begin {
        let mut slots = self.slots();
        let slot = slots.entry(key.clone()).or_insert_with(Slot::idle);
        slot.protected |= protected;

        if let Some(sender) = slot.in_flight.as_ref().and_then(|weak| weak.upgrade()) {
            return Begin::Wait(sender.subscribe());
        }
        if !force && slot.status == Status::Ready {
            if let Some(data) = &slot.data {
                return Begin::Hit(data.clone());
            }
        }

        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, _) = broadcast::channel(1);
        slot.epoch = epoch;
        slot.status = Status::Loading;
        slot.error = None;
        slot.in_flight = Some(sender.downgrade());
        Begin::Start { sender, epoch }
    }

    fn complete(&self, key: &CacheKey, epoch: u64, outcome: &Outcome) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(key) else {
            debug!(key = %key, "discarding result for evicted entry");
            return;
        };
        if slot.epoch != epoch {
            debug!(key = %key, epoch, current = slot.epoch, "discarding detached fetch result");
            return;
        }
        slot.in_flight = None;
        match outcome {
            Ok(data) => {
                slot.data = Some(data.clone());
                slot.status = Status::Ready;
                slot.error = None;
            }
            Err(e) => {
                slot.status = Status::Error;
                slot.error = Some(e.clone());
            }
        }
    }

    /// Snapshot of one key. Unknown keys read as `Idle`.
    pub fn entry<T: Send + Sync + 'static>(&self, key: &CacheKey) -> CacheEntry<T> {
        let slots = self.slots();
        match slots.get(key) {
            Some(slot) => CacheEntry {
                key: key.clone(),
                data: slot
                    .data
                    .clone()
                    .and_then(|stored| stored.downcast::<T>().ok()),
                status: slot.status,
                error: slot.error.clone(),
            },
            None => CacheEntry {
                key: key.clone(),
                data: None,
                status: Status::Idle,
                error: None,
            },
        }
    }

    /// Drops one key. A fetch still in flight for it is detached: its waiters get
    /// their answer but the cache does not keep it.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.slots().remove(key).is_some();
        if removed {
            debug!(key = %key, "invalidated");
        }
        removed
    }

    /// Drops every scope of a resource, e.g. all cached carts.
    pub fn invalidate_resource(&self, name: &str) -> usize {
        self.evict_where(|key| key.name == name)
    }

    /// Evicts every entry scoped to the departing identity.
    pub fn evict_identity(&self, email: &str) -> usize {
        let evicted = self.evict_where(|key| key.is_scoped_to(email));
        debug!(identity = email, evicted, "evicted user-scoped entries");
        evicted
    }

    /// Evicts every entry fetched with a credential, whatever its scope.
    pub fn evict_protected(&self) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|_, slot| !slot.protected);
        let evicted = before - slots.len();
        debug!(evicted, "evicted protected entries");
        evicted
    }

    fn evict_where<P: Fn(&CacheKey) -> bool>(&self, predicate: P) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|key, _| !predicate(key));
        before - slots.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| {
                slot.in_flight
                    .as_ref()
                    .is_some_and(|weak| weak.upgrade().is_some())
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn receive(rx: &mut broadcast::Receiver<Outcome>) -> Outcome {
    rx.recv()
        .await
        .unwrap_or_else(|_| Err(ClientError::Transport("fetch abandoned".to_string())))
}

fn downcast<T: Send + Sync + 'static>(key: &CacheKey, stored: Stored) -> Result<Arc<T>> {
    stored
        .downcast::<T>()
        .map_err(|_| ClientError::Decode(format!("cache entry {key} holds a different type")))
}

/// ResourceHandle
///
/// What a consuming view holds: the key, its fetcher, and the staleness policy.
/// Dropping a handle (or the future of one of its calls) never cancels the shared
/// fetch, it only stops this view from seeing the result.
pub struct ResourceHandle<T> {
    cache: ResourceCache,
    key: CacheKey,
    fetcher: Fetcher<T>,
    options: ResourceOptions,
}

impl<T: Send + Sync + 'static> ResourceHandle<T> {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Mount: serves a cached value for `Indefinite` resources, refetches for
    /// `RefetchOnMount` ones. Joins an in-flight fetch either way.
    pub async fn load(&self) -> Result<Arc<T>> {
        let force = self.options.staleness == Staleness::RefetchOnMount;
        let fetcher = self.fetcher.clone();
        self.cache
            .fetch_with(&self.key, force, self.options.protected, move || fetcher())
            .await
    }

    /// Explicit refetch regardless of staleness policy.
    pub async fn refetch(&self) -> Result<Arc<T>> {
        let fetcher = self.fetcher.clone();
        self.cache
            .fetch_with(&self.key, true, self.options.protected, move || fetcher())
            .await
    }

    pub fn entry(&self) -> CacheEntry<T> {
        self.cache.entry(&self.key)
    }

    pub fn invalidate(&self) -> bool {
        self.cache.invalidate(&self.key)
    }

    /// Runs a write against this resource, then refetches the key. Any read that
    /// was in flight before the write is detached first, so the value observed
    /// afterwards is never the pre-write one.
    ///
    /// Returns the outcome of the write alone. A failed refetch leaves the key in
    /// `Error` for the view to show; it never turns a committed write into an `Err`.
    pub async fn mutate<W, Fut>(&self, write: Fut) -> Result<W>
    where
        Fut: Future<Output = Result<W>>,
    {
        let written = write.await?;
        self.refresh_after_write().await;
        Ok(written)
    }

    /// Drops the key and refetches it, recording a failure on the entry.
    pub async fn refresh_after_write(&self) {
        self.cache.invalidate(&self.key);
        if let Err(e) = self.refetch().await {
            warn!(key = %self.key, error = %e, "refetch after write failed");
        }
    }
}
