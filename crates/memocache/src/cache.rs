use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::entry::{Entry, Settled};
use crate::error::CreationError;
use crate::lru::{Handle, LruList};

/// A successfully created value, as returned by a [`Creator`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Created<V> {
    /// The created value.
    pub value: V,
    /// When the value expires. `None` means it can be cached forever.
    ///
    /// This is not "do not cache": the value is still subject to the cache's `max_age` and to
    /// capacity eviction.
    pub deadline: Option<Instant>,
}

impl<V> Created<V> {
    /// A value without its own deadline.
    pub fn new(value: V) -> Self {
        Self {
            value,
            deadline: None,
        }
    }

    /// A value that expires at `deadline`.
    pub fn until(value: V, deadline: Instant) -> Self {
        Self {
            value,
            deadline: Some(deadline),
        }
    }

    /// A value that expires `ttl` from now.
    pub fn expires_in(value: V, ttl: Duration) -> Self {
        Self {
            value,
            deadline: Instant::now().checked_add(ttl),
        }
    }
}

/// Creates the values of a [`Cache`] on demand.
///
/// The creator is invoked when [`Cache::get`] is called for a key that is not in the cache. It is
/// never invoked while the cache is locked, so creators for distinct keys run in parallel. A
/// creator must not call back into the cache it belongs to.
///
/// Any `Fn(&K) -> Result<Created<V>, E>` closure is a creator.
pub trait Creator<K> {
    /// The created value.
    type Value;
    /// The error of a failed creation.
    type Error;

    /// Creates the value for `key`.
    fn create(&self, key: &K) -> Result<Created<Self::Value>, Self::Error>;
}

impl<K, V, E, F> Creator<K> for F
where
    F: Fn(&K) -> Result<Created<V>, E>,
{
    type Value = V;
    type Error = E;

    fn create(&self, key: &K) -> Result<Created<V>, E> {
        self(key)
    }
}

/// Called for every created value that leaves the cache.
///
/// The evictor runs synchronously while the cache is locked. It must return quickly, and it must
/// not call back into the cache. Move any slow cleanup (closing files, network calls) to another
/// thread.
pub type Evictor<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

/// The result of a successful [`Cache::get`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lookup<V> {
    /// The value for the requested key.
    pub value: V,
    /// `false` if this call ran the creator itself, `true` if the value was already cached or
    /// created by a concurrent call.
    pub cached: bool,
    /// When the value expires. `None` means it never does.
    pub deadline: Option<Instant>,
}

/// Why an entry is leaving the cache.
#[derive(Clone, Copy, Debug)]
enum Removal {
    /// Least recently used entry of a full cache.
    Evicted,
    /// The deadline of the entry has passed.
    Expired,
    /// The creator failed or panicked.
    Failed,
}

struct Slot<K, V, E> {
    key: K,
    entry: Arc<Entry<V, E>>,
}

/// The structural part of the cache, guarded by a single lock.
struct Index<K, V, E> {
    slots: HashMap<K, Handle>,
    order: LruList<Slot<K, V, E>>,
}

/// What a lookup found in the index.
enum Claim<V, E> {
    /// A live value, ready to be returned.
    Hit(Lookup<V>),
    /// Another call is creating the value.
    Wait(Arc<Entry<V, E>>),
    /// This call inserted a pending entry and has to create the value.
    Create(Handle, Arc<Entry<V, E>>),
}

type CreatorEntry<K, C> = Entry<<C as Creator<K>>::Value, <C as Creator<K>>::Error>;

/// An in-memory cache that creates missing values on demand.
///
/// The purpose of this cache is request coalescing: when many threads request the same missing
/// key concurrently, the [`Creator`] runs exactly once and all of them observe its outcome.
/// Requests for different keys never wait on each other's creation.
///
/// The cache holds at most [`max_items`](CacheConfig::max_items) entries and evicts the least
/// recently used one when a new key is inserted into a full cache. Values expire at the deadline
/// returned by the creator, or [`max_age`](CacheConfig::max_age) after their creation, whichever is
/// sooner. Expired values are dropped lazily by [`get`](Self::get), or eagerly by
/// [`check_and_expire`](Self::check_and_expire).
///
/// # Locking
///
/// A single structural lock guards the key index and the recency order. It is only held for
/// bookkeeping, never while the creator runs. Every entry has its own lock and condition variable,
/// on which concurrent callers wait for an in-flight creation.
///
/// # Eviction of pending entries
///
/// Eviction is purely based on recency. If the least recently used entry is still being created,
/// it is detached anyway. Its creation is not cancelled: callers already waiting on it still get
/// its outcome, but the value is not cached.
pub struct Cache<K, C: Creator<K>> {
    config: CacheConfig,
    creator: C,
    evictor: Option<Evictor<K, C::Value>>,
    index: Mutex<Index<K, C::Value, C::Error>>,
}

impl<K, C> Cache<K, C>
where
    K: Eq + Hash + Clone + fmt::Debug,
    C: Creator<K>,
    C::Value: Clone,
    C::Error: Error + 'static,
{
    /// Creates a cache holding up to [`DEFAULT_MAX_ITEMS`](crate::DEFAULT_MAX_ITEMS) entries
    /// without a maximum age.
    pub fn new(creator: C) -> Self {
        Self::with_config(CacheConfig::default(), creator)
    }

    /// Creates a cache with the given configuration.
    pub fn with_config(config: CacheConfig, creator: C) -> Self {
        Self {
            config,
            creator,
            evictor: None,
            index: Mutex::new(Index {
                slots: HashMap::new(),
                order: LruList::new(),
            }),
        }
    }

    /// Installs a callback that is invoked for every created value leaving the cache.
    ///
    /// See [`Evictor`] for the constraints on the callback.
    pub fn with_evictor<F>(mut self, evictor: F) -> Self
    where
        F: Fn(&K, &C::Value) + Send + Sync + 'static,
    {
        self.evictor = Some(Box::new(evictor));
        self
    }

    /// Gets the value for `key`, creating it if it is not cached.
    ///
    /// If another call is already creating the value for `key`, this blocks until that creation
    /// finishes and shares its outcome. There is no timeout on this wait.
    ///
    /// A failed creation is returned as [`CreationError`] and not cached, so the next call for the
    /// same key tries again.
    pub fn get(&self, key: K) -> Result<Lookup<C::Value>, CreationError<K, C::Error>> {
        metric!(counter("caches.access") += 1, "cache" => self.name());

        loop {
            match self.claim(&key) {
                Claim::Hit(lookup) => {
                    metric!(counter("caches.memory.hit") += 1, "cache" => self.name());
                    return Ok(lookup);
                }
                Claim::Wait(entry) => {
                    metric!(counter("caches.memory.coalesced") += 1, "cache" => self.name());
                    tracing::trace!(cache = self.name(), ?key, "waiting for in-flight creation");

                    match entry.wait() {
                        Settled::Created { value, deadline } => {
                            return Ok(Lookup {
                                value,
                                cached: true,
                                deadline,
                            });
                        }
                        Settled::Failed(error) => return Err(CreationError::new(key, error, true)),
                        // The creator panicked, one of the waiters takes over.
                        Settled::Abandoned => continue,
                    }
                }
                Claim::Create(handle, entry) => return self.create(key, handle, &entry),
            }
        }
    }

    /// Removes all entries whose deadline has passed.
    ///
    /// Entries that are still being created and entries without a deadline are left alone.
    /// Capacity eviction works without ever calling this. If values have deadlines, either from
    /// the creator or from `max_age`, call this periodically to release expired values that are
    /// not looked up anymore, or use an [`ExpirationSweeper`](crate::ExpirationSweeper).
    ///
    /// Returns the number of removed entries.
    pub fn check_and_expire(&self) -> usize {
        let mut index = self.lock_index();
        let now = Instant::now();

        let expired: Vec<Handle> = index
            .order
            .iter()
            .filter(|(_, slot)| {
                let state = slot.entry.lock();
                !state.removed
                    && state
                        .created()
                        .is_some_and(|(_, deadline)| is_expired(deadline, now))
            })
            .map(|(handle, _)| handle)
            .collect();

        for &handle in &expired {
            self.remove(&mut index, handle, Removal::Expired);
        }

        let live = index.order.len();
        drop(index);

        metric!(gauge("caches.memory.entries") = live as u64, "cache" => self.name());
        if !expired.is_empty() {
            tracing::debug!(
                cache = self.name(),
                expired = expired.len(),
                live,
                "removed expired entries"
            );
        }
        expired.len()
    }
}

impl<K, C: Creator<K>> Cache<K, C> {
    /// The name of this cache, as configured.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The configuration this cache was created with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The number of live entries, including the ones still being created.
    pub fn len(&self) -> usize {
        self.lock_index().order.len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.lock_index().order.is_empty()
    }

    fn lock_index(&self) -> MutexGuard<'_, Index<K, C::Value, C::Error>> {
        self.index.lock().unwrap()
    }
}

impl<K, C> Cache<K, C>
where
    K: Eq + Hash + Clone + fmt::Debug,
    C: Creator<K>,
    C::Value: Clone,
    C::Error: Error + 'static,
{
    /// Looks up `key` in the index, inserting a pending entry if there is no live one.
    fn claim(&self, key: &K) -> Claim<C::Value, C::Error> {
        let mut index = self.lock_index();

        let found = index
            .slots
            .get(key)
            .and_then(|&handle| Some((handle, Arc::clone(&index.order.get(handle)?.entry))));
        if let Some((handle, entry)) = found {
            let state = entry.lock();
            match state.created() {
                None if state.outcome.is_none() => {
                    drop(state);
                    return Claim::Wait(entry);
                }
                Some((value, deadline)) if !is_expired(deadline, Instant::now()) => {
                    let lookup = Lookup {
                        value: value.clone(),
                        cached: true,
                        deadline,
                    };
                    drop(state);
                    index.order.move_to_front(handle);
                    tracing::trace!(cache = self.name(), ?key, "cache hit");
                    return Claim::Hit(lookup);
                }
                _ => {
                    drop(state);
                    self.remove(&mut index, handle, Removal::Expired);
                }
            }
        }

        let entry = Arc::new(Entry::pending());
        let handle = index.order.push_front(Slot {
            key: key.clone(),
            entry: Arc::clone(&entry),
        });
        index.slots.insert(key.clone(), handle);

        if let Some(capacity) = self.config.capacity() {
            if index.order.len() > capacity {
                if let Some(victim) = index.order.back() {
                    self.remove(&mut index, victim, Removal::Evicted);
                }
            }
        }

        Claim::Create(handle, entry)
    }

    /// Runs the creator for a freshly claimed entry and publishes its outcome.
    fn create(
        &self,
        key: K,
        handle: Handle,
        entry: &CreatorEntry<K, C>,
    ) -> Result<Lookup<C::Value>, CreationError<K, C::Error>> {
        metric!(counter("caches.computation") += 1, "cache" => self.name());
        tracing::debug!(cache = self.name(), ?key, "creating value");

        let in_flight = InFlight {
            cache: self,
            handle,
            entry,
            armed: true,
        };
        let start = Instant::now();
        let created = self.creator.create(&key);
        in_flight.disarm();
        metric!(timer("caches.computation.duration") = start.elapsed(), "cache" => self.name());

        let mut index = self.lock_index();
        match created {
            Ok(Created { value, deadline }) => {
                let deadline = self.effective_deadline(deadline, Instant::now());
                let removed = entry.lock().removed;
                if removed {
                    tracing::debug!(
                        cache = self.name(),
                        ?key,
                        "created value for an evicted entry, not caching it"
                    );
                } else {
                    index.order.move_to_front(handle);
                }
                entry.settle(Settled::Created {
                    value: value.clone(),
                    deadline,
                });
                drop(index);

                Ok(Lookup {
                    value,
                    cached: false,
                    deadline,
                })
            }
            Err(error) => {
                metric!(counter("caches.computation.failed") += 1, "cache" => self.name());

                let error = Arc::new(error);
                let removed = entry.lock().removed;
                if !removed {
                    self.remove(&mut index, handle, Removal::Failed);
                }
                entry.settle(Settled::Failed(Arc::clone(&error)));
                drop(index);

                tracing::debug!(cache = self.name(), ?key, %error, "failed to create value");
                Err(CreationError::new(key, error, false))
            }
        }
    }

    /// The earlier of the creator's deadline and `now + max_age`.
    fn effective_deadline(&self, deadline: Option<Instant>, now: Instant) -> Option<Instant> {
        let max_age = self
            .config
            .effective_max_age()
            .and_then(|max_age| now.checked_add(max_age));
        match (deadline, max_age) {
            (Some(deadline), Some(max_age)) => Some(deadline.min(max_age)),
            (deadline, max_age) => deadline.or(max_age),
        }
    }
}

impl<K, C> Cache<K, C>
where
    K: Eq + Hash + fmt::Debug,
    C: Creator<K>,
{
    /// Unlinks the slot behind `handle` from the index and the recency order.
    ///
    /// The evictor is invoked if the entry holds a created value.
    fn remove(&self, index: &mut Index<K, C::Value, C::Error>, handle: Handle, reason: Removal) {
        let Some(Slot { key, entry }) = index.order.remove(handle) else {
            return;
        };
        index.slots.remove(&key);

        let mut state = entry.lock();
        state.removed = true;

        match reason {
            Removal::Evicted => {
                metric!(counter("caches.eviction") += 1, "cache" => self.name());
                tracing::debug!(
                    cache = self.name(),
                    ?key,
                    pending = state.outcome.is_none(),
                    "evicted least recently used entry"
                );
            }
            Removal::Expired => {
                metric!(counter("caches.expired") += 1, "cache" => self.name());
                tracing::debug!(cache = self.name(), ?key, "removed expired entry");
            }
            Removal::Failed => {}
        }

        if let (Some(evictor), Some((value, _))) = (&self.evictor, state.created()) {
            evictor(&key, value);
        }
    }
}

impl<K, C: Creator<K>> fmt::Debug for Cache<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.index.try_lock().map(|index| index.order.len()).ok();
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("entries", &entries)
            .field("evictor", &self.evictor.is_some())
            .finish()
    }
}

/// Fails the in-flight creation of an entry if the creator unwinds.
///
/// Without this, callers waiting on the entry would block forever.
struct InFlight<'a, K, C>
where
    K: Eq + Hash + fmt::Debug,
    C: Creator<K>,
{
    cache: &'a Cache<K, C>,
    handle: Handle,
    entry: &'a CreatorEntry<K, C>,
    armed: bool,
}

impl<K, C> InFlight<'_, K, C>
where
    K: Eq + Hash + fmt::Debug,
    C: Creator<K>,
{
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<K, C> Drop for InFlight<'_, K, C>
where
    K: Eq + Hash + fmt::Debug,
    C: Creator<K>,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(cache = self.cache.name(), "creator panicked, abandoning entry");

        // Never panic while unwinding.
        let mut index = self
            .cache
            .index
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let removed = self.entry.lock().removed;
        if !removed {
            self.cache.remove(&mut index, self.handle, Removal::Failed);
        }
        self.entry.settle(Settled::Abandoned);
    }
}

fn is_expired(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|deadline| deadline <= now)
}
