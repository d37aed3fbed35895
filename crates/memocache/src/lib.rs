//! # memocache
//!
//! An in-memory cache for values that are expensive to create, and whose creation might fail.
//!
//! The cache is constructed with a [`Creator`], which produces the value for a missing key. The
//! central guarantee is request coalescing (also known as single-flight): when many threads call
//! [`Cache::get`] for the same missing key at the same time, the creator runs exactly once, and all
//! of them observe the same value or the same [`CreationError`]. Threads requesting different keys
//! never wait on each other's creation.
//!
//! ## Capacity and Expiration
//!
//! The cache holds at most [`CacheConfig::max_items`] entries (`0` means unlimited). Inserting a
//! new key into a full cache evicts the least recently used entry, where both creating and reading
//! a value count as a use.
//!
//! Values can expire in two ways:
//! - The creator returns a deadline together with the value, see [`Created`].
//! - The cache has a [`CacheConfig::max_age`], which caps the lifetime of every value.
//!
//! Whichever deadline is sooner wins. Expired values are never returned: [`Cache::get`] drops them
//! lazily and creates a fresh value instead. Values that are not looked up again stay in memory
//! until they are evicted, or until [`Cache::check_and_expire`] is called. An
//! [`ExpirationSweeper`] does that periodically on a background thread.
//!
//! ## Errors
//!
//! There is exactly one error, [`CreationError`], which wraps the error of the creator together with
//! the key. Failures are never cached: the failed entry is removed immediately, so the next lookup
//! starts a fresh attempt. Retrying is up to the caller.
//!
//! ## Evictor
//!
//! An optional [`Evictor`] callback is invoked for every created value that leaves the cache,
//! whether it was evicted or expired. It can be used to release resources held by the value. The
//! callback runs while the cache is locked, so it must return quickly and must not call back into
//! the cache.
//!
//! ### Metrics
//!
//! All metrics are tagged with a `cache` field that corresponds to [`CacheConfig::name`], and are
//! only reported after [`metrics::configure_statsd`] has been called:
//!
//! - `caches.access`: All accesses.
//! - `caches.memory.hit`: Accesses served by an already created value.
//! - `caches.memory.coalesced`: Accesses that waited for a concurrent creation.
//! - `caches.computation`: Actual creator invocations.
//! - `caches.computation.failed`: Creator invocations that returned an error.
//! - `caches.computation.duration`: A timer of creator invocations.
//! - `caches.eviction`: Entries evicted because the cache was full.
//! - `caches.expired`: Entries removed because their deadline passed.
//! - `caches.memory.entries`: A gauge of live entries, reported after each expiration check.
//!
//! ## Example
//!
//! ```
//! use std::io;
//! use std::time::Duration;
//!
//! use memocache::{Cache, CacheConfig, Created};
//!
//! let config = CacheConfig {
//!     name: "greetings".into(),
//!     max_items: 2,
//!     max_age: Some(Duration::from_secs(60)),
//! };
//! let cache: Cache<String, _> = Cache::with_config(config, |name: &String| -> Result<_, io::Error> {
//!     Ok(Created::new(format!("hello {name}")))
//! });
//!
//! let first = cache.get("world".to_owned()).unwrap();
//! assert_eq!(first.value, "hello world");
//! assert!(!first.cached);
//!
//! let second = cache.get("world".to_owned()).unwrap();
//! assert!(second.cached);
//! assert_eq!(second.deadline, first.deadline);
//! ```

#![warn(missing_docs)]

#[macro_use]
#[allow(missing_docs)]
pub mod metrics;

mod cache;
mod config;
mod entry;
mod error;
mod lru;
mod sweeper;

pub use cache::{Cache, Created, Creator, Evictor, Lookup};
pub use config::{CacheConfig, DEFAULT_MAX_ITEMS};
pub use error::CreationError;
pub use sweeper::ExpirationSweeper;
