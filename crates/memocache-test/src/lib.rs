//! Helpers for testing caches.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - [`CountingCreator`] and [`RecordingEvictor`] are cheap to clone, and all clones share their
//!    state. Hand one clone to the cache and keep another one in the test to inspect calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use memocache::{CacheConfig, Created, Creator};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `memocache` crate and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("memocache=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A cache configuration named `"test"`.
pub fn cache_config(max_items: usize, max_age: Option<Duration>) -> CacheConfig {
    CacheConfig {
        name: "test".into(),
        max_items,
        max_age,
    }
}

/// Polls `condition` until it holds, for at most `timeout`.
///
/// Returns whether the condition was met.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
    true
}

/// Errors produced by [`CountingCreator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestError {
    /// One of the first attempts configured with [`CountingCreator::fail_first`].
    #[error("attempt {call} for {key:?} failed")]
    Transient { key: String, call: usize },
    /// The key configured with [`CountingCreator::failing_on`].
    #[error("{key:?} cannot be created")]
    Permanent { key: String },
}

/// A creator that produces `"{key}#{call}"`, where `call` counts all invocations starting at 1.
#[derive(Clone, Debug, Default)]
pub struct CountingCreator {
    calls: Arc<AtomicUsize>,
    latency: Duration,
    ttl: Option<Duration>,
    fail_first: usize,
    failing: Option<String>,
}

impl CountingCreator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `latency` in every invocation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Created values expire `ttl` after their creation.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// The first `attempts` invocations fail with [`TestError::Transient`].
    pub fn fail_first(mut self, attempts: usize) -> Self {
        self.fail_first = attempts;
        self
    }

    /// Invocations for `key` always fail with [`TestError::Permanent`].
    pub fn failing_on(mut self, key: impl Into<String>) -> Self {
        self.failing = Some(key.into());
        self
    }

    /// The number of invocations so far, across all clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Creator<String> for CountingCreator {
    type Value = String;
    type Error = TestError;

    fn create(&self, key: &String) -> Result<Created<String>, TestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if call <= self.fail_first {
            return Err(TestError::Transient {
                key: key.clone(),
                call,
            });
        }
        if self.failing.as_ref() == Some(key) {
            return Err(TestError::Permanent { key: key.clone() });
        }

        let value = format!("{key}#{call}");
        Ok(match self.ttl {
            Some(ttl) => Created::expires_in(value, ttl),
            None => Created::new(value),
        })
    }
}

/// Records every `(key, value)` pair handed to the evictor.
#[derive(Clone, Debug, Default)]
pub struct RecordingEvictor {
    evicted: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingEvictor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The callback to install with `Cache::with_evictor`.
    pub fn callback(&self) -> impl Fn(&String, &String) + Send + Sync + 'static {
        let evicted = Arc::clone(&self.evicted);
        move |key: &String, value: &String| {
            evicted.lock().unwrap().push((key.clone(), value.clone()));
        }
    }

    /// All recorded pairs, in eviction order.
    pub fn evicted(&self) -> Vec<(String, String)> {
        self.evicted.lock().unwrap().clone()
    }

    /// The keys of all recorded pairs, in eviction order.
    pub fn keys(&self) -> Vec<String> {
        self.evicted().into_iter().map(|(key, _)| key).collect()
    }
}
