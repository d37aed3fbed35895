use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use memocache::{Cache, CreationError, Lookup};
use memocache_test as test;

pub use test::{CountingCreator, RecordingEvictor, TestError, cache_config, wait_until};

pub type TestCache = Cache<String, CountingCreator>;
pub type TestResult = Result<Lookup<String>, CreationError<String, TestError>>;

/// Setup tests and create a cache around `creator`.
///
/// The cache is named `"test"`. Pass `0` as `max_items` for an unbounded cache.
pub fn setup_cache(
    creator: &CountingCreator,
    max_items: usize,
    max_age: Option<Duration>,
) -> TestCache {
    test::setup();
    Cache::with_config(cache_config(max_items, max_age), creator.clone())
}

/// Calls [`Cache::get`] for every key in `keys` on its own thread, all starting at the same time.
///
/// The results are returned in the order of `keys`.
pub fn get_concurrently(cache: &TestCache, keys: &[&str]) -> Vec<TestResult> {
    let barrier = Barrier::new(keys.len());

    thread::scope(|scope| {
        let handles: Vec<_> = keys
            .iter()
            .map(|&key| {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    cache.get(key.to_owned())
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}
