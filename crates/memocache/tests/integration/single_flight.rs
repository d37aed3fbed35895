use std::sync::Arc;
use std::time::{Duration, Instant};

use insta::assert_snapshot;
use memocache::{Cache, Created};

use crate::{CountingCreator, TestError, get_concurrently, setup_cache};

#[test]
fn test_concurrent_gets_share_one_creation() {
    let creator = CountingCreator::new().with_latency(Duration::from_millis(100));
    let cache = setup_cache(&creator, 16, None);

    let results = get_concurrently(&cache, &["shared"; 32]);
    let lookups: Vec<_> = results.into_iter().map(Result::unwrap).collect();

    assert_eq!(creator.calls(), 1);
    assert_eq!(lookups.iter().filter(|lookup| !lookup.cached).count(), 1);
    assert!(lookups.iter().all(|lookup| lookup.value == "shared#1"));

    // later lookups are plain hits
    let lookup = cache.get("shared".to_owned()).unwrap();
    assert!(lookup.cached);
    assert_eq!(creator.calls(), 1);
}

#[test]
fn test_concurrent_failures_share_one_error() {
    let creator = CountingCreator::new()
        .with_latency(Duration::from_millis(100))
        .failing_on("broken");
    let cache = setup_cache(&creator, 16, None);

    let results = get_concurrently(&cache, &["broken"; 8]);
    let errors: Vec<_> = results.into_iter().map(Result::unwrap_err).collect();

    assert_eq!(creator.calls(), 1);
    assert_eq!(errors.iter().filter(|error| !error.cached()).count(), 1);
    for error in &errors {
        assert!(Arc::ptr_eq(error.error(), errors[0].error()));
    }
    assert_eq!(
        **errors[0].error(),
        TestError::Permanent {
            key: "broken".into()
        }
    );
    assert_snapshot!(errors[0].to_string(), @r###"creation failure for "broken": "broken" cannot be created"###);
}

#[test]
fn test_independent_keys_do_not_block() {
    let latency = Duration::from_millis(200);
    let creator = CountingCreator::new().with_latency(latency);
    let cache = setup_cache(&creator, 16, None);

    let start = Instant::now();
    let results = get_concurrently(&cache, &["a", "b", "c", "d", "e", "f", "g", "h"]);
    let elapsed = start.elapsed();

    assert_eq!(creator.calls(), 8);
    assert!(results.iter().all(|result| matches!(result, Ok(lookup) if !lookup.cached)));
    // serialized creation would take 1.6s
    assert!(elapsed < latency * 4, "took {elapsed:?}");
}

#[test]
fn test_mixed_keys_create_once_per_key() {
    let creator = CountingCreator::new().with_latency(Duration::from_millis(50));
    let cache = setup_cache(&creator, 16, None);

    let keys: Vec<_> = ["a", "b", "c", "d"].iter().cycle().take(32).copied().collect();
    let results = get_concurrently(&cache, &keys);

    assert_eq!(creator.calls(), 4);
    for key in ["a", "b", "c", "d"] {
        let created = results
            .iter()
            .zip(&keys)
            .filter(|(result, k)| **k == key && matches!(result, Ok(lookup) if !lookup.cached))
            .count();
        assert_eq!(created, 1, "{key} was created {created} times");
    }
    assert_eq!(cache.len(), 4);
}

#[test]
fn test_creator_panic_does_not_poison_cache() {
    let creator = |key: &String| -> Result<Created<String>, TestError> {
        if key == "explode" {
            panic!("creator exploded");
        }
        Ok(Created::new(key.clone()))
    };
    memocache_test::setup();
    let cache = Cache::new(creator);

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.get("explode".to_owned())
    }));
    assert!(result.is_err());
    assert!(cache.is_empty());

    let lookup = cache.get("fine".to_owned()).unwrap();
    assert_eq!(lookup.value, "fine");
    assert_eq!(cache.len(), 1);
}
