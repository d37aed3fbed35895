use std::sync::Arc;
use std::time::Duration;

use memocache::ExpirationSweeper;

use crate::{CountingCreator, RecordingEvictor, setup_cache, wait_until};

#[test]
fn test_sweeper_removes_expired_entries() {
    let creator = CountingCreator::new().with_ttl(Duration::from_millis(20));
    let evictor = RecordingEvictor::new();
    let cache = Arc::new(setup_cache(&creator, 16, None).with_evictor(evictor.callback()));

    cache.get("a".to_owned()).unwrap();
    cache.get("b".to_owned()).unwrap();

    let sweeper = ExpirationSweeper::spawn(&cache, Duration::from_millis(10)).unwrap();
    assert!(wait_until(Duration::from_secs(5), || cache.is_empty()));
    sweeper.stop();

    let mut keys = evictor.keys();
    keys.sort();
    assert_eq!(keys, ["a", "b"]);
}

#[test]
fn test_sweeper_keeps_live_entries() {
    let creator = CountingCreator::new();
    let cache = Arc::new(setup_cache(&creator, 16, None));
    cache.get("forever".to_owned()).unwrap();

    let sweeper = ExpirationSweeper::spawn(&cache, Duration::from_millis(5)).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    drop(sweeper);

    assert!(cache.get("forever".to_owned()).unwrap().cached);
}

#[test]
fn test_sweeper_outlives_cache() {
    let creator = CountingCreator::new();
    let cache = Arc::new(setup_cache(&creator, 16, None));

    let sweeper = ExpirationSweeper::spawn(&cache, Duration::from_millis(5)).unwrap();
    drop(cache);

    std::thread::sleep(Duration::from_millis(20));
    sweeper.stop();
}
