use std::thread;
use std::time::{Duration, Instant};

use memocache::{Cache, CacheConfig};

use crate::{CountingCreator, RecordingEvictor, setup_cache};

#[test]
fn test_expired_value_is_recreated() {
    let creator = CountingCreator::new().with_ttl(Duration::from_millis(30));
    let cache = setup_cache(&creator, 16, None);

    let first = cache.get("a".to_owned()).unwrap();
    assert!(cache.get("a".to_owned()).unwrap().cached);

    thread::sleep(Duration::from_millis(50));

    let second = cache.get("a".to_owned()).unwrap();
    assert!(!second.cached);
    assert_eq!(second.value, "a#2");
    assert!(second.deadline > first.deadline);
    assert_eq!(creator.calls(), 2);
}

#[test]
fn test_max_age_applies_without_creator_deadline() {
    let creator = CountingCreator::new();
    let evictor = RecordingEvictor::new();
    let cache = setup_cache(&creator, 16, Some(Duration::from_millis(30)))
        .with_evictor(evictor.callback());

    let lookup = cache.get("a".to_owned()).unwrap();
    assert!(lookup.deadline.is_some());

    thread::sleep(Duration::from_millis(50));

    assert!(!cache.get("a".to_owned()).unwrap().cached);
    assert_eq!(evictor.evicted(), [("a".to_owned(), "a#1".to_owned())]);
}

#[test]
fn test_sooner_deadline_wins() {
    let creator = CountingCreator::new().with_ttl(Duration::from_secs(1));
    let cache = setup_cache(&creator, 16, Some(Duration::from_secs(3600)));

    let before = Instant::now();
    let deadline = cache.get("a".to_owned()).unwrap().deadline.unwrap();
    assert!(deadline >= before + Duration::from_secs(1));
    assert!(deadline < before + Duration::from_secs(60));

    let creator = CountingCreator::new().with_ttl(Duration::from_secs(3600));
    let cache = setup_cache(&creator, 16, Some(Duration::from_secs(1)));

    let before = Instant::now();
    let deadline = cache.get("a".to_owned()).unwrap().deadline.unwrap();
    assert!(deadline >= before + Duration::from_secs(1));
    assert!(deadline < before + Duration::from_secs(60));
}

#[test]
fn test_check_and_expire() {
    let short = CountingCreator::new().with_ttl(Duration::from_millis(20));
    let evictor = RecordingEvictor::new();
    let cache = setup_cache(&short, 16, None).with_evictor(evictor.callback());

    for key in ["a", "b", "c"] {
        cache.get(key.to_owned()).unwrap();
    }
    assert_eq!(cache.check_and_expire(), 0);

    thread::sleep(Duration::from_millis(40));

    assert_eq!(cache.check_and_expire(), 3);
    assert!(cache.is_empty());
    assert_eq!(evictor.keys(), ["c", "b", "a"]);
    assert_eq!(cache.check_and_expire(), 0);
}

#[test]
fn test_config_from_yaml() {
    let yaml = r#"
        name: yaml
        max_items: 2
        max_age: 30ms
    "#;
    let config: CacheConfig = serde_yaml::from_str(yaml).unwrap();

    memocache_test::setup();
    let creator = CountingCreator::new();
    let cache = Cache::with_config(config, creator.clone());
    assert_eq!(cache.name(), "yaml");

    cache.get("a".to_owned()).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(cache.check_and_expire(), 1);
}
