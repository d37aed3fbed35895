use crate::{CountingCreator, RecordingEvictor, setup_cache};

#[test]
fn test_least_recently_used_is_evicted() {
    let creator = CountingCreator::new();
    let evictor = RecordingEvictor::new();
    let cache = setup_cache(&creator, 2, None).with_evictor(evictor.callback());

    cache.get("a".to_owned()).unwrap();
    cache.get("b".to_owned()).unwrap();
    cache.get("c".to_owned()).unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(evictor.evicted(), [("a".to_owned(), "a#1".to_owned())]);

    assert!(cache.get("b".to_owned()).unwrap().cached);
    assert!(cache.get("c".to_owned()).unwrap().cached);
    assert_eq!(creator.calls(), 3);
}

#[test]
fn test_reads_refresh_recency() {
    let creator = CountingCreator::new();
    let evictor = RecordingEvictor::new();
    let cache = setup_cache(&creator, 2, None).with_evictor(evictor.callback());

    cache.get("a".to_owned()).unwrap();
    cache.get("b".to_owned()).unwrap();
    assert!(cache.get("a".to_owned()).unwrap().cached);
    cache.get("c".to_owned()).unwrap();

    assert_eq!(evictor.keys(), ["b"]);
    assert!(cache.get("a".to_owned()).unwrap().cached);
    assert!(cache.get("c".to_owned()).unwrap().cached);
}

#[test]
fn test_eviction_order() {
    let creator = CountingCreator::new();
    let evictor = RecordingEvictor::new();
    let cache = setup_cache(&creator, 3, None).with_evictor(evictor.callback());

    for i in 0..10 {
        cache.get(format!("key-{i}")).unwrap();
    }

    assert_eq!(cache.len(), 3);
    insta::assert_debug_snapshot!(evictor.keys(), @r###"
    [
        "key-0",
        "key-1",
        "key-2",
        "key-3",
        "key-4",
        "key-5",
        "key-6",
    ]
    "###);
}

#[test]
fn test_failed_entries_take_no_room() {
    let creator = CountingCreator::new().failing_on("bad");
    let evictor = RecordingEvictor::new();
    let cache = setup_cache(&creator, 2, None).with_evictor(evictor.callback());

    cache.get("a".to_owned()).unwrap();
    cache.get("bad".to_owned()).unwrap_err();
    cache.get("b".to_owned()).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(evictor.evicted().is_empty());
}

#[test]
fn test_unbounded_cache() {
    let creator = CountingCreator::new();
    let evictor = RecordingEvictor::new();
    let cache = setup_cache(&creator, 0, None).with_evictor(evictor.callback());

    for i in 0..5000 {
        cache.get(format!("key-{i}")).unwrap();
    }

    assert_eq!(cache.len(), 5000);
    assert!(evictor.evicted().is_empty());
}
