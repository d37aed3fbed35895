use std::error::Error;

use crate::{CountingCreator, TestError, setup_cache};

#[test]
fn test_failures_are_not_cached() {
    let creator = CountingCreator::new().fail_first(2);
    let cache = setup_cache(&creator, 16, None);

    for call in 1..=2 {
        let error = cache.get("a".to_owned()).unwrap_err();
        assert!(!error.cached());
        assert_eq!(error.key(), "a");
        assert_eq!(
            **error.error(),
            TestError::Transient {
                key: "a".into(),
                call
            }
        );
        assert!(cache.is_empty());
    }

    let lookup = cache.get("a".to_owned()).unwrap();
    assert!(!lookup.cached);
    assert_eq!(lookup.value, "a#3");
    assert!(cache.get("a".to_owned()).unwrap().cached);
}

#[test]
fn test_failure_does_not_affect_other_keys() {
    let creator = CountingCreator::new().failing_on("bad");
    let cache = setup_cache(&creator, 16, None);

    cache.get("good".to_owned()).unwrap();
    cache.get("bad".to_owned()).unwrap_err();

    assert!(cache.get("good".to_owned()).unwrap().cached);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_error_source() {
    let creator = CountingCreator::new().failing_on("bad");
    let cache = setup_cache(&creator, 16, None);

    let error = cache.get("bad".to_owned()).unwrap_err();
    let source = error.source().unwrap().downcast_ref::<TestError>();
    assert_eq!(source, Some(&TestError::Permanent { key: "bad".into() }));

    let (key, error) = error.into_parts();
    assert_eq!(key, "bad");
    insta::assert_snapshot!(error.to_string(), @r###""bad" cannot be created"###);
}
