use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// The error returned by [`Cache::get`](crate::Cache::get) when creating a value failed.
///
/// It carries the key that failed together with the error of the [`Creator`](crate::Creator).
/// All callers that were waiting on the same creation receive the same, shared error.
///
/// A failed creation is never cached: the next lookup of the same key starts a fresh attempt.
#[derive(Debug)]
pub struct CreationError<K, E> {
    key: K,
    error: Arc<E>,
    cached: bool,
}

impl<K, E> CreationError<K, E> {
    pub(crate) fn new(key: K, error: Arc<E>, cached: bool) -> Self {
        Self { key, error, cached }
    }

    /// The key whose value could not be created.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The error returned by the creator.
    pub fn error(&self) -> &Arc<E> {
        &self.error
    }

    /// Whether this caller waited on somebody else's creation attempt (`true`), or ran the failing
    /// creation itself (`false`).
    pub fn cached(&self) -> bool {
        self.cached
    }

    /// Splits the error into the failed key and the creator's error.
    pub fn into_parts(self) -> (K, Arc<E>) {
        (self.key, self.error)
    }
}

impl<K: fmt::Debug, E: fmt::Display> fmt::Display for CreationError<K, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "creation failure for {:?}: {}", self.key, self.error)
    }
}

impl<K: fmt::Debug, E: Error + 'static> Error for CreationError<K, E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&*self.error)
    }
}
