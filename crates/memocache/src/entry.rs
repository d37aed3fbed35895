use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Instant;

/// How the creation of an [`Entry`] ended.
#[derive(Debug)]
pub(crate) enum Settled<V, E> {
    /// The creator returned a value, which expires at `deadline` (if any).
    Created { value: V, deadline: Option<Instant> },
    /// The creator returned an error. Every waiter gets the same shared error.
    Failed(Arc<E>),
    /// The creator panicked. Waiters have to start a new lookup.
    Abandoned,
}

impl<V: Clone, E> Clone for Settled<V, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Created { value, deadline } => Self::Created {
                value: value.clone(),
                deadline: *deadline,
            },
            Self::Failed(error) => Self::Failed(Arc::clone(error)),
            Self::Abandoned => Self::Abandoned,
        }
    }
}

#[derive(Debug)]
pub(crate) struct EntryState<V, E> {
    /// `None` while the creation is in flight.
    pub outcome: Option<Settled<V, E>>,
    /// Set once the entry left the index and the recency list.
    ///
    /// This only ever changes while the structural lock of the owning cache is held.
    pub removed: bool,
}

impl<V, E> EntryState<V, E> {
    /// Returns the value and deadline of a successfully created entry.
    pub fn created(&self) -> Option<(&V, Option<Instant>)> {
        match &self.outcome {
            Some(Settled::Created { value, deadline }) => Some((value, *deadline)),
            _ => None,
        }
    }
}

/// A single cache slot, shared between the cache and every caller waiting for its creation.
///
/// The state is guarded by its own lock, so that waiting on a creation never holds up the
/// structural lock of the cache.
#[derive(Debug)]
pub(crate) struct Entry<V, E> {
    state: Mutex<EntryState<V, E>>,
    settled: Condvar,
}

impl<V, E> Entry<V, E> {
    pub fn pending() -> Self {
        Self {
            state: Mutex::new(EntryState {
                outcome: None,
                removed: false,
            }),
            settled: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, EntryState<V, E>> {
        self.state.lock().unwrap()
    }

    /// Publishes the outcome of the creation and wakes up all waiters.
    pub fn settle(&self, outcome: Settled<V, E>) {
        let mut state = self.lock();
        state.outcome = Some(outcome);
        self.settled.notify_all();
    }
}

impl<V: Clone, E> Entry<V, E> {
    /// Blocks until the creation of this entry has settled, and returns a copy of its outcome.
    ///
    /// Wake-ups are re-checked against the state, so spurious ones are harmless.
    pub fn wait(&self) -> Settled<V, E> {
        let mut state = self.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            state = self.settled.wait(state).unwrap();
        }
    }
}
