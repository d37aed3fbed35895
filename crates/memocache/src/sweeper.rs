use std::error::Error;
use std::fmt;
use std::hash::Hash;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cache::{Cache, Creator};

/// Periodically removes expired entries from a [`Cache`] on a background thread.
///
/// Calls [`Cache::check_and_expire`] every `interval`. The sweeper only holds a weak reference to
/// the cache, and stops on its own once the cache is dropped. Dropping the sweeper stops the
/// thread and waits for it to finish.
pub struct ExpirationSweeper {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ExpirationSweeper {
    /// Spawns the sweeper thread for `cache`.
    pub fn spawn<K, C>(cache: &Arc<Cache<K, C>>, interval: Duration) -> io::Result<Self>
    where
        K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
        C: Creator<K> + Send + Sync + 'static,
        C::Value: Clone + Send + Sync,
        C::Error: Error + Send + Sync + 'static,
    {
        let (stop, stopped) = mpsc::channel();
        let cache: Weak<Cache<K, C>> = Arc::downgrade(cache);

        let thread = thread::Builder::new()
            .name("memocache-sweeper".into())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let Some(cache) = cache.upgrade() else {
                        break;
                    };
                    let expired = cache.check_and_expire();
                    tracing::trace!(cache = cache.name(), expired, "expiration sweep finished");
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            thread: Some(thread),
        })
    }

    /// Stops the sweeper and waits for its thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Closing the channel wakes up the thread.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("expiration sweeper panicked");
            }
        }
    }
}

impl Drop for ExpirationSweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ExpirationSweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirationSweeper")
            .field("running", &self.thread.is_some())
            .finish()
    }
}
