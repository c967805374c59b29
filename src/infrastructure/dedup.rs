//! Request Deduplication (singleflight)
//!
//! Coalesces concurrent operations for the same key into one in-flight
//! task whose outcome is broadcast to every waiter.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The in-flight entry vanished without publishing an outcome.
///
/// Only happens if the flight task itself dies (a panicking collaborator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("in-flight operation aborted before publishing a result")]
pub struct FlightAborted;

/// In-flight table coalescing concurrent work per key.
///
/// The first caller for a key spawns the work on the runtime and waits on
/// a broadcast channel; callers arriving while the flight is outstanding
/// subscribe to the same channel. The entry is removed the instant the
/// outcome is published, so a later caller starts a fresh flight.
///
/// The work runs as a spawned task: a caller that gives up drops only its
/// receiver, leaving the flight (and the other waiters) undisturbed.
pub struct Deduplicator<K, T> {
    inflight: Arc<DashMap<K, broadcast::Sender<T>>>,
}

impl<K, T> Deduplicator<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    /// Create an empty in-flight table.
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// Number of keys with an outstanding flight.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }

    /// Join the flight for `key`, starting it with `work` if none exists.
    ///
    /// At most one `work` future runs per key at any moment; every caller
    /// observes the same outcome. Bookkeeping is synchronous - the only
    /// await point is waiting for the outcome itself.
    pub async fn join_or_start<F, Fut>(&self, key: K, work: F) -> Result<T, FlightAborted>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut rx = match self.inflight.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().subscribe(),
            Entry::Vacant(entry) => {
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx.clone());

                let guard = FlightGuard {
                    inflight: self.inflight.clone(),
                    key: Some(key),
                };
                let fut = work();
                tokio::spawn(async move {
                    let outcome = fut.await;
                    // Remove before publishing: once waiters are released a
                    // new caller must start a fresh flight, never observe a
                    // stale entry.
                    drop(guard);
                    let _ = tx.send(outcome);
                });

                rx
            }
        };

        rx.recv().await.map_err(|_| FlightAborted)
    }
}

/// Removes the in-flight entry when the flight ends, even if the work
/// panicked mid-task: a dead entry would otherwise pin the key to
/// `FlightAborted` forever.
struct FlightGuard<K: Eq + Hash, T> {
    inflight: Arc<DashMap<K, broadcast::Sender<T>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, T> Drop for FlightGuard<K, T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.inflight.remove(&key);
        }
    }
}

impl<K, T> Default for Deduplicator<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
