use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Per-key coalescing of concurrent asynchronous operations.
///
/// While an operation for a key is in flight, every additional caller for
/// the same key parks on the shared cell and receives the same outcome,
/// success or failure. The cell is removed once the flight lands, so the
/// next arrival after a failure starts a fresh attempt rather than
/// replaying the stored error forever.
///
/// A waiter that is dropped does not abort the flight: the operation is
/// driven by whichever waiter polls the cell, and remaining waiters keep
/// it alive until all of them have gone.
pub struct FlightGroup<K: Eq + Hash, V, E> {
    cells: DashMap<K, Arc<OnceCell<Result<V, Arc<E>>>>>,
}

impl<K, V, E> Default for FlightGroup<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> FlightGroup<K, V, E>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Number of flights currently in progress.
    pub fn in_flight(&self) -> usize {
        self.cells.len()
    }
}

impl<K, V, E> FlightGroup<K, V, E>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Runs `op` for `key`, or joins an existing flight for the same key.
    ///
    /// Errors are wrapped in `Arc` so every waiter in the coalesced group
    /// observes the identical failure.
    pub async fn run<F, Fut>(&self, key: K, op: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self
            .cells
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = cell
            .get_or_init(|| async { op().await.map_err(Arc::new) })
            .await
            .clone();

        self.cells.remove(&key);
        result
    }
}
