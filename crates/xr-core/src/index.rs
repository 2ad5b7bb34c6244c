use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Notify;

/// In-memory package-name index backing cheap filter evaluation.
///
/// The corpus is held as one immutable, sorted, deduplicated snapshot
/// behind an `RwLock`; [`install`](Self::install) swaps the whole
/// snapshot atomically, so readers never observe a partially built
/// index. Construction happens in the background at boot — until the
/// first snapshot lands the index reports not-ready and callers fall
/// back to upstream search.
pub struct NameIndex {
    names: RwLock<Arc<Vec<String>>>,
    ready: AtomicBool,
    ready_signal: Notify,
}

impl Default for NameIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl NameIndex {
    pub fn new() -> Self {
        Self {
            names: RwLock::new(Arc::new(Vec::new())),
            ready: AtomicBool::new(false),
            ready_signal: Notify::new(),
        }
    }

    /// Sorts, deduplicates and installs a new snapshot, marking the
    /// index ready.
    pub fn install(&self, mut names: Vec<String>) {
        names.sort();
        names.dedup();
        let count = names.len();

        *self.names.write().expect("name index lock poisoned") = Arc::new(names);
        self.ready.store(true, Ordering::Release);
        self.ready_signal.notify_waiters();

        tracing::info!(count, "name index installed");
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Waits until a snapshot is installed, up to `deadline`.
    ///
    /// Returns whether the index became ready. Sort requests use this as
    /// their load barrier.
    pub async fn await_ready(&self, deadline: Duration) -> bool {
        if self.is_ready() {
            return true;
        }
        tokio::time::timeout(deadline, async {
            loop {
                let notified = self.ready_signal.notified();
                if self.is_ready() {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    /// Current snapshot; cheap `Arc` clone.
    pub fn snapshot(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.names.read().expect("name index lock poisoned"))
    }

    pub fn len(&self) -> usize {
        self.names.read().expect("name index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot().binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    /// Names starting with `prefix`, in index order, via binary search on
    /// the sorted snapshot.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        let snapshot = self.snapshot();
        let start = snapshot.partition_point(|n| n.as_str() < prefix);
        snapshot[start..]
            .iter()
            .take_while(|n| n.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Loads a snapshot file (one name per line, `#` comments ignored).
    ///
    /// Returns `None` when the file does not exist; other I/O failures
    /// are logged and also yield `None` so boot continues without a
    /// corpus.
    pub async fn load_snapshot_file(path: &Path) -> Option<Vec<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                let names: Vec<String> = raw
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(ToString::to_string)
                    .collect();
                Some(names)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read name snapshot");
                None
            }
        }
    }
}
