use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;

/// Synthetic registry bookkeeping for one logical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState {
    pub epoch: u64,
    pub createdat: DateTime<Utc>,
    pub modifiedat: DateTime<Utc>,
}

impl EntityState {
    pub fn createdat_str(&self) -> String {
        self.createdat.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn modifiedat_str(&self) -> String {
        self.modifiedat.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Process-local `path -> {epoch, createdat, modifiedat}` store.
///
/// Entities are derived from upstream data, so these values are
/// auxiliary: a path is seeded with `epoch = 1` and `createdat ==
/// modifiedat` on first observation and stays stable for the process
/// lifetime. [`touch`](Self::touch) exists for facades that detect a
/// changed upstream payload; `epoch` is monotonically non-decreasing
/// per path either way.
#[derive(Default)]
pub struct EntityStore {
    states: DashMap<String, EntityState>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for `path`, seeding it on first observation.
    pub fn get(&self, path: &str) -> EntityState {
        self.states
            .entry(path.to_string())
            .or_insert_with(|| {
                let now = Utc::now();
                EntityState {
                    epoch: 1,
                    createdat: now,
                    modifiedat: now,
                }
            })
            .clone()
    }

    /// Bumps `epoch` and `modifiedat` for `path`, seeding it first if
    /// needed.
    pub fn touch(&self, path: &str) -> EntityState {
        let mut entry = self.states.entry(path.to_string()).or_insert_with(|| {
            let now = Utc::now();
            EntityState {
                epoch: 0,
                createdat: now,
                modifiedat: now,
            }
        });
        entry.epoch += 1;
        entry.modifiedat = Utc::now();
        entry.clone()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
