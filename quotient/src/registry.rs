//! Poll loop bookkeeping.

use dashmap::DashMap;

/// Set of quote ids with an active poll loop.
///
/// Guarantees at most one loop per id for the process lifetime; purely
/// local, nothing is persisted.
pub struct PollRegistry {
    active: DashMap<String, ()>,
}

impl PollRegistry {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    /// Claim the loop slot for `id`. Returns false if a loop already
    /// holds it.
    pub fn register(&self, id: &str) -> bool {
        self.active.insert(id.to_string(), ()).is_none()
    }

    pub fn unregister(&self, id: &str) {
        self.active.remove(id);
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl Default for PollRegistry {
    fn default() -> Self {
        Self::new()
    }
}
