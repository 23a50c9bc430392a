use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Paths already seen (analyzed or in flight) during this run.
///
/// Cloning shares the same set, so the backlog pass and the watcher thread
/// can each hold one. Insertion is a single locked check-and-insert: of two
/// racing discoveries of one path, exactly one wins.
#[derive(Debug, Clone, Default)]
pub struct DedupTracker {
    seen: Arc<Mutex<HashSet<PathBuf>>>,
}

impl DedupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `path` is marked, `false` afterwards.
    pub fn mark_seen(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // A panic while holding the lock cannot leave a HashSet half-inserted.
        self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
