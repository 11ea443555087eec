//! # Repo Lock Registry
//!
//! A process-wide mapping from repository URL (or, for local sources, absolute
//! path) to a `(mutex, scratch directory)` pair. Callers hold the mutex for the
//! lifetime of every filesystem operation they perform against the associated
//! directory, preventing two concurrent reconciles sharing a remote from
//! corrupting each other's checkout.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

/// A registry entry: the mutex guarding the directory, and the directory itself.
#[derive(Debug, Clone)]
pub struct LockEntry {
    /// Held for the duration of any read/write against `dir`.
    pub mutex: Arc<Mutex<()>>,
    /// Scratch directory this URL/path is checked out into.
    pub dir: PathBuf,
}

/// Process-wide registry of per-URL locks. Cheaply cloneable; every clone shares
/// the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct RepoLockRegistry {
    inner: Arc<Mutex<HashMap<String, LockEntry>>>,
}

impl RepoLockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing entry for `key`, or create one rooted at `default_dir`
    /// if this is the first time `key` has been seen.
    pub async fn load_or_store(&self, key: &str, default_dir: PathBuf) -> LockEntry {
        let mut map = self.inner.lock().await;
        map.entry(key.to_string())
            .or_insert_with(|| LockEntry {
                mutex: Arc::new(Mutex::new(())),
                dir: default_dir,
            })
            .clone()
    }

    /// Number of distinct URLs/paths currently tracked. Exposed for tests and metrics.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_returns_the_same_entry() {
        let registry = RepoLockRegistry::new();
        let a = registry.load_or_store("https://example.com/repo.git", PathBuf::from("/tmp/a")).await;
        let b = registry.load_or_store("https://example.com/repo.git", PathBuf::from("/tmp/b")).await;
        assert_eq!(a.dir, PathBuf::from("/tmp/a"));
        assert_eq!(b.dir, PathBuf::from("/tmp/a"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn distinct_keys_get_distinct_entries() {
        let registry = RepoLockRegistry::new();
        registry.load_or_store("url-a", PathBuf::from("/tmp/a")).await;
        registry.load_or_store("url-b", PathBuf::from("/tmp/b")).await;
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_holders_of_the_same_key_serialise() {
        let registry = RepoLockRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let registry = registry.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                let entry = registry.load_or_store("shared", PathBuf::from("/tmp/shared")).await;
                let _guard = entry.mutex.lock().await;
                let before = counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                assert_eq!(counter.load(Ordering::SeqCst), before + 1);
            }));
        }

        for handle in handles {
            handle.await.expect("spawned task panicked");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }
}
