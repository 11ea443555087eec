//! Git-facing building blocks: credential resolution, the per-URL lock registry,
//! and the worktree helpers the two reconcilers compose into their materialisation
//! algorithms.

pub mod credentials;
pub mod error;
pub mod lock_registry;
pub mod worktree;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use crate::constants::CACHE_REVISIONS_KEPT;

/// Deterministically derive the scratch directory a `(namespace, name, revision)`
/// triple is checked out into, so repeated reconciles of the same resource at the
/// same revision reuse their existing checkout instead of re-cloning.
///
/// Uses a plain (non-cryptographic) hash: cache keys are not security sensitive,
/// only required to be stable and collision-resistant enough for a bounded number
/// of concurrently reconciled resources.
#[must_use]
pub fn cache_path(base_dir: &Path, namespace: &str, name: &str, revision: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    (namespace, name, revision).hash(&mut hasher);
    let digest = hasher.finish();
    base_dir.join(format!("{namespace}-{name}-{digest:016x}"))
}

/// Remove cached checkouts under `base_dir` for `namespace`/`name` beyond the
/// [`CACHE_REVISIONS_KEPT`] most recently modified, keeping disk usage bounded
/// across many revisions of the same resource.
///
/// # Errors
///
/// Returns an I/O error if `base_dir` cannot be read.
pub async fn prune_old_revisions(base_dir: &Path, namespace: &str, name: &str) -> std::io::Result<()> {
    let prefix = format!("{namespace}-{name}-");
    let mut entries = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(base_dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    while let Some(entry) = read_dir.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name_str) = file_name.to_str() else { continue };
        if !name_str.starts_with(&prefix) {
            continue;
        }
        let metadata = entry.metadata().await?;
        let modified = metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        entries.push((modified, entry.path()));
    }

    entries.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, path) in entries.into_iter().skip(CACHE_REVISIONS_KEPT) {
        tokio::fs::remove_dir_all(&path).await.ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_is_deterministic() {
        let base = Path::new("/tmp/cache");
        let a = cache_path(base, "ns", "name", "main");
        let b = cache_path(base, "ns", "name", "main");
        assert_eq!(a, b);
    }

    #[test]
    fn cache_path_differs_by_revision() {
        let base = Path::new("/tmp/cache");
        let a = cache_path(base, "ns", "name", "main");
        let b = cache_path(base, "ns", "name", "v2");
        assert_ne!(a, b);
    }
}
