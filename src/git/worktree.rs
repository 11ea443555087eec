//! # Git Worktree Helpers
//!
//! Shells out to the system `git` binary via [`tokio::process::Command`] rather
//! than linking `git2`/libgit2, keeping the musl and cross-compilation story
//! dependency-free. Every helper here assumes the caller already holds the
//! relevant [`crate::git::lock_registry::RepoLockRegistry`] entry for the duration
//! of the call.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

use super::credentials::{prepare_authenticated_url, GitCredentials};
use super::error::GitOpsError;

const PLATFORM_AUTHOR_NAME: &str = "adhar-platform-controller";
const PLATFORM_AUTHOR_EMAIL: &str = "platform-controller@adhar.io";

/// A worktree checked out for read-only inspection, owned by a [`TempDir`] so it is
/// cleaned up automatically when dropped. This is the "clone remote to memory"
/// capability: the clone still touches disk (git has no pure in-memory clone
/// target over the CLI), but its lifetime is scoped to the caller rather than to
/// the Repo Lock Registry's long-lived scratch directory.
#[derive(Debug)]
pub struct EphemeralWorktree {
    _dir: TempDir,
    path: PathBuf,
}

impl EphemeralWorktree {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn run_git(args: &[&str], cwd: &Path) -> Result<std::process::Output, GitOpsError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .output()
        .await?;
    Ok(output)
}

fn classify_git_failure(url: &str, command: &str, output: &std::process::Output) -> GitOpsError {
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let lower = stderr.to_lowercase();
    if lower.contains("authentication failed") || lower.contains("could not read username") {
        GitOpsError::AuthFailed { url: url.to_string(), detail: stderr }
    } else if lower.contains("could not find remote branch") || lower.contains("did not match any file(s) known to git") {
        GitOpsError::RefNotFound { url: url.to_string(), ref_name: stderr }
    } else if lower.contains("repository not found") || lower.contains("not found") {
        GitOpsError::NotFound(url.to_string())
    } else if lower.contains("non-fast-forward") || lower.contains("rejected") {
        GitOpsError::PushRejected { url: url.to_string(), detail: stderr }
    } else {
        GitOpsError::CommandFailed {
            command: command.to_string(),
            status: output.status.to_string(),
            stderr,
        }
    }
}

fn url_with_credentials(url: &str, credentials: Option<&GitCredentials>) -> Result<String, GitOpsError> {
    match credentials {
        Some(GitCredentials::Ssh { .. }) | None => Ok(url.to_string()),
        Some(creds) => prepare_authenticated_url(url, creds),
    }
}

/// Clone `url` at `git_ref` into `dest`, or, if `dest` already holds a checkout of
/// this URL, fetch and reset it in place instead of cloning fresh. Returns the
/// resulting commit hash.
///
/// # Errors
///
/// Returns [`GitOpsError::AuthFailed`], [`GitOpsError::RefNotFound`],
/// [`GitOpsError::NotFound`], or [`GitOpsError::CommandFailed`] depending on how
/// the underlying `git` invocation failed.
#[instrument(skip(credentials), fields(url = %url, git_ref = %git_ref))]
pub async fn clone_remote_to_dir(
    url: &str,
    git_ref: &str,
    dest: &Path,
    credentials: Option<&GitCredentials>,
    clone_submodules: bool,
) -> Result<String, GitOpsError> {
    let authenticated_url = url_with_credentials(url, credentials)?;
    tokio::fs::create_dir_all(dest).await?;

    if dest.join(".git").exists() {
        debug!("existing checkout found, fetching instead of cloning");
        let fetch = run_git(&["fetch", "--depth", "1", "origin", git_ref], dest).await?;
        if !fetch.status.success() {
            return Err(classify_git_failure(url, "git fetch", &fetch));
        }
        let reset = run_git(&["reset", "--hard", "FETCH_HEAD"], dest).await?;
        if !reset.status.success() {
            return Err(classify_git_failure(url, "git reset", &reset));
        }
    } else {
        let mut args = vec!["clone", "--depth", "1", "--branch", git_ref];
        if clone_submodules {
            args.push("--recurse-submodules");
        }
        args.push(authenticated_url.as_str());
        args.push(dest.to_str().unwrap_or_default());

        let clone = run_git(&args, Path::new(".")).await?;
        if !clone.status.success() {
            // Shallow clone of a non-branch ref (a tag or commit hash) fails `--branch`;
            // fall back to a full fetch-then-checkout sequence.
            warn!("shallow branch clone failed, retrying with fetch+checkout");
            let init = run_git(&["init", dest.to_str().unwrap_or_default()], Path::new(".")).await?;
            if !init.status.success() {
                return Err(classify_git_failure(url, "git init", &init));
            }
            let remote_add = run_git(&["remote", "add", "origin", authenticated_url.as_str()], dest).await?;
            if !remote_add.status.success() {
                return Err(classify_git_failure(url, "git remote add", &remote_add));
            }
            let fetch = run_git(&["fetch", "--depth", "1", "origin", git_ref], dest).await?;
            if !fetch.status.success() {
                return Err(classify_git_failure(url, "git fetch", &fetch));
            }
            let checkout = run_git(&["checkout", "FETCH_HEAD"], dest).await?;
            if !checkout.status.success() {
                return Err(classify_git_failure(url, "git checkout", &checkout));
            }
        }
    }

    read_head_commit(dest).await
}

/// Clone `url` at `git_ref` into a freshly created, self-cleaning temporary
/// directory, suitable for read-only inspection.
///
/// # Errors
///
/// See [`clone_remote_to_dir`].
pub async fn clone_remote_to_memory(
    url: &str,
    git_ref: &str,
    credentials: Option<&GitCredentials>,
    clone_submodules: bool,
) -> Result<EphemeralWorktree, GitOpsError> {
    let dir = TempDir::new()?;
    let path = dir.path().to_path_buf();
    clone_remote_to_dir(url, git_ref, &path, credentials, clone_submodules).await?;
    Ok(EphemeralWorktree { _dir: dir, path })
}

/// Initialise an empty working tree at `dest` with a remote named `origin`
/// pointing at `remote_url`. Idempotent: calling it again on an already
/// initialised directory is a no-op beyond updating the remote URL.
///
/// # Errors
///
/// Returns [`GitOpsError::CommandFailed`] if any underlying `git` invocation fails.
#[instrument(fields(remote_url = %remote_url))]
pub async fn init_local_worktree(dest: &Path, remote_url: &str) -> Result<(), GitOpsError> {
    tokio::fs::create_dir_all(dest).await?;

    if !dest.join(".git").exists() {
        let init = run_git(&["init"], dest).await?;
        if !init.status.success() {
            return Err(classify_git_failure(remote_url, "git init", &init));
        }
        let add = run_git(&["remote", "add", "origin", remote_url], dest).await?;
        if !add.status.success() {
            return Err(classify_git_failure(remote_url, "git remote add", &add));
        }
    } else {
        let set_url = run_git(&["remote", "set-url", "origin", remote_url], dest).await?;
        if !set_url.status.success() {
            return Err(classify_git_failure(remote_url, "git remote set-url", &set_url));
        }
    }
    Ok(())
}

/// Copy every regular file under `src_root` (optionally restricted to
/// `src_subpath`) into `dest_root`, creating intermediate directories as needed.
/// When `yaml_only` is true, only `.yaml`/`.yml` files are copied.
///
/// Returns the number of files copied.
///
/// # Errors
///
/// Returns [`GitOpsError::Io`] if the source path does not exist or a copy fails.
pub async fn copy_subtree(
    src_root: &Path,
    src_subpath: Option<&str>,
    dest_root: &Path,
    yaml_only: bool,
) -> Result<usize, GitOpsError> {
    let source = match src_subpath {
        Some(sub) => src_root.join(sub),
        None => src_root.to_path_buf(),
    };

    if !source.exists() {
        return Err(GitOpsError::NotFound(source.display().to_string()));
    }

    let mut copied = 0usize;
    for entry in WalkDir::new(&source).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if yaml_only && !is_yaml_file(path) {
            continue;
        }
        let relative = path.strip_prefix(&source).unwrap_or(path);
        let dest_path = dest_root.join(relative);
        if let Some(parent) = dest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &dest_path).await?;
        copied += 1;
    }
    Ok(copied)
}

fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(std::ffi::OsStr::to_str),
        Some("yaml") | Some("yml")
    )
}

/// List every `.yaml`/`.yml` file under `root` (optionally restricted to a
/// prefix), relative to `root`.
///
/// # Errors
///
/// Returns [`GitOpsError::Io`] if `root` cannot be read.
pub fn list_yaml_files(root: &Path, prefix: Option<&str>) -> Result<Vec<PathBuf>, GitOpsError> {
    let base = match prefix {
        Some(p) => root.join(p),
        None => root.to_path_buf(),
    };
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&base).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_file() && is_yaml_file(entry.path()) {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(relative);
        }
    }
    files.sort();
    Ok(files)
}

/// Read the bytes of `rel_path` within `root`.
///
/// # Errors
///
/// Returns [`GitOpsError::Io`] if the file does not exist or cannot be read.
pub async fn read_file(root: &Path, rel_path: &str) -> Result<Vec<u8>, GitOpsError> {
    let full_path = root.join(rel_path);
    Ok(tokio::fs::read(full_path).await?)
}

/// Stage every change under `worktree`, commit with the platform identity, and
/// push to `origin`. Returns `Ok(None)` if there was nothing to commit.
///
/// # Errors
///
/// Returns [`GitOpsError::PushRejected`] on a non-fast-forward push,
/// [`GitOpsError::AuthFailed`] if authentication fails, or
/// [`GitOpsError::CommandFailed`] for any other underlying `git` failure.
#[instrument(skip(credentials), fields(remote_url = %remote_url, message = %message))]
pub async fn commit_and_push(
    worktree: &Path,
    remote_url: &str,
    credentials: Option<&GitCredentials>,
    message: &str,
) -> Result<Option<String>, GitOpsError> {
    configure_identity(worktree).await?;

    let add = run_git(&["add", "-A"], worktree).await?;
    if !add.status.success() {
        return Err(classify_git_failure(remote_url, "git add", &add));
    }

    let status = run_git(&["status", "--porcelain"], worktree).await?;
    if String::from_utf8_lossy(&status.stdout).trim().is_empty() {
        debug!("worktree has no changes, skipping commit");
        return Ok(None);
    }

    let commit = run_git(&["commit", "-m", message], worktree).await?;
    if !commit.status.success() {
        return Err(classify_git_failure(remote_url, "git commit", &commit));
    }

    let authenticated_url = url_with_credentials(remote_url, credentials)?;
    let push = run_git(
        &["push", authenticated_url.as_str(), "HEAD:refs/heads/main"],
        worktree,
    )
    .await?;
    if !push.status.success() {
        return Err(classify_git_failure(remote_url, "git push", &push));
    }

    read_head_commit(worktree).await.map(Some)
}

async fn configure_identity(worktree: &Path) -> Result<(), GitOpsError> {
    for (key, value) in [
        ("user.name", PLATFORM_AUTHOR_NAME),
        ("user.email", PLATFORM_AUTHOR_EMAIL),
    ] {
        let result = run_git(&["config", key, value], worktree).await?;
        if !result.status.success() {
            return Err(classify_git_failure(
                worktree.to_str().unwrap_or_default(),
                "git config",
                &result,
            ));
        }
    }
    Ok(())
}

async fn read_head_commit(worktree: &Path) -> Result<String, GitOpsError> {
    let rev_parse = run_git(&["rev-parse", "HEAD"], worktree).await?;
    if !rev_parse.status.success() {
        return Err(classify_git_failure(
            worktree.to_str().unwrap_or_default(),
            "git rev-parse",
            &rev_parse,
        ));
    }
    Ok(String::from_utf8_lossy(&rev_parse.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_extension_detection() {
        assert!(is_yaml_file(Path::new("values.yaml")));
        assert!(is_yaml_file(Path::new("values.yml")));
        assert!(!is_yaml_file(Path::new("README.md")));
        assert!(!is_yaml_file(Path::new("values.yaml.bak")));
    }

    #[tokio::test]
    async fn copy_subtree_only_copies_yaml_when_requested() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        tokio::fs::write(src.path().join("app.yaml"), b"a: 1").await.unwrap();
        tokio::fs::write(src.path().join("README.md"), b"hello").await.unwrap();

        let copied = copy_subtree(src.path(), None, dest.path(), true).await.unwrap();
        assert_eq!(copied, 1);
        assert!(dest.path().join("app.yaml").exists());
        assert!(!dest.path().join("README.md").exists());
    }

    #[test]
    fn list_yaml_files_is_sorted_and_relative_to_root() {
        let src = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("b.yaml"), b"").unwrap();
        std::fs::write(src.path().join("nested/a.yml"), b"").unwrap();
        std::fs::write(src.path().join("ignore.txt"), b"").unwrap();

        let files = list_yaml_files(src.path(), None).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("b.yaml"), PathBuf::from("nested/a.yml")]
        );
    }
}
