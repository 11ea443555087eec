//! Error taxonomy for the Git Worktree Helpers, consumed by the reconcilers'
//! error-policy layer to decide between validation, transient-I/O, and
//! authentication handling.

/// Failure modes surfaced by [`super::worktree`] operations.
#[derive(Debug, thiserror::Error)]
pub enum GitOpsError {
    #[error("repository or ref not found: {0}")]
    NotFound(String),

    #[error("git authentication failed for {url}: {detail}")]
    AuthFailed { url: String, detail: String },

    #[error("ref `{ref_name}` not found in {url}")]
    RefNotFound { url: String, ref_name: String },

    #[error("worktree at {path} has unexpected local modifications")]
    WorktreeDirty { path: String },

    #[error("push to {url} was rejected (non-fast-forward): {detail}")]
    PushRejected { url: String, detail: String },

    #[error("git command failed: {command} (exit status {status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to decode YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
