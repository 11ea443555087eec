//! `GitRepository` — materialises a local directory or a remote repository into
//! the in-cluster Git server.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use super::shared::Condition;

/// A repository to stand up on the in-cluster Git server.
///
/// Exactly one of the variants under [`GitRepositorySpec::source`] is active per
/// resource; which one is active is decided at decode time by the externally
/// tagged `source` enum below.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GitRepository",
    group = "adhar.io",
    version = "v1alpha1",
    namespaced,
    shortname = "gitrepo",
    status = "GitRepositoryStatus",
    printcolumn = r#"{"name":"Synced", "type":"boolean", "jsonPath":".status.synced"}"#,
    printcolumn = r#"{"name":"Internal URL", "type":"string", "jsonPath":".status.internalGitRepositoryUrl"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    /// What to materialise into the repository.
    pub source: GitRepositorySource,
    /// The in-cluster Git server this repository is pushed to.
    pub provider: GitProviderRef,
    /// Optional overlay applied after the source is copied in (e.g. a values file rename).
    #[serde(default)]
    pub customization: Option<Customization>,
    /// Credentials used to authenticate against `provider` and, for remote sources, the
    /// upstream repository. Required unless the Git server allows anonymous pushes.
    #[serde(default)]
    pub secret_ref: Option<GitCredentialsSecretRef>,
}

/// The content to materialise into the managed repository.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum GitRepositorySource {
    /// Copy an absolute directory already present on the operator's filesystem.
    Local {
        /// Absolute path to the directory to copy.
        path: String,
    },
    /// Clone a remote repository (optionally a sub-path of it) and normalise it.
    Remote {
        /// Clone URL, e.g. `https://github.com/org/repo.git`.
        url: String,
        /// Branch, tag, or commit hash to check out.
        #[serde(rename = "ref", default = "default_git_ref")]
        git_ref: String,
        /// Sub-path within the remote repository to copy, if only part of it is needed.
        #[serde(default)]
        sub_path: Option<String>,
        /// Recurse into submodules when cloning.
        #[serde(default)]
        clone_submodules: bool,
    },
    /// Reference content embedded in an already-materialised `CustomPackage` app file by
    /// symbolic name, rather than a filesystem path or remote URL.
    Embedded {
        /// Symbolic name of the application this repository was derived from.
        app_name: String,
    },
}

fn default_git_ref() -> String {
    "main".to_string()
}

/// Reference to the in-cluster Git server a repository is published to.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitProviderRef {
    /// Logical name of the server, e.g. `gitea`.
    pub name: String,
    /// Base URL reachable from outside the cluster.
    pub external_base_url: String,
    /// Base URL reachable from inside the cluster (cluster-DNS form).
    pub internal_base_url: String,
    /// Organisation / owner under which repositories are created.
    pub organisation: String,
}

/// An overlay applied to the materialised repository after content is copied in.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    /// Name of the customization (informational, surfaces in status/logs).
    pub name: String,
    /// Path, relative to the repository root, of the file the customization applies to.
    pub file_path: String,
}

/// Reference to a Secret carrying credentials for the Git server and, for remote
/// sources, the upstream repository.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitCredentialsSecretRef {
    /// Name of the Secret.
    pub name: String,
    /// Namespace of the Secret. Defaults to the `GitRepository`'s own namespace.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Observed state of a [`GitRepository`].
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositoryStatus {
    /// URL reachable from outside the cluster, empty until the repository exists.
    #[serde(default)]
    pub external_git_repository_url: String,
    /// URL reachable from inside the cluster, empty until the repository exists.
    #[serde(default)]
    pub internal_git_repository_url: String,
    /// Sub-path rendered into the repository, relative to its root.
    #[serde(default)]
    pub path: String,
    /// Latest commit pushed to the repository.
    #[serde(default)]
    pub latest_commit: Option<LatestCommit>,
    /// True once the repository has been created, populated, and pushed.
    #[serde(default)]
    pub synced: bool,
    /// Standard status conditions.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation last observed by the reconciler.
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// RFC 3339 timestamp of the last reconcile attempt.
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
}

/// The most recent commit pushed to the managed repository.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LatestCommit {
    /// Full commit hash.
    pub hash: String,
}
