//! `CustomPackage` — resolves an embedded ArgoCD Application/ApplicationSet manifest's
//! `adhar://` source URLs into managed `GitRepository` objects and upserts the
//! resulting manifest.

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use super::shared::Condition;

/// Declares one GitOps Application or ApplicationSet to stand up.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "CustomPackage",
    group = "adhar.io",
    version = "v1alpha1",
    namespaced,
    shortname = "cpkg",
    status = "CustomPackageStatus",
    printcolumn = r#"{"name":"Synced", "type":"boolean", "jsonPath":".status.synced"}"#,
    printcolumn = r#"{"name":"Kind", "type":"string", "jsonPath":".spec.kind"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CustomPackageSpec {
    /// Path to the YAML file containing exactly one Application or ApplicationSet.
    /// Resolved against the local filesystem unless `remoteRepository` is set, in
    /// which case it is resolved against the clone of that repository.
    pub app_file_path: String,
    /// Declared ArgoCD kind of the manifest at `appFilePath`.
    pub kind: CustomPackageKind,
    /// In-cluster Git server that materialised `GitRepository` objects are published to.
    pub git_server: GitServerRef,
    /// Remote repository the application file itself is fetched from. When absent,
    /// `appFilePath` is read from the operator's local filesystem.
    #[serde(default)]
    pub remote_repository: Option<RemoteRepositoryRef>,
    /// Whether local/remote content referenced by a shorthand source should be copied
    /// (`local`) verbatim or always cloned on demand (`remote`). See
    /// `GitRepository Source` selection in the reconciler for the exact effect.
    #[serde(default = "default_replicate")]
    pub replicate: bool,
}

fn default_replicate() -> bool {
    true
}

/// The ArgoCD kind embedded at `appFilePath`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum CustomPackageKind {
    Application,
    ApplicationSet,
}

impl CustomPackageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "Application",
            Self::ApplicationSet => "ApplicationSet",
        }
    }
}

/// The in-cluster Git server `GitRepository` objects derived from this package are
/// published to.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitServerRef {
    /// Logical name of the server, e.g. `gitea`.
    pub name: String,
    /// Base URL reachable from outside the cluster.
    pub external_base_url: String,
    /// Base URL reachable from inside the cluster (cluster-DNS form).
    pub internal_base_url: String,
    /// Organisation / owner under which repositories are created.
    pub organisation: String,
}

/// A remote repository the application file itself should be fetched from.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRepositoryRef {
    /// Clone URL.
    pub url: String,
    /// Branch, tag, or commit hash to check out.
    #[serde(rename = "ref", default = "default_git_ref")]
    pub git_ref: String,
    /// Sub-path within the remote repository containing `appFilePath`.
    #[serde(default)]
    pub sub_path: Option<String>,
}

fn default_git_ref() -> String {
    "main".to_string()
}

/// Observed state of a [`CustomPackage`].
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomPackageStatus {
    /// True once every referenced `GitRepository` reports `synced=true` and the
    /// downstream Application/ApplicationSet has been upserted.
    #[serde(default)]
    pub synced: bool,
    /// Back-references to the `GitRepository` objects created for this package.
    #[serde(default)]
    pub git_repository_refs: Vec<GitRepositoryRef>,
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

/// Pointer to a `GitRepository` created on behalf of a [`CustomPackage`].
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositoryRef {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub uid: Option<String>,
}
