//! # GitRepository Reconciler
//!
//! Materialises a [`GitRepository`]'s `local`/`remote`/`embedded` source into a
//! repository on the in-cluster Git server and reports its internal/external URLs
//! and latest commit hash in status.

use std::sync::Arc;

use kube::api::{Api, Patch, PatchParams};
use kube::runtime::events::{Event, EventType, Recorder};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use tracing::{instrument, warn};

use crate::constants::FIELD_MANAGER;
use crate::controller::annotations;
use crate::crd::{Condition, GitRepository, GitRepositorySource, GitRepositoryStatus, LatestCommit};
use crate::git;
use crate::git::credentials::load_git_credentials;
use crate::git::worktree;
use crate::observability::metrics;

use super::types::{resource_key, ReconcilerError, SharedReconcilerState};

/// `reconcile()` entry point registered with `kube_runtime::Controller` for
/// [`GitRepository`].
#[instrument(skip(resource, ctx), fields(name = %resource.name_any(), namespace = %resource.namespace().unwrap_or_default()))]
pub async fn reconcile(
    resource: Arc<GitRepository>,
    ctx: Arc<SharedReconcilerState>,
) -> Result<Action, ReconcilerError> {
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_else(|| "default".to_string());
    let key = resource_key("git-repository", &namespace, &name);
    metrics::increment_reconciliations("git-repository");

    let result = reconcile_inner(&resource, &ctx, &namespace, &name).await;

    let api: Api<GitRepository> = Api::namespaced(ctx.client.clone(), &namespace);
    let recorder = Recorder::new(ctx.client.clone(), ctx.reporter.clone(), resource.object_ref(&()));
    match result {
        Ok(status) => {
            write_status(&api, &name, status).await?;
            annotations::mark_observed(&api, &resource).await?;
            crate::controller::error_policy::reset_backoff(&key, &ctx.backoff_states);
            metrics::increment_git_repositories_synced();
            recorder
                .publish(Event {
                    type_: EventType::Normal,
                    reason: "Materialised".to_string(),
                    note: Some(format!("repository content for {namespace}/{name} is up to date")),
                    action: "Reconciling".to_string(),
                    secondary: None,
                })
                .await
                .ok();
            Ok(Action::requeue(ctx.config.reconcile_requeue_duration()))
        }
        Err(error) => {
            warn!("GitRepository {namespace}/{name} materialisation failed: {error}");
            let failed_status = GitRepositoryStatus {
                synced: false,
                conditions: vec![Condition::ready(false, "MaterialiseFailed", error.to_string())],
                ..GitRepositoryStatus::default()
            };
            write_status(&api, &name, failed_status).await.ok();
            recorder
                .publish(Event {
                    type_: EventType::Warning,
                    reason: "MaterialiseFailed".to_string(),
                    note: Some(error.to_string()),
                    action: "Reconciling".to_string(),
                    secondary: None,
                })
                .await
                .ok();
            Err(error)
        }
    }
}

async fn reconcile_inner(
    resource: &GitRepository,
    ctx: &Arc<SharedReconcilerState>,
    namespace: &str,
    name: &str,
) -> Result<GitRepositoryStatus, ReconcilerError> {
    let spec = &resource.spec;
    let lock_key = source_lock_key(&spec.source);

    let scratch_base = ctx.config.scratch_dir.join("git-repository");
    let scratch_dir = git::cache_path(&scratch_base, namespace, name, &lock_key);
    let entry = ctx.repo_locks.load_or_store(&lock_key, scratch_dir.clone()).await;
    let _guard = entry.mutex.lock().await;

    let credentials = load_git_credentials(&ctx.client, spec.secret_ref.as_ref(), namespace).await?;

    let repo_name = name.to_string();
    let server_client = ctx.git_server_client(&spec.provider.internal_base_url);
    server_client
        .ensure_repository(&spec.provider.organisation, &repo_name, credentials.as_ref())
        .await?;

    let internal_repo_url = format!(
        "{}/{}/{repo_name}",
        spec.provider.internal_base_url.trim_end_matches('/'),
        spec.provider.organisation
    );
    let external_repo_url = format!(
        "{}/{}/{repo_name}",
        spec.provider.external_base_url.trim_end_matches('/'),
        spec.provider.organisation
    );
    let push_url = format!("{internal_repo_url}.git");

    worktree::init_local_worktree(&entry.dir, &push_url).await?;

    let mut rendered_path = String::new();
    match &spec.source {
        GitRepositorySource::Local { path } => {
            let source_path = std::path::Path::new(path);
            if !source_path.is_absolute() {
                return Err(ReconcilerError::Validation(format!("local source path `{path}` must be absolute")));
            }
            if !source_path.exists() {
                return Err(ReconcilerError::Validation(format!("local source path `{path}` does not exist")));
            }
            worktree::copy_subtree(source_path, None, &entry.dir, true).await?;
        }
        GitRepositorySource::Remote { url, git_ref, sub_path, clone_submodules } => {
            let remote_scratch = ctx.config.scratch_dir.join("remote-source").join(format!("{namespace}-{name}"));
            worktree::clone_remote_to_dir(url, git_ref, &remote_scratch, credentials.as_ref(), *clone_submodules)
                .await?;
            worktree::copy_subtree(&remote_scratch, sub_path.as_deref(), &entry.dir, true).await?;
            if let Some(sub) = sub_path {
                rendered_path.clone_from(sub);
            }
        }
        GitRepositorySource::Embedded { app_name } => {
            let staged_dir = ctx.config.scratch_dir.join("embedded").join(sanitize_component(app_name));
            if !staged_dir.exists() {
                return Err(ReconcilerError::Validation(format!(
                    "no embedded content staged yet for app `{app_name}`"
                )));
            }
            worktree::copy_subtree(&staged_dir, None, &entry.dir, true).await?;
        }
    }

    // spec.customization is not yet applied to the worktree content — see DESIGN.md.

    let message = format!("sync {repo_name} from {}", namespace);
    let pushed_commit = worktree::commit_and_push(&entry.dir, &push_url, credentials.as_ref(), &message)
        .await?;

    git::prune_old_revisions(&scratch_base, namespace, name).await.ok();

    let latest_commit = match pushed_commit {
        Some(hash) => Some(LatestCommit { hash }),
        None => resource.status.as_ref().and_then(|s| s.latest_commit.clone()),
    };

    Ok(GitRepositoryStatus {
        external_git_repository_url: external_repo_url,
        internal_git_repository_url: internal_repo_url,
        path: rendered_path,
        latest_commit,
        synced: true,
        conditions: vec![Condition::ready(true, "Materialised", "repository content is up to date")],
        observed_generation: resource.meta().generation,
        last_reconcile_time: Some(chrono::Utc::now().to_rfc3339()),
    })
}

fn source_lock_key(source: &GitRepositorySource) -> String {
    match source {
        GitRepositorySource::Local { path } => path.clone(),
        GitRepositorySource::Remote { url, .. } => url.clone(),
        GitRepositorySource::Embedded { app_name } => format!("embedded:{app_name}"),
    }
}

fn sanitize_component(value: &str) -> String {
    value.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }).collect()
}

async fn write_status(api: &Api<GitRepository>, name: &str, status: GitRepositoryStatus) -> Result<(), ReconcilerError> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}
