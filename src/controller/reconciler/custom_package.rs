//! # CustomPackage Reconciler
//!
//! Reads a `CustomPackage`'s referenced Application/ApplicationSet manifest,
//! materialises every `adhar://` source it names as a [`GitRepository`], rewrites
//! those source URLs to the resulting internal server URL, and upserts the
//! resulting manifest as the downstream GitOps resource.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::core::{ApiResource, GroupVersionKind};
use kube::runtime::events::{Event, EventType, Recorder};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::constants::{FIELD_MANAGER, LABEL_PACKAGE_NAME, LABEL_PACKAGE_TYPE};
use crate::controller::annotations;
use crate::crd::{
    Condition, CustomPackage, CustomPackageKind, CustomPackageStatus, GitProviderRef,
    GitRepository, GitRepositoryRef, GitRepositorySource, GitRepositorySpec,
};
use crate::git::credentials::load_git_credentials;
use crate::git::worktree;
use crate::observability::metrics;
use crate::resolver;

use super::manifest;
use super::types::{resource_key, ReconcilerError, SharedReconcilerState};

const ARGOCD_GROUP: &str = "argoproj.io";
const ARGOCD_VERSION: &str = "v1alpha1";

/// `reconcile()` entry point registered with `kube_runtime::Controller` for
/// [`CustomPackage`].
#[instrument(skip(resource, ctx), fields(name = %resource.name_any(), namespace = %resource.namespace().unwrap_or_default()))]
pub async fn reconcile(
    resource: Arc<CustomPackage>,
    ctx: Arc<SharedReconcilerState>,
) -> Result<Action, ReconcilerError> {
    let name = resource.name_any();
    let namespace = resource.namespace().unwrap_or_else(|| "default".to_string());
    let key = resource_key("custom-package", &namespace, &name);
    metrics::increment_reconciliations("custom-package");

    let result = reconcile_inner(&resource, &ctx, &namespace, &name).await;

    let api: Api<CustomPackage> = Api::namespaced(ctx.client.clone(), &namespace);
    let recorder = Recorder::new(ctx.client.clone(), ctx.reporter.clone(), resource.object_ref(&()));
    match result {
        Ok(status) => {
            write_status(&api, &name, status.clone()).await?;
            annotations::mark_observed(&api, &resource).await?;
            crate::controller::error_policy::reset_backoff(&key, &ctx.backoff_states);
            if status.synced {
                metrics::increment_custom_packages_synced();
            }
            recorder
                .publish(Event {
                    type_: if status.synced { EventType::Normal } else { EventType::Warning },
                    reason: if status.synced { "Converged".to_string() } else { "WaitingForGitRepository".to_string() },
                    note: Some(if status.synced {
                        format!("all {} referenced repositories are synced", status.git_repository_refs.len())
                    } else {
                        format!("waiting for one or more of {} referenced repositories", status.git_repository_refs.len())
                    }),
                    action: "Reconciling".to_string(),
                    secondary: None,
                })
                .await
                .ok();
            Ok(Action::requeue(ctx.config.reconcile_requeue_duration()))
        }
        Err(error) => {
            warn!("CustomPackage {namespace}/{name} reconcile failed: {error}");
            let failed = CustomPackageStatus {
                synced: false,
                conditions: vec![Condition::ready(false, "ReconcileFailed", error.to_string())],
                ..CustomPackageStatus::default()
            };
            write_status(&api, &name, failed).await.ok();
            recorder
                .publish(Event {
                    type_: EventType::Warning,
                    reason: "ReconcileFailed".to_string(),
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
    resource: &CustomPackage,
    ctx: &Arc<SharedReconcilerState>,
    namespace: &str,
    name: &str,
) -> Result<CustomPackageStatus, ReconcilerError> {
    let spec = &resource.spec;

    let file_bytes = read_app_file(resource, ctx, namespace, name).await?;
    let mut document = manifest::parse_single_document(&file_bytes, spec.kind)?;

    manifest::rewrite_values_objects(&mut document, spec.kind, &ctx.resolver_bases);

    let pointers = manifest::collect_shorthand_pointers(&document, spec.kind);
    let uid_suffix = uid_suffix(resource);

    let git_repo_api: Api<GitRepository> = Api::namespaced(ctx.client.clone(), namespace);
    let mut refs = Vec::with_capacity(pointers.len());
    let mut all_synced = true;

    for pointer in &pointers {
        let Some(shorthand) = manifest::read_pointer(&document, pointer).map(str::to_string) else {
            continue;
        };
        let basename = manifest::shorthand_basename(&shorthand);
        let repo_name = format!("{name}-{basename}-{uid_suffix}");

        let repo_spec = build_git_repository_spec(&shorthand, basename, spec.replicate, &spec.git_server, resource, ctx);
        let git_repo = upsert_git_repository(&git_repo_api, &repo_name, namespace, repo_spec).await?;

        let internal_url = git_repo.status.as_ref().map(|s| s.internal_git_repository_url.clone()).filter(|u| !u.is_empty());
        if let Some(internal_url) = &internal_url {
            manifest::write_pointer(&mut document, pointer, internal_url);
        } else {
            all_synced = false;
        }

        refs.push(GitRepositoryRef {
            name: repo_name,
            namespace: namespace.to_string(),
            uid: git_repo.meta().uid.clone(),
        });
    }

    set_package_labels(&mut document, name, "custom");
    upsert_downstream_object(ctx, namespace, spec.kind, &document).await?;

    Ok(CustomPackageStatus {
        synced: all_synced,
        git_repository_refs: refs,
        conditions: vec![Condition::ready(
            all_synced,
            if all_synced { "Converged" } else { "WaitingForGitRepository" },
            if all_synced {
                "all referenced repositories are synced".to_string()
            } else {
                "waiting for one or more GitRepository resources to report synced=true".to_string()
            },
        )],
        observed_generation: resource.meta().generation,
        last_reconcile_time: Some(chrono::Utc::now().to_rfc3339()),
    })
}

async fn read_app_file(
    resource: &CustomPackage,
    ctx: &Arc<SharedReconcilerState>,
    namespace: &str,
    _name: &str,
) -> Result<Vec<u8>, ReconcilerError> {
    let spec = &resource.spec;
    let Some(remote) = &spec.remote_repository else {
        return Ok(tokio::fs::read(&spec.app_file_path)
            .await
            .map_err(crate::git::error::GitOpsError::from)?);
    };

    let credentials = load_git_credentials(&ctx.client, None, namespace).await?;
    let scratch_base = ctx.config.scratch_dir.join("custom-package-source");
    let scratch_dir = crate::git::cache_path(&scratch_base, namespace, &remote.url, &remote.git_ref);
    let entry = ctx.repo_locks.load_or_store(&remote.url, scratch_dir).await;
    let _guard = entry.mutex.lock().await;

    worktree::clone_remote_to_dir(&remote.url, &remote.git_ref, &entry.dir, credentials.as_ref(), false).await?;

    let base = match &remote.sub_path {
        Some(sub) => entry.dir.join(sub),
        None => entry.dir.clone(),
    };
    Ok(worktree::read_file(&base, &spec.app_file_path).await?)
}

fn uid_suffix(resource: &CustomPackage) -> String {
    let uid = resource.meta().uid.clone().unwrap_or_else(|| resource.name_any());
    let mut hasher = DefaultHasher::new();
    uid.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}

/// Decide whether a shorthand's content should be replicated from a local
/// directory or cloned from a remote. The Shorthand Resolver's configured base
/// URLs double as either an HTTP(S) git-server base or a local filesystem root,
/// depending on deployment mode; whichever it resolves to decides the branch.
fn build_git_repository_spec(
    shorthand: &str,
    basename: &str,
    replicate: bool,
    git_server: &crate::crd::GitServerRef,
    resource: &CustomPackage,
    ctx: &Arc<SharedReconcilerState>,
) -> GitRepositorySpec {
    let resolved = resolver::resolve(shorthand, &ctx.resolver_bases);
    let is_remote_url = resolved.starts_with("http://") || resolved.starts_with("https://");

    let source = if is_remote_url {
        GitRepositorySource::Remote {
            url: resolved,
            git_ref: "main".to_string(),
            sub_path: None,
            clone_submodules: false,
        }
    } else if replicate {
        GitRepositorySource::Local { path: resolved }
    } else {
        GitRepositorySource::Remote {
            url: format!(
                "{}/{}/{basename}.git",
                git_server.internal_base_url.trim_end_matches('/'),
                git_server.organisation
            ),
            git_ref: "main".to_string(),
            sub_path: None,
            clone_submodules: false,
        }
    };

    GitRepositorySpec {
        source,
        provider: GitProviderRef {
            name: git_server.name.clone(),
            external_base_url: git_server.external_base_url.clone(),
            internal_base_url: git_server.internal_base_url.clone(),
            organisation: git_server.organisation.clone(),
        },
        customization: None,
        secret_ref: resource.spec.remote_repository.as_ref().map(|_| crate::crd::GitCredentialsSecretRef {
            name: format!("{}-git-credentials", git_server.name),
            namespace: None,
        }),
    }
}

async fn upsert_git_repository(
    api: &Api<GitRepository>,
    name: &str,
    namespace: &str,
    spec: GitRepositorySpec,
) -> Result<GitRepository, ReconcilerError> {
    match api.get(name).await {
        Ok(mut existing) => {
            existing.spec = spec;
            let patch = serde_json::json!({ "spec": existing.spec });
            let updated = api
                .patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(&patch))
                .await?;
            Ok(updated)
        }
        Err(kube::Error::Api(e)) if e.code == 404 => {
            let mut object = GitRepository::new(name, spec);
            object.meta_mut().namespace = Some(namespace.to_string());
            let created = api.create(&kube::api::PostParams::default(), &object).await?;
            Ok(created)
        }
        Err(e) => Err(e.into()),
    }
}

fn set_package_labels(document: &mut Value, package_name: &str, package_type: &str) {
    let labels = document
        .pointer_mut("/metadata")
        .and_then(|m| m.as_object_mut())
        .map(|metadata| metadata.entry("labels").or_insert_with(|| Value::Object(serde_json::Map::new())));
    if let Some(labels) = labels.and_then(Value::as_object_mut) {
        labels.insert(LABEL_PACKAGE_NAME.to_string(), Value::String(package_name.to_string()));
        labels.insert(LABEL_PACKAGE_TYPE.to_string(), Value::String(package_type.to_string()));
    }
}

async fn upsert_downstream_object(
    ctx: &Arc<SharedReconcilerState>,
    namespace: &str,
    kind: CustomPackageKind,
    document: &Value,
) -> Result<(), ReconcilerError> {
    let name = document
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .ok_or_else(|| ReconcilerError::Validation("manifest is missing metadata.name".to_string()))?
        .to_string();

    let gvk = GroupVersionKind::gvk(ARGOCD_GROUP, ARGOCD_VERSION, kind.as_str());
    let api_resource = ApiResource::from_gvk(&gvk);
    let api: Api<DynamicObject> = Api::namespaced_with(ctx.client.clone(), namespace, &api_resource);

    let mut object: DynamicObject = serde_json::from_value(document.clone())
        .map_err(|e| ReconcilerError::Validation(format!("failed to build downstream object: {e}")))?;
    object.metadata.namespace = Some(namespace.to_string());
    object.types = Some(kube::core::TypeMeta {
        api_version: format!("{ARGOCD_GROUP}/{ARGOCD_VERSION}"),
        kind: kind.as_str().to_string(),
    });

    let patch = serde_json::to_value(&object)
        .map_err(|e| ReconcilerError::Validation(format!("failed to serialise downstream object: {e}")))?;
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(&patch))
        .await?;
    Ok(())
}

async fn write_status(api: &Api<CustomPackage>, name: &str, status: CustomPackageStatus) -> Result<(), ReconcilerError> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}
