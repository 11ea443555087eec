//! # Sync-Annotation Gate
//!
//! Every managed resource carries two annotations: `cli-start-time`, set once by
//! the CLI invocation that created it, and `last-observed-cli-start-time`, copied
//! onto it by this controller after every successful reconcile. A resource is
//! "current" only when the two agree; a mismatch means the controller has not yet
//! caught up with the CLI run that last touched the resource, or the resource is a
//! stale leftover from an older run.

use kube::api::{Api, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use crate::constants::{ANNOTATION_CLI_START_TIME, ANNOTATION_LAST_OBSERVED_CLI_START_TIME, FIELD_MANAGER};

/// True when `cli-start-time` and `last-observed-cli-start-time` agree, or when
/// `cli-start-time` is absent altogether (resources created outside the CLI, e.g.
/// directly with `kubectl apply`, are always considered current).
#[must_use]
pub fn is_current<K: Resource>(resource: &K) -> bool {
    let annotations = resource.meta().annotations.as_ref();
    let Some(start_time) = annotations.and_then(|a| a.get(ANNOTATION_CLI_START_TIME)) else {
        return true;
    };
    let observed = annotations.and_then(|a| a.get(ANNOTATION_LAST_OBSERVED_CLI_START_TIME));
    observed.is_some_and(|observed| observed == start_time)
}

/// Copy `cli-start-time` onto `last-observed-cli-start-time`, patched via a JSON
/// merge patch so other fields are untouched. A no-op if the resource carries no
/// `cli-start-time` at all.
///
/// # Errors
///
/// Returns a [`kube::Error`] if the patch request fails.
pub async fn mark_observed<K>(api: &Api<K>, resource: &K) -> kube::Result<()>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
{
    let name = resource.name_any();
    let Some(start_time) = resource
        .meta()
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_CLI_START_TIME))
    else {
        return Ok(());
    };

    let patch = serde_json::json!({
        "metadata": {
            "annotations": {
                ANNOTATION_LAST_OBSERVED_CLI_START_TIME: start_time,
            }
        }
    });
    api.patch(
        &name,
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}
