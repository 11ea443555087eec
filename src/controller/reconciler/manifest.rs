//! # Application / ApplicationSet Manifest Handling
//!
//! Decodes the single GitOps Application or ApplicationSet document embedded in a
//! `CustomPackage`'s referenced file, enumerates every `adhar://` source URL the
//! spec names explicitly (`source.repoURL`, `sources[*].repoURL`, generator
//! `git.repoURL`, matrix-nested `git.repoURL`, and the ApplicationSet template's
//! own source fields), and rewrites each in place once its `GitRepository` is
//! materialised. Helm `valuesObject` trees are resolved directly against the
//! Shorthand Resolver's base URLs via the Manifest Walker — they reference
//! arbitrary chart values, not GitOps source URLs, so they never get a
//! `GitRepository` of their own.

use serde::Deserialize;
use serde_json::Value;

use crate::crd::CustomPackageKind;
use crate::resolver::{self, ResolverBases};

use super::types::ReconcilerError;

/// The GitOps agent's API group; every embedded Application/ApplicationSet
/// document must belong to it.
const ARGOCD_GROUP: &str = "argoproj.io";

/// Decode `bytes` as YAML, requiring exactly one document whose `apiVersion`
/// belongs to the GitOps agent's group and whose `kind` matches `expected_kind`.
/// Additional documents in the file are ignored, per spec.
///
/// # Errors
///
/// Returns [`ReconcilerError::Validation`] if the file is empty, not valid YAML,
/// or its `apiVersion`/`kind` do not match.
pub fn parse_single_document(bytes: &[u8], expected_kind: CustomPackageKind) -> Result<Value, ReconcilerError> {
    let mut documents = serde_yaml::Deserializer::from_slice(bytes);
    let Some(first) = documents.next() else {
        return Err(ReconcilerError::Validation("application file is empty".to_string()));
    };
    let manifest: Value = serde_json::to_value(
        serde_yaml::Value::deserialize(first)
            .map_err(|e| ReconcilerError::Validation(format!("invalid YAML: {e}")))?,
    )
    .map_err(|e| ReconcilerError::Validation(format!("invalid YAML: {e}")))?;

    let api_version = manifest
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| ReconcilerError::Validation("manifest is missing `apiVersion`".to_string()))?;
    if !api_version.starts_with(&format!("{ARGOCD_GROUP}/")) {
        return Err(ReconcilerError::Validation(format!(
            "manifest apiVersion `{api_version}` is not in the `{ARGOCD_GROUP}` group"
        )));
    }

    let kind = manifest
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| ReconcilerError::Validation("manifest is missing `kind`".to_string()))?;
    if kind != expected_kind.as_str() {
        return Err(ReconcilerError::Validation(format!(
            "manifest kind `{kind}` does not match declared kind `{}`",
            expected_kind.as_str()
        )));
    }
    Ok(manifest)
}

/// The last `/`-separated segment of a shorthand's path, used to derive a
/// deterministic `GitRepository` name.
#[must_use]
pub fn shorthand_basename(shorthand: &str) -> &str {
    let path = shorthand.strip_prefix(crate::constants::SHORTHAND_SCHEME).unwrap_or(shorthand);
    path.rsplit('/').next().unwrap_or(path)
}

/// Collect JSON Pointers (relative to the whole manifest) of every `repoURL`
/// field that currently holds a shorthand value: `spec.source.repoURL`,
/// `spec.sources[*].repoURL`, ApplicationSet generator and matrix-nested
/// generator `git.repoURL`, and — for ApplicationSet — the embedded template's
/// own source fields under `spec.template.spec`.
#[must_use]
pub fn collect_shorthand_pointers(manifest: &Value, kind: CustomPackageKind) -> Vec<String> {
    let mut pointers = Vec::new();
    let Some(spec) = manifest.get("spec") else { return pointers };

    collect_source_pointers("/spec", spec, &mut pointers);

    if kind == CustomPackageKind::ApplicationSet {
        collect_generator_pointers(spec, &mut pointers);
        if let Some(template_spec) = spec.pointer("/template/spec") {
            collect_source_pointers("/spec/template/spec", template_spec, &mut pointers);
        }
    }
    pointers
}

fn collect_source_pointers(prefix: &str, spec: &Value, out: &mut Vec<String>) {
    if let Some(url) = spec.pointer("/source/repoURL").and_then(Value::as_str) {
        if resolver::contains_shorthand(url) {
            out.push(format!("{prefix}/source/repoURL"));
        }
    }
    if let Some(sources) = spec.get("sources").and_then(Value::as_array) {
        for (i, source) in sources.iter().enumerate() {
            if let Some(url) = source.get("repoURL").and_then(Value::as_str) {
                if resolver::contains_shorthand(url) {
                    out.push(format!("{prefix}/sources/{i}/repoURL"));
                }
            }
        }
    }
}

fn collect_generator_pointers(spec: &Value, out: &mut Vec<String>) {
    let Some(generators) = spec.get("generators").and_then(Value::as_array) else { return };
    for (i, generator) in generators.iter().enumerate() {
        if let Some(url) = generator.pointer("/git/repoURL").and_then(Value::as_str) {
            if resolver::contains_shorthand(url) {
                out.push(format!("/spec/generators/{i}/git/repoURL"));
            }
        }
        let Some(matrix_generators) = generator.pointer("/matrix/generators").and_then(Value::as_array) else {
            continue;
        };
        for (j, nested) in matrix_generators.iter().enumerate() {
            if let Some(url) = nested.pointer("/git/repoURL").and_then(Value::as_str) {
                if resolver::contains_shorthand(url) {
                    out.push(format!("/spec/generators/{i}/matrix/generators/{j}/git/repoURL"));
                }
            }
        }
    }
}

/// Read the current string value at `pointer`, if any.
#[must_use]
pub fn read_pointer<'a>(manifest: &'a Value, pointer: &str) -> Option<&'a str> {
    manifest.pointer(pointer).and_then(Value::as_str)
}

/// Overwrite the string value at `pointer` with `new_url`.
pub fn write_pointer(manifest: &mut Value, pointer: &str, new_url: &str) {
    if let Some(slot) = manifest.pointer_mut(pointer) {
        *slot = Value::String(new_url.to_string());
    }
}

/// Resolve every `helm.valuesObject` tree reachable from `spec` (and, for
/// ApplicationSet, `spec.template.spec`) against the Shorthand Resolver's base
/// URLs in place.
pub fn rewrite_values_objects(manifest: &mut Value, kind: CustomPackageKind, bases: &ResolverBases) {
    if let Some(spec) = manifest.get_mut("spec") {
        rewrite_values_objects_in_spec(spec, bases);
        if kind == CustomPackageKind::ApplicationSet {
            if let Some(template_spec) = spec.pointer_mut("/template/spec") {
                rewrite_values_objects_in_spec(template_spec, bases);
            }
        }
    }
}

fn rewrite_values_objects_in_spec(spec: &mut Value, bases: &ResolverBases) {
    if let Some(values) = spec.pointer_mut("/source/helm/valuesObject") {
        *values = crate::walker::rewrite_shorthand_urls(values, bases);
    }
    if let Some(sources) = spec.get_mut("sources").and_then(Value::as_array_mut) {
        for source in sources {
            if let Some(values) = source.pointer_mut("/helm/valuesObject") {
                *values = crate::walker::rewrite_shorthand_urls(values, bases);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_application_manifest() {
        let yaml = br"
apiVersion: argoproj.io/v1alpha1
kind: Application
spec:
  source:
    repoURL: adhar://packages/core/sample
";
        let manifest = parse_single_document(yaml, CustomPackageKind::Application).unwrap();
        assert_eq!(manifest["kind"], json!("Application"));
    }

    #[test]
    fn rejects_mismatched_kind() {
        let yaml = br"
apiVersion: argoproj.io/v1alpha1
kind: ApplicationSet
spec: {}
";
        assert!(parse_single_document(yaml, CustomPackageKind::Application).is_err());
    }

    #[test]
    fn rejects_empty_file() {
        assert!(parse_single_document(b"", CustomPackageKind::Application).is_err());
    }

    #[test]
    fn collects_single_source_pointer() {
        let manifest = json!({
            "kind": "Application",
            "spec": { "source": { "repoURL": "adhar://packages/core/sample" } }
        });
        let pointers = collect_shorthand_pointers(&manifest, CustomPackageKind::Application);
        assert_eq!(pointers, vec!["/spec/source/repoURL".to_string()]);
    }

    #[test]
    fn collects_multi_source_pointers_and_skips_external_urls() {
        let manifest = json!({
            "kind": "Application",
            "spec": {
                "sources": [
                    { "repoURL": "adhar://packages/core/sample" },
                    { "repoURL": "https://github.com/org/repo.git" }
                ]
            }
        });
        let pointers = collect_shorthand_pointers(&manifest, CustomPackageKind::Application);
        assert_eq!(pointers, vec!["/spec/sources/0/repoURL".to_string()]);
    }

    #[test]
    fn collects_matrix_nested_generator_pointer() {
        let manifest = json!({
            "kind": "ApplicationSet",
            "spec": {
                "generators": [
                    { "matrix": { "generators": [ { "git": { "repoURL": "adhar://packages/app/demo" } } ] } }
                ],
                "template": { "spec": {} }
            }
        });
        let pointers = collect_shorthand_pointers(&manifest, CustomPackageKind::ApplicationSet);
        assert_eq!(
            pointers,
            vec!["/spec/generators/0/matrix/generators/0/git/repoURL".to_string()]
        );
    }

    #[test]
    fn shorthand_basename_strips_scheme_and_path_prefix() {
        assert_eq!(shorthand_basename("adhar://packages/core/sample"), "sample");
        assert_eq!(shorthand_basename("adhar://application/demo"), "demo");
    }

    #[test]
    fn write_pointer_updates_in_place() {
        let mut manifest = json!({ "spec": { "source": { "repoURL": "adhar://packages/core/sample" } } });
        write_pointer(&mut manifest, "/spec/source/repoURL", "http://internal/repo");
        assert_eq!(manifest["spec"]["source"]["repoURL"], json!("http://internal/repo"));
    }

    #[test]
    fn rewrites_values_object_in_place() {
        let bases = ResolverBases {
            packages_base_url: "http://gitea/gitea_admin".to_string(),
            environments_base_url: "http://gitea/environments".to_string(),
        };
        let mut manifest = json!({
            "spec": { "source": { "helm": { "valuesObject": { "image": "adhar://packages/core/sample" } } } }
        });
        rewrite_values_objects(&mut manifest, CustomPackageKind::Application, &bases);
        assert_eq!(
            manifest["spec"]["source"]["helm"]["valuesObject"]["image"],
            json!("http://gitea/gitea_admin/packages/core/sample")
        );
    }
}
