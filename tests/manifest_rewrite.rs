//! End-to-end coverage of the Application/ApplicationSet manifest pipeline: decode,
//! enumerate `adhar://` source pointers, and rewrite them once resolved, the way
//! the `CustomPackage` reconciler composes these steps.

use adhar_platform_controller::controller::reconciler::manifest;
use adhar_platform_controller::crd::CustomPackageKind;
use adhar_platform_controller::resolver::ResolverBases;
use serde_json::json;

#[path = "common/mod.rs"]
mod common;

fn bases() -> ResolverBases {
    ResolverBases {
        packages_base_url: "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin".to_string(),
        environments_base_url: "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/environments"
            .to_string(),
    }
}

#[test]
fn single_source_application_rewrites_repo_url() {
    common::init_rustls();
    let yaml = br"
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: sample-app
spec:
  source:
    repoURL: adhar://packages/core/ingress-nginx
    path: charts/ingress-nginx
";
    let mut manifest = manifest::parse_single_document(yaml, CustomPackageKind::Application).unwrap();
    let pointers = manifest::collect_shorthand_pointers(&manifest, CustomPackageKind::Application);
    assert_eq!(pointers, vec!["/spec/source/repoURL".to_string()]);

    manifest::write_pointer(&mut manifest, &pointers[0], "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/sample-app-ingress-nginx-deadbeef");
    assert_eq!(
        manifest["spec"]["source"]["repoURL"],
        json!("http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/sample-app-ingress-nginx-deadbeef")
    );
    assert_eq!(manifest["spec"]["path"], json!("charts/ingress-nginx"));
}

#[test]
fn multi_source_application_enumerates_every_repo_url_independently() {
    common::init_rustls();
    let yaml = br"
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: multi-source-app
spec:
  sources:
    - repoURL: adhar://packages/core/ingress-nginx
      path: charts
    - repoURL: https://github.com/external/chart.git
      path: .
    - repoURL: adhar://environments/dev/cluster-config
      path: .
";
    let manifest = manifest::parse_single_document(yaml, CustomPackageKind::Application).unwrap();
    let pointers = manifest::collect_shorthand_pointers(&manifest, CustomPackageKind::Application);

    assert_eq!(
        pointers,
        vec!["/spec/sources/0/repoURL".to_string(), "/spec/sources/2/repoURL".to_string()]
    );
}

#[test]
fn application_set_matrix_generator_sources_are_found_at_every_nesting_level() {
    common::init_rustls();
    let yaml = br"
apiVersion: argoproj.io/v1alpha1
kind: ApplicationSet
metadata:
  name: matrix-appset
spec:
  generators:
    - git:
        repoURL: adhar://packages/core/top-level-generator
        directories:
          - path: clusters/*
    - matrix:
        generators:
          - git:
              repoURL: adhar://packages/application/nested-generator
              directories:
                - path: envs/*
  template:
    spec:
      source:
        repoURL: adhar://packages/core/template-source
";
    let manifest = manifest::parse_single_document(yaml, CustomPackageKind::ApplicationSet).unwrap();
    let pointers = manifest::collect_shorthand_pointers(&manifest, CustomPackageKind::ApplicationSet);

    assert_eq!(
        pointers,
        vec![
            "/spec/generators/0/git/repoURL".to_string(),
            "/spec/generators/1/matrix/generators/0/git/repoURL".to_string(),
            "/spec/template/spec/source/repoURL".to_string(),
        ]
    );
}

#[test]
fn helm_values_object_is_resolved_directly_without_a_git_repository() {
    common::init_rustls();
    let yaml = br"
apiVersion: argoproj.io/v1alpha1
kind: Application
metadata:
  name: helm-values-app
spec:
  source:
    repoURL: https://github.com/org/charts.git
    helm:
      valuesObject:
        image:
          repository: adhar://packages/core/sample-image
        nested:
          list:
            - adhar://environments/dev/feature-flags
            - plain-string
";
    let mut manifest = manifest::parse_single_document(yaml, CustomPackageKind::Application).unwrap();

    let pointers_before = manifest::collect_shorthand_pointers(&manifest, CustomPackageKind::Application);
    assert!(pointers_before.is_empty(), "helm.valuesObject must not produce a GitRepository pointer");

    manifest::rewrite_values_objects(&mut manifest, CustomPackageKind::Application, &bases());

    assert_eq!(
        manifest["spec"]["source"]["helm"]["valuesObject"]["image"]["repository"],
        json!("http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/packages/core/sample-image")
    );
    assert_eq!(
        manifest["spec"]["source"]["helm"]["valuesObject"]["nested"]["list"][0],
        json!("http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/environments/dev/feature-flags")
    );
    assert_eq!(manifest["spec"]["source"]["helm"]["valuesObject"]["nested"]["list"][1], json!("plain-string"));
}
