//! Decode coverage for the two CRDs' spec/status types, catching schema drift
//! between the Rust structs and the YAML shapes the CLI and ArgoCD operators emit.

#[path = "common/mod.rs"]
mod common;

use adhar_platform_controller::crd::{CustomPackage, CustomPackageKind, GitRepository, GitRepositorySource};

#[test]
fn git_repository_decodes_a_local_source() {
    common::init_rustls();
    let yaml = r#"
apiVersion: adhar.io/v1alpha1
kind: GitRepository
metadata:
  name: local-source-repo
  namespace: adhar-system
spec:
  source:
    type: local
    path: /srv/adhar/packages/core/ingress-nginx
  provider:
    name: gitea
    externalBaseUrl: https://git.adhar.example.com
    internalBaseUrl: http://gitea-http.gitea.svc.cluster.local:3000
    organisation: gitea_admin
"#;
    let repo: GitRepository = serde_yaml::from_str(yaml).expect("GitRepository with a local source should decode");
    match &repo.spec.source {
        GitRepositorySource::Local { path } => assert_eq!(path, "/srv/adhar/packages/core/ingress-nginx"),
        other => panic!("expected Local source, got {other:?}"),
    }
    assert_eq!(repo.spec.provider.organisation, "gitea_admin");
}

#[test]
fn git_repository_decodes_a_remote_source_with_defaults() {
    common::init_rustls();
    let yaml = r#"
apiVersion: adhar.io/v1alpha1
kind: GitRepository
metadata:
  name: remote-source-repo
  namespace: adhar-system
spec:
  source:
    type: remote
    url: https://github.com/org/chart.git
    gitRef: main
  provider:
    name: gitea
    externalBaseUrl: https://git.adhar.example.com
    internalBaseUrl: http://gitea-http.gitea.svc.cluster.local:3000
    organisation: gitea_admin
"#;
    let repo: GitRepository = serde_yaml::from_str(yaml).expect("GitRepository with a remote source should decode");
    match &repo.spec.source {
        GitRepositorySource::Remote { url, git_ref, sub_path, clone_submodules } => {
            assert_eq!(url, "https://github.com/org/chart.git");
            assert_eq!(git_ref, "main");
            assert!(sub_path.is_none());
            assert!(!clone_submodules);
        }
        other => panic!("expected Remote source, got {other:?}"),
    }
}

#[test]
fn custom_package_decodes_with_default_replicate_true() {
    common::init_rustls();
    let yaml = r#"
apiVersion: adhar.io/v1alpha1
kind: CustomPackage
metadata:
  name: ingress-nginx
  namespace: adhar-system
spec:
  appFilePath: /srv/adhar/packages/core/ingress-nginx/application.yaml
  kind: Application
  gitServer:
    name: gitea
    externalBaseUrl: https://git.adhar.example.com
    internalBaseUrl: http://gitea-http.gitea.svc.cluster.local:3000
    organisation: gitea_admin
"#;
    let package: CustomPackage = serde_yaml::from_str(yaml).expect("CustomPackage should decode");
    assert_eq!(package.spec.kind, CustomPackageKind::Application);
    assert!(package.spec.replicate, "replicate should default to true when absent");
    assert!(package.spec.remote_repository.is_none());
}

#[test]
fn custom_package_decodes_an_application_set_with_a_remote_repository_source() {
    common::init_rustls();
    let yaml = r#"
apiVersion: adhar.io/v1alpha1
kind: CustomPackage
metadata:
  name: cluster-fleet
  namespace: adhar-system
spec:
  appFilePath: applicationsets/fleet.yaml
  kind: ApplicationSet
  replicate: false
  remoteRepository:
    url: https://github.com/org/platform-manifests.git
    ref: release-1.0
    subPath: clusters
  gitServer:
    name: gitea
    externalBaseUrl: https://git.adhar.example.com
    internalBaseUrl: http://gitea-http.gitea.svc.cluster.local:3000
    organisation: gitea_admin
"#;
    let package: CustomPackage = serde_yaml::from_str(yaml).expect("CustomPackage with ApplicationSet should decode");
    assert_eq!(package.spec.kind, CustomPackageKind::ApplicationSet);
    assert!(!package.spec.replicate);
    let remote = package.spec.remote_repository.expect("remoteRepository should be present");
    assert_eq!(remote.git_ref, "release-1.0");
    assert_eq!(remote.sub_path.as_deref(), Some("clusters"));
}
