//! # Custom Resource Definitions
//!
//! The two resources this controller owns: [`GitRepository`], which materialises a
//! local directory or a remote repository into the in-cluster Git server, and
//! [`CustomPackage`], which rewrites an embedded ArgoCD Application/ApplicationSet
//! manifest so every `adhar://` source resolves to one of those `GitRepository`
//! objects before the manifest is applied.

mod git_repository;
mod custom_package;
mod shared;

pub use git_repository::{
    GitCredentialsSecretRef, GitProviderRef, GitRepository, GitRepositorySource,
    GitRepositorySpec, GitRepositoryStatus, LatestCommit,
};
pub use custom_package::{
    CustomPackage, CustomPackageKind, CustomPackageSpec, CustomPackageStatus, GitRepositoryRef,
    GitServerRef, RemoteRepositoryRef,
};
pub use shared::Condition;
