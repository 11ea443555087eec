//! Adhar Platform Controller
//!
//! Kubernetes controllers that bootstrap a self-hosted GitOps stack: the
//! `GitRepository` controller materialises a local directory, a remote
//! repository, or embedded package content into a repository on the
//! in-cluster Git server, and the `CustomPackage` controller rewrites
//! `adhar://` shorthand URLs inside an ArgoCD `Application`/`ApplicationSet`
//! manifest to point at the `GitRepository` objects it creates on demand.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod git;
pub mod gitserver;
pub mod observability;
pub mod resolver;
pub mod runtime;
pub mod server;
pub mod walker;
