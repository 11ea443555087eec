//! Covers the transient-Git-server-outage scenario: repeated reconcile failures
//! against the same resource key grow that resource's Fibonacci backoff and leave
//! every other resource's backoff untouched, and a subsequent success resets it.

#[path = "common/mod.rs"]
mod common;

use std::collections::HashMap;
use std::sync::Mutex;

use adhar_platform_controller::config::ControllerConfig;
use adhar_platform_controller::controller::error_policy::{handle_reconciliation_error, reset_backoff};
use adhar_platform_controller::controller::reconciler::{BackoffState, ReconcilerError};
use adhar_platform_controller::git::error::GitOpsError;

fn config() -> ControllerConfig {
    ControllerConfig { backoff_min_secs: 1, backoff_max_secs: 20, ..ControllerConfig::default() }
}

fn transient_error() -> ReconcilerError {
    ReconcilerError::Git(GitOpsError::CommandFailed {
        command: "push".to_string(),
        status: "exit 128".to_string(),
        stderr: "unable to connect to git server".to_string(),
    })
}

#[test]
fn repeated_failures_grow_backoff_for_that_resource_only() {
    common::init_rustls();
    let config = config();
    let states: Mutex<HashMap<String, BackoffState>> = Mutex::new(HashMap::new());
    let error = transient_error();

    handle_reconciliation_error("git-repository", "demo/flaky-repo", &error, &states, &config);
    handle_reconciliation_error("git-repository", "demo/flaky-repo", &error, &states, &config);
    handle_reconciliation_error("git-repository", "demo/flaky-repo", &error, &states, &config);
    handle_reconciliation_error("git-repository", "demo/other-repo", &error, &states, &config);

    let states = states.lock().unwrap();
    let flaky = states.get("demo/flaky-repo").expect("flaky-repo should have backoff state");
    let other = states.get("demo/other-repo").expect("other-repo should have backoff state");

    assert_eq!(flaky.error_count, 3);
    assert_eq!(other.error_count, 1);
}

#[test]
fn backoff_is_capped_at_configured_max() {
    common::init_rustls();
    let config = config();
    let states: Mutex<HashMap<String, BackoffState>> = Mutex::new(HashMap::new());
    let error = transient_error();

    for _ in 0..20 {
        handle_reconciliation_error("git-repository", "demo/persistently-down", &error, &states, &config);
    }

    let next = {
        let mut states = states.lock().unwrap();
        let state = states.get_mut("demo/persistently-down").unwrap();
        state.backoff.next_backoff_seconds()
    };
    assert!(next <= config.backoff_max_secs, "backoff {next}s exceeded configured max {}s", config.backoff_max_secs);
}

#[test]
fn a_successful_reconcile_resets_backoff_for_next_failure() {
    common::init_rustls();
    let config = config();
    let states: Mutex<HashMap<String, BackoffState>> = Mutex::new(HashMap::new());
    let error = transient_error();

    handle_reconciliation_error("git-repository", "demo/recovering-repo", &error, &states, &config);
    handle_reconciliation_error("git-repository", "demo/recovering-repo", &error, &states, &config);
    reset_backoff("demo/recovering-repo", &states);

    let error_count_after_reset = states.lock().unwrap().get("demo/recovering-repo").unwrap().error_count;
    assert_eq!(error_count_after_reset, 0);

    handle_reconciliation_error("git-repository", "demo/recovering-repo", &error, &states, &config);
    let error_count_after_next_failure = states.lock().unwrap().get("demo/recovering-repo").unwrap().error_count;
    assert_eq!(error_count_after_next_failure, 1);
}
