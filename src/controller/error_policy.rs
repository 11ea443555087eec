//! # Error Policy
//!
//! Backoff and watch-stream error classification shared by both reconcile loops.

use std::sync::Arc;

use kube_runtime::controller::Action;
use tracing::{error, info, warn};

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::types::{BackoffState, ReconcilerError};
use crate::observability::metrics;

/// Compute the next requeue `Action` for a failed reconcile of `resource_key`
/// (`namespace/name`), advancing that resource's Fibonacci backoff. Other
/// resources' backoff state is untouched.
pub fn handle_reconciliation_error(
    controller: &str,
    resource_key: &str,
    error: &ReconcilerError,
    backoff_states: &std::sync::Mutex<std::collections::HashMap<String, BackoffState>>,
    config: &ControllerConfig,
) -> Action {
    error!("reconciliation error for {}: {}", resource_key, error);
    metrics::increment_reconciliation_errors(controller);

    let backoff_seconds = match backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(resource_key.to_string()).or_insert_with(|| BackoffState {
                backoff: FibonacciBackoff::new(config.backoff_min_secs, config.backoff_max_secs),
                error_count: 0,
            });
            state.increment_error();
            state.backoff.next_backoff_seconds()
        }
        Err(poisoned) => {
            warn!("backoff_states lock poisoned: {poisoned}, using default backoff");
            config.reconciliation_error_requeue_secs
        }
    };

    info!("retrying {} with Fibonacci backoff: {}s", resource_key, backoff_seconds);
    metrics::increment_requeues_total("error-backoff");
    Action::requeue(std::time::Duration::from_secs(backoff_seconds))
}

/// Reset `resource_key`'s backoff state after a successful reconcile.
pub fn reset_backoff(resource_key: &str, backoff_states: &std::sync::Mutex<std::collections::HashMap<String, BackoffState>>) {
    if let Ok(mut states) = backoff_states.lock() {
        if let Some(state) = states.get_mut(resource_key) {
            state.reset();
        }
    }
}

/// Classify and handle a watch-stream-level error (as opposed to a per-object
/// reconcile error). Returns `None` to let the watch restart, `Some(())` to
/// continue as if nothing happened (used for the expected "not found" case).
pub async fn handle_watch_stream_error(
    error_string: &str,
    rate_limit_backoff_ms: &std::sync::atomic::AtomicU64,
    max_backoff_ms: u64,
    restart_delay_secs: u64,
) -> Option<()> {
    let is_not_found = error_string.contains("404") || error_string.contains("not found");
    let is_unauthorized =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_expired = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_rate_limited = error_string.contains("429") || error_string.contains("TooManyRequests");

    if is_unauthorized {
        error!("watch authentication failed (401): {error_string}");
        tokio::time::sleep(std::time::Duration::from_secs(restart_delay_secs)).await;
        None
    } else if is_expired {
        warn!("watch resource version expired (410), restarting: {error_string}");
        None
    } else if is_rate_limited {
        let current = rate_limit_backoff_ms.load(std::sync::atomic::Ordering::Relaxed);
        warn!("watch rate-limited (429), backing off {current}ms before restart");
        tokio::time::sleep(std::time::Duration::from_millis(current)).await;
        let next = std::cmp::min(current.saturating_mul(2), max_backoff_ms);
        rate_limit_backoff_ms.store(next, std::sync::atomic::Ordering::Relaxed);
        None
    } else if is_not_found {
        warn!("watched resource not found, likely deleted or CRD missing: {error_string}");
        Some(())
    } else {
        error!("unclassified watch stream error: {error_string}");
        tokio::time::sleep(std::time::Duration::from_secs(restart_delay_secs)).await;
        None
    }
}

/// Shared `error_policy` callback passed to `kube_runtime::Controller::run`.
pub fn make_error_action(
    controller: &str,
    resource_key: &str,
    error: &ReconcilerError,
    ctx: &Arc<super::reconciler::types::SharedReconcilerState>,
) -> Action {
    handle_reconciliation_error(controller, resource_key, error, &ctx.backoff_states, &ctx.config)
}
