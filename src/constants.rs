//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable (see [`crate::config::ControllerConfig`]).

/// Default HTTP server port for metrics and health probes.
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready).
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval.
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval for reconciliation errors (seconds).
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default periodic drift-detection requeue interval (seconds).
pub const DEFAULT_RECONCILE_REQUEUE_SECS: u64 = 30;

/// Default Fibonacci backoff starting value (seconds).
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default Fibonacci backoff maximum value (seconds).
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Default delay before restarting watch stream after unknown errors (seconds).
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds).
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Annotation recording the CLI invocation start time that produced a resource.
pub const ANNOTATION_CLI_START_TIME: &str = "adhar.io/cli-start-time";

/// Annotation recording the last CLI start time this controller has observed and reconciled.
pub const ANNOTATION_LAST_OBSERVED_CLI_START_TIME: &str = "adhar.io/last-observed-cli-start-time";

/// Label carrying the package name on downstream Application/ApplicationSet objects.
pub const LABEL_PACKAGE_NAME: &str = "adhar.io/package-name";

/// Label carrying the package type (`core` or `custom`) on downstream objects.
pub const LABEL_PACKAGE_TYPE: &str = "adhar.io/package-type";

/// Field manager used for all server-side-apply / merge patches issued by this controller.
pub const FIELD_MANAGER: &str = "adhar-platform-controller";

/// Platform URL shorthand scheme, e.g. `adhar://packages/core/ingress-nginx`.
pub const SHORTHAND_SCHEME: &str = "adhar://";

/// Number of most-recent revisions kept in the scratch worktree cache before pruning.
pub const CACHE_REVISIONS_KEPT: usize = 3;
