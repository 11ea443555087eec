//! # Controller Configuration
//!
//! Operator-level settings loaded from environment variables. All settings have
//! sensible defaults; environment variables are typically populated from a
//! ConfigMap via `envFrom` in the controller's Deployment.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;

/// Operator-level configuration shared by both reconcilers.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Reconciliation error requeue interval (seconds) before Fibonacci backoff
    /// for this resource reaches that value.
    pub reconciliation_error_requeue_secs: u64,
    /// Periodic drift-detection requeue interval (seconds) on a successful reconcile.
    pub reconcile_requeue_secs: u64,
    /// Fibonacci backoff minimum (seconds).
    pub backoff_min_secs: u64,
    /// Fibonacci backoff maximum (seconds).
    pub backoff_max_secs: u64,
    /// Watch stream restart delay after unknown errors (seconds).
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after it ends normally (seconds).
    pub watch_restart_delay_after_end_secs: u64,
    /// Base directory for scratch worktrees.
    pub scratch_dir: PathBuf,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE).
    pub log_level: String,
    /// Log format (`json` or `text`).
    pub log_format: String,
    /// HTTP server port for `/metrics`, `/healthz`, `/readyz`.
    pub metrics_port: u16,
    /// Base URL (or local filesystem root) the Shorthand Resolver resolves
    /// `packages/*` and other non-`environments` categories against.
    pub packages_base_url: String,
    /// Base URL (or local filesystem root) the Shorthand Resolver resolves
    /// `environments/*` against.
    pub environments_base_url: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            reconcile_requeue_secs: DEFAULT_RECONCILE_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            scratch_dir: std::env::temp_dir().join("adhar-controller"),
            log_level: "info".to_string(),
            log_format: "json".to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            packages_base_url: "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin".to_string(),
            environments_base_url: "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/environments"
                .to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables, falling back to
    /// [`ControllerConfig::default`] for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reconciliation_error_requeue_secs: env_var_or_default(
                "ADHAR_RECONCILIATION_ERROR_REQUEUE_SECS",
                defaults.reconciliation_error_requeue_secs,
            ),
            reconcile_requeue_secs: env_var_or_default(
                "ADHAR_RECONCILE_REQUEUE_SECS",
                defaults.reconcile_requeue_secs,
            ),
            backoff_min_secs: env_var_or_default("ADHAR_BACKOFF_MIN_SECS", defaults.backoff_min_secs),
            backoff_max_secs: env_var_or_default("ADHAR_BACKOFF_MAX_SECS", defaults.backoff_max_secs),
            watch_restart_delay_secs: env_var_or_default(
                "ADHAR_WATCH_RESTART_DELAY_SECS",
                defaults.watch_restart_delay_secs,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "ADHAR_WATCH_RESTART_DELAY_AFTER_END_SECS",
                defaults.watch_restart_delay_after_end_secs,
            ),
            scratch_dir: std::env::var("ADHAR_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            log_level: env_var_or_default_str("ADHAR_LOG_LEVEL", &defaults.log_level),
            log_format: env_var_or_default_str("LOG_FORMAT", &defaults.log_format),
            metrics_port: env_var_or_default("METRICS_PORT", defaults.metrics_port),
            packages_base_url: env_var_or_default_str("ADHAR_PACKAGES_BASE_URL", &defaults.packages_base_url),
            environments_base_url: env_var_or_default_str(
                "ADHAR_ENVIRONMENTS_BASE_URL",
                &defaults.environments_base_url,
            ),
        }
    }

    #[must_use]
    pub fn resolver_bases(&self) -> crate::resolver::ResolverBases {
        crate::resolver::ResolverBases {
            packages_base_url: self.packages_base_url.clone(),
            environments_base_url: self.environments_base_url.clone(),
        }
    }

    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    #[must_use]
    pub fn reconcile_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconcile_requeue_secs)
    }

    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
