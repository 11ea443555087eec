//! Status types shared between [`super::GitRepository`] and [`super::CustomPackage`].

use serde::{Deserialize, Serialize};

/// A single status condition, following the Kubernetes `metav1.Condition` convention.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, e.g. `Ready`, `Synced`.
    pub r#type: String,
    /// Status of the condition (`True`, `False`, `Unknown`).
    pub status: String,
    /// Last transition time, RFC 3339.
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the condition.
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message describing the condition.
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn ready(status: bool, reason: &str, message: impl Into<String>) -> Self {
        Self {
            r#type: "Ready".to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        }
    }
}
