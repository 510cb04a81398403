//! # Duplicator Status
//!
//! Status types for surfacing the outcome of the last reconciliation.
//!
//! A `Failed` phase means the directive can never converge as written
//! (unsupported kind, invalid spec) and will not be retried until it changes.
//! A `Progressing` phase means the controller is retrying, usually while
//! waiting on an external dependency such as a missing source object.

use serde::{Deserialize, Serialize};

pub const PHASE_READY: &str = "Ready";
pub const PHASE_PROGRESSING: &str = "Progressing";
pub const PHASE_FAILED: &str = "Failed";

pub const CONDITION_READY: &str = "Ready";

pub const REASON_SYNCED: &str = "Synced";
pub const REASON_RETRY_PENDING: &str = "RetryPending";
pub const REASON_UNSUPPORTED_KIND: &str = "UnsupportedKind";
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// Status of the Duplicator resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatorStatus {
    /// Current phase: Ready, Progressing, Failed
    #[serde(default)]
    pub phase: Option<String>,
    /// Generation the status was computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Namespaces currently selected, sorted
    #[serde(default)]
    pub matched_namespaces: Vec<String>,
    /// Number of replicas converged during the last successful reconciliation
    #[serde(default)]
    pub replicas: Option<i32>,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl DuplicatorStatus {
    /// Look up a condition by type
    #[must_use]
    pub fn condition(&self, r#type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == r#type)
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last time the status flipped
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
