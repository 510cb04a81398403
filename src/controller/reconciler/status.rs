//! # Status Updates
//!
//! Surfaces the outcome of the last reconciliation on the directive.
//!
//! The status is written only when it differs from what is stored, so a
//! converged directive costs zero writes per resync. `lastTransitionTime`
//! moves only when the Ready condition flips.

use super::types::{directive_resource, ReconcileReport, ReconcilerError};
use crate::crd::{
    Condition, DuplicatorStatus, CONDITION_READY, PHASE_FAILED, PHASE_PROGRESSING, PHASE_READY,
    REASON_INVALID_SPEC, REASON_RETRY_PENDING, REASON_SYNCED, REASON_UNSUPPORTED_KIND,
};
use crate::store::{ObjectStore, StoreError};
use kube::core::DynamicObject;
use tracing::debug;

/// Status currently stored on a directive, if any
#[must_use]
pub fn stored_status(directive: &DynamicObject) -> Option<DuplicatorStatus> {
    directive
        .data
        .get("status")
        .filter(|s| !s.is_null())
        .and_then(|s| serde_json::from_value(s.clone()).ok())
}

/// Compute the status for the result of a sync pass
#[must_use]
pub fn build_status(
    previous: Option<&DuplicatorStatus>,
    generation: Option<i64>,
    result: &Result<ReconcileReport, ReconcilerError>,
    now: &str,
) -> DuplicatorStatus {
    let (phase, ready, reason, message) = match result {
        Ok(report) => (
            PHASE_READY,
            "True",
            REASON_SYNCED,
            format!(
                "{} replicas in {} namespaces",
                report.replicas(),
                report.matched_namespaces.len()
            ),
        ),
        Err(e @ ReconcilerError::UnsupportedKind(_)) => {
            (PHASE_FAILED, "False", REASON_UNSUPPORTED_KIND, e.to_string())
        }
        Err(e @ ReconcilerError::InvalidSpec(_)) => {
            (PHASE_FAILED, "False", REASON_INVALID_SPEC, e.to_string())
        }
        Err(e) => (PHASE_PROGRESSING, "False", REASON_RETRY_PENDING, e.to_string()),
    };

    let last_transition_time = previous
        .and_then(|s| s.condition(CONDITION_READY))
        .filter(|c| c.status == ready)
        .and_then(|c| c.last_transition_time.clone())
        .unwrap_or_else(|| now.to_string());

    let (matched_namespaces, replicas) = match result {
        Ok(report) => {
            let mut matched = report.matched_namespaces.clone();
            matched.sort();
            let replicas = i32::try_from(report.replicas()).unwrap_or(i32::MAX);
            (matched, Some(replicas))
        }
        // Keep the last observed picture while not converged
        Err(_) => (
            previous
                .map(|s| s.matched_namespaces.clone())
                .unwrap_or_default(),
            previous.and_then(|s| s.replicas),
        ),
    };

    DuplicatorStatus {
        phase: Some(phase.to_string()),
        observed_generation: generation,
        matched_namespaces,
        replicas,
        conditions: vec![Condition {
            r#type: CONDITION_READY.to_string(),
            status: ready.to_string(),
            last_transition_time: Some(last_transition_time),
            reason: Some(reason.to_string()),
            message: Some(message),
        }],
    }
}

/// Write `status` onto the directive unless it is already stored
///
/// Returns whether a write happened.
pub async fn update_status(
    store: &dyn ObjectStore,
    directive: &DynamicObject,
    status: &DuplicatorStatus,
) -> Result<bool, StoreError> {
    if stored_status(directive).as_ref() == Some(status) {
        debug!("Skipping status update - status unchanged");
        return Ok(false);
    }
    let namespace = directive.metadata.namespace.as_deref().unwrap_or_default();
    let name = directive.metadata.name.as_deref().unwrap_or_default();
    store
        .patch_status(
            &directive_resource(),
            namespace,
            name,
            serde_json::to_value(status)?,
        )
        .await?;
    debug!(
        phase = status.phase.as_deref().unwrap_or_default(),
        "status updated"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::registry::RegistryError;

    const T0: &str = "2026-01-01T00:00:00+00:00";
    const T1: &str = "2026-01-01T00:05:00+00:00";

    fn report() -> ReconcileReport {
        ReconcileReport {
            matched_namespaces: vec!["ns-b".to_string(), "ns-a".to_string()],
            created: 1,
            unchanged: 1,
            ..ReconcileReport::default()
        }
    }

    #[test]
    fn test_ready_status() {
        let status = build_status(None, Some(2), &Ok(report()), T0);
        assert_eq!(status.phase.as_deref(), Some(PHASE_READY));
        assert_eq!(status.observed_generation, Some(2));
        assert_eq!(status.matched_namespaces, vec!["ns-a", "ns-b"]);
        assert_eq!(status.replicas, Some(2));
        let ready = status.condition(CONDITION_READY).unwrap();
        assert_eq!(ready.status, "True");
        assert_eq!(ready.reason.as_deref(), Some(REASON_SYNCED));
        assert_eq!(ready.last_transition_time.as_deref(), Some(T0));
    }

    #[test]
    fn test_transition_time_only_moves_on_flip() {
        let first = build_status(None, Some(1), &Ok(report()), T0);
        let second = build_status(Some(&first), Some(1), &Ok(report()), T1);
        assert_eq!(first, second);

        let failed = build_status(
            Some(&second),
            Some(2),
            &Err(ReconcilerError::UnsupportedKind(RegistryError::Unsupported {
                kind: "Widget".to_string(),
                api_version: None,
            })),
            T1,
        );
        let ready = failed.condition(CONDITION_READY).unwrap();
        assert_eq!(ready.last_transition_time.as_deref(), Some(T1));
        assert_eq!(ready.reason.as_deref(), Some(REASON_UNSUPPORTED_KIND));
        assert_eq!(failed.phase.as_deref(), Some(PHASE_FAILED));
        // Last observed picture kept
        assert_eq!(failed.replicas, Some(2));
    }

    #[test]
    fn test_retry_is_distinguishable_from_fatal() {
        let retry = build_status(
            None,
            Some(1),
            &Err(ReconcilerError::SourceMissing {
                kind: "ConfigMap".to_string(),
                namespace: "source".to_string(),
                name: "app-config".to_string(),
            }),
            T0,
        );
        assert_eq!(retry.phase.as_deref(), Some(PHASE_PROGRESSING));
        assert_eq!(
            retry.condition(CONDITION_READY).unwrap().reason.as_deref(),
            Some(REASON_RETRY_PENDING)
        );

        let invalid = build_status(
            None,
            Some(1),
            &Err(ReconcilerError::InvalidSpec("bad".to_string())),
            T0,
        );
        assert_eq!(invalid.phase.as_deref(), Some(PHASE_FAILED));
        assert_eq!(
            invalid.condition(CONDITION_READY).unwrap().reason.as_deref(),
            Some(REASON_INVALID_SPEC)
        );
    }

    #[test]
    fn test_stored_status_roundtrip() {
        let status = build_status(None, Some(1), &Ok(report()), T0);
        let directive: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "syoze.syoze.fr/v1",
            "kind": "Duplicator",
            "metadata": { "name": "d1", "namespace": "ops" },
            "spec": {},
            "status": status,
        }))
        .unwrap();
        assert_eq!(stored_status(&directive), Some(status));
    }
}
