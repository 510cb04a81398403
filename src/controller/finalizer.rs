//! # Finalizer Lifecycle
//!
//! Deletion protection of a `Duplicator`.
//!
//! ```text
//! Active ──add──▶ Protected ──(user deletes)──▶ Deleting ──remove──▶ Released
//! ```
//!
//! The finalizer is written before any replica exists and removed only after
//! cleanup completed, so a directive can never disappear while replicas it
//! created are still around. Both writes go through `update`, carrying the
//! fetched resource version: a concurrent edit surfaces as a conflict and the
//! whole reconciliation is retried.

use crate::constants::DUPLICATOR_FINALIZER;
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ApiResource;
use kube::core::DynamicObject;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizerState {
    /// No finalizer, not being deleted
    Active,
    /// Finalizer present, not being deleted
    Protected,
    /// Finalizer present, deletion requested
    Deleting,
    /// Finalizer absent, deletion requested; the store may remove the object
    Released,
}

impl FinalizerState {
    #[must_use]
    pub fn of(meta: &ObjectMeta) -> Self {
        match (has_finalizer(meta), meta.deletion_timestamp.is_some()) {
            (false, false) => FinalizerState::Active,
            (true, false) => FinalizerState::Protected,
            (true, true) => FinalizerState::Deleting,
            (false, true) => FinalizerState::Released,
        }
    }
}

#[must_use]
pub fn has_finalizer(meta: &ObjectMeta) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == DUPLICATOR_FINALIZER))
}

/// `Active → Protected`
pub async fn add_finalizer(
    store: &dyn ObjectStore,
    resource: &ApiResource,
    directive: &DynamicObject,
) -> Result<DynamicObject, StoreError> {
    if has_finalizer(&directive.metadata) {
        return Ok(directive.clone());
    }
    let mut updated = directive.clone();
    updated
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(DUPLICATOR_FINALIZER.to_string());

    info!(
        name = directive.metadata.name.as_deref().unwrap_or_default(),
        namespace = directive.metadata.namespace.as_deref().unwrap_or_default(),
        "adding finalizer"
    );
    store.update(resource, &updated).await
}

/// `Deleting → Released`
///
/// Other finalizers are left in place.
pub async fn remove_finalizer(
    store: &dyn ObjectStore,
    resource: &ApiResource,
    directive: &DynamicObject,
) -> Result<(), StoreError> {
    if !has_finalizer(&directive.metadata) {
        return Ok(());
    }
    let mut updated = directive.clone();
    let remaining: Vec<String> = updated
        .metadata
        .finalizers
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|f| f != DUPLICATOR_FINALIZER)
        .collect();
    updated.metadata.finalizers = (!remaining.is_empty()).then_some(remaining);

    info!(
        name = directive.metadata.name.as_deref().unwrap_or_default(),
        namespace = directive.metadata.namespace.as_deref().unwrap_or_default(),
        "removing finalizer"
    );
    match store.update(resource, &updated).await {
        Ok(_) => Ok(()),
        // The store may already have removed the object once the list emptied
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn deleted_at() -> Time {
        serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap()
    }

    fn meta(finalizers: &[&str], deleting: bool) -> ObjectMeta {
        ObjectMeta {
            name: Some("d1".to_string()),
            namespace: Some("ops".to_string()),
            finalizers: (!finalizers.is_empty())
                .then(|| finalizers.iter().map(|f| (*f).to_string()).collect()),
            deletion_timestamp: deleting.then(deleted_at),
            ..ObjectMeta::default()
        }
    }

    #[test]
    fn test_states() {
        assert_eq!(FinalizerState::of(&meta(&[], false)), FinalizerState::Active);
        assert_eq!(
            FinalizerState::of(&meta(&[DUPLICATOR_FINALIZER], false)),
            FinalizerState::Protected
        );
        assert_eq!(
            FinalizerState::of(&meta(&[DUPLICATOR_FINALIZER], true)),
            FinalizerState::Deleting
        );
        assert_eq!(FinalizerState::of(&meta(&[], true)), FinalizerState::Released);
    }

    #[test]
    fn test_foreign_finalizer_is_not_ours() {
        let m = meta(&["example.com/other"], true);
        assert!(!has_finalizer(&m));
        assert_eq!(FinalizerState::of(&m), FinalizerState::Released);
    }
}
