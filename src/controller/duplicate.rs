//! # Resource Duplication
//!
//! Derives the replica of a source object for a destination namespace.
//! Pure transform, no I/O: the same (source, destination, owner) always
//! yields the same replica.

use crate::controller::reconciler::DirectiveKey;
use crate::controller::registry::KindStrategy;
use crate::controller::selector::ownership_labels;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;

/// Clear the fields that tie an object to its current location and history
///
/// The store must treat the result as a fresh write target: identity
/// (`resourceVersion`, `uid`, `creationTimestamp`), server-managed
/// bookkeeping, and references that are only valid in the source namespace.
pub fn clear_identity(meta: &mut ObjectMeta) {
    meta.resource_version = None;
    meta.uid = None;
    meta.creation_timestamp = None;
    meta.generation = None;
    meta.managed_fields = None;
    meta.owner_references = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.self_link = None;
    meta.generate_name = None;
    meta.finalizers = None;
}

/// Build the replica of `source` that should exist in `destination`
///
/// Name and kind are preserved, identity is cleared, observed `status` is
/// dropped, and the ownership labels pointing at `owner` are added on top of
/// the source labels (ownership labels win on conflict).
pub fn duplicate(
    strategy: &dyn KindStrategy,
    source: &DynamicObject,
    destination: &str,
    owner: &DirectiveKey,
) -> Result<DynamicObject, serde_json::Error> {
    let mut replica = strategy.normalize(source)?;

    if let Some(fields) = replica.data.as_object_mut() {
        fields.remove("status");
    }

    replica.metadata.namespace = Some(destination.to_string());
    replica
        .metadata
        .labels
        .get_or_insert_with(Default::default)
        .extend(ownership_labels(&owner.name, &owner.namespace));

    Ok(replica)
}
