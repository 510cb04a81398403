//! # Upsert
//!
//! Create-if-absent-else-update of a replica.
//!
//! An existing object is patched in place: the replica's content fields and
//! labels are laid over it, anything else already present is preserved, and
//! the update carries the fetched resource version. When the merge changes
//! nothing no write is issued, so repeated calls converge to zero writes.
//! Store errors are returned unchanged; retrying is the caller's business.

use crate::constants::LABEL_MANAGED_BY_NAME;
use crate::store::{ObjectStore, StoreError};
use kube::api::ApiResource;
use kube::core::DynamicObject;
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    Created,
    Updated,
    Unchanged,
}

impl UpsertResult {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertResult::Created => "created",
            UpsertResult::Updated => "updated",
            UpsertResult::Unchanged => "unchanged",
        }
    }
}

pub async fn upsert(
    store: &dyn ObjectStore,
    resource: &ApiResource,
    desired: &DynamicObject,
) -> Result<UpsertResult, StoreError> {
    let name = desired.metadata.name.as_deref().unwrap_or_default();
    let namespace = desired.metadata.namespace.as_deref();

    let Some(existing) = store.get(resource, namespace, name).await? else {
        store.create(resource, desired).await?;
        return Ok(UpsertResult::Created);
    };

    warn_on_takeover(&existing, desired);

    let merged = merge_into_existing(&existing, desired);
    if is_unchanged(&existing, &merged) {
        debug!(
            kind = %resource.kind,
            namespace = namespace.unwrap_or_default(),
            name,
            "replica already converged"
        );
        return Ok(UpsertResult::Unchanged);
    }

    store.update(resource, &merged).await?;
    Ok(UpsertResult::Updated)
}

/// Lay `desired` over `existing`
///
/// Top-level content fields of `desired` replace those of `existing`; fields
/// only `existing` has are kept. Labels and annotations are merged with
/// `desired` winning. Metadata identity (resource version, uid) comes from
/// `existing`.
#[must_use]
pub fn merge_into_existing(existing: &DynamicObject, desired: &DynamicObject) -> DynamicObject {
    let mut merged = existing.clone();

    if let Some(fields) = desired.data.as_object() {
        match merged.data.as_object_mut() {
            Some(target) => {
                for (key, value) in fields {
                    if key != "status" {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
            None => {
                let mut fields = fields.clone();
                fields.remove("status");
                merged.data = serde_json::Value::Object(fields);
            }
        }
    }

    merge_map(&mut merged.metadata.labels, desired.metadata.labels.as_ref());
    merge_map(
        &mut merged.metadata.annotations,
        desired.metadata.annotations.as_ref(),
    );

    merged
}

fn merge_map(target: &mut Option<BTreeMap<String, String>>, source: Option<&BTreeMap<String, String>>) {
    if let Some(source) = source.filter(|s| !s.is_empty()) {
        target
            .get_or_insert_with(BTreeMap::new)
            .extend(source.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

fn is_unchanged(existing: &DynamicObject, merged: &DynamicObject) -> bool {
    existing.data == merged.data
        && existing.metadata.labels == merged.metadata.labels
        && existing.metadata.annotations == merged.metadata.annotations
}

fn warn_on_takeover(existing: &DynamicObject, desired: &DynamicObject) {
    let owner_of = |object: &DynamicObject| {
        object
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(LABEL_MANAGED_BY_NAME))
            .cloned()
    };
    if let (Some(previous), Some(next)) = (owner_of(existing), owner_of(desired)) {
        if previous != next {
            warn!(
                name = existing.metadata.name.as_deref().unwrap_or_default(),
                namespace = existing.metadata.namespace.as_deref().unwrap_or_default(),
                previous_owner = %previous,
                new_owner = %next,
                "replica ownership taken over by another duplicator"
            );
        }
    }
}
