//! # Cleanup
//!
//! Removal of replicas: the deletion path of a directive and the pruning of
//! replicas that fell out of the desired set.
//!
//! Only objects carrying this directive's three ownership labels are ever
//! deleted. An unowned object that happens to share a replica's name (the
//! source itself, or something a user created) is left alone, and so is any
//! object sitting where one of the directive's targets reads its source.

use super::reconcile::{decode_spec, PlannedTarget};
use super::types::{directive_resource, DirectiveKey, Reconciler, ReconcilerError};
use crate::controller::finalizer::remove_finalizer;
use crate::controller::selector::{is_owned_by, ownership_labels};
use crate::observability::metrics;
use crate::store::StoreError;
use kube::api::ApiResource;
use kube::core::DynamicObject;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// (resource id, namespace, name) of a replica
pub(crate) type ReplicaRef = (String, String, String);

/// Stable identity of an API resource type
pub(crate) fn resource_id(resource: &ApiResource) -> String {
    format!("{}/{}", resource.api_version, resource.kind)
}

/// Where every target's source object lives
pub(crate) fn source_refs(targets: &[PlannedTarget<'_>]) -> BTreeSet<ReplicaRef> {
    targets
        .iter()
        .map(|planned| {
            (
                resource_id(&planned.resolved.resource),
                planned.source_namespace.clone(),
                planned.target.name.clone(),
            )
        })
        .collect()
}

fn distinct_resources(targets: &[PlannedTarget<'_>]) -> Vec<ApiResource> {
    let mut seen = BTreeMap::new();
    for planned in targets {
        let resource = &planned.resolved.resource;
        seen.entry(resource_id(resource))
            .or_insert_with(|| resource.clone());
    }
    seen.into_values().collect()
}

impl Reconciler {
    /// `Deleting → Released`: remove every replica, then the finalizer
    ///
    /// Returns the number of replicas deleted.
    pub(crate) async fn cleanup(
        &self,
        directive: &DynamicObject,
        key: &DirectiveKey,
    ) -> Result<usize, ReconcilerError> {
        info!("directive deleted, removing replicas");

        // An undecodable spec still gets its finalizer released, but nothing
        // can be enumerated for it
        let spec = decode_spec(directive).unwrap_or_else(|e| {
            warn!(error = %e, "cannot read spec of deleted directive");
            Default::default()
        });

        let targets: Vec<PlannedTarget<'_>> = spec
            .target_resources
            .iter()
            .filter_map(|target| match self.registry.resolve(target) {
                Ok(resolved) => Some(PlannedTarget {
                    target,
                    resolved,
                    source_namespace: target.source_namespace(&key.namespace).to_string(),
                }),
                Err(e) => {
                    // Nothing was ever created for a target that never resolved
                    debug!(kind = %target.kind, error = %e, "skipping unresolvable target");
                    None
                }
            })
            .collect();

        let namespaces = self.matched_namespaces(&spec.namespace_selector).await?;
        let sources = source_refs(&targets);
        let mut deleted = 0;

        for namespace in &namespaces {
            let Some(ns_name) = namespace.metadata.name.as_deref() else {
                continue;
            };
            for planned in &targets {
                self.ensure_not_cancelled()?;
                let resource = &planned.resolved.resource;
                if sources.contains(&(
                    resource_id(resource),
                    ns_name.to_string(),
                    planned.target.name.clone(),
                )) {
                    continue;
                }
                let existing = self
                    .store
                    .get(resource, Some(ns_name), &planned.target.name)
                    .await?;
                let Some(existing) = existing else {
                    continue;
                };
                if !is_owned_by(existing.metadata.labels.as_ref(), &key.name, &key.namespace) {
                    continue;
                }
                if self
                    .delete_replica(resource, ns_name, &planned.target.name)
                    .await?
                {
                    deleted += 1;
                }
            }
        }

        // Replicas in namespaces that no longer match
        deleted += self.sweep(key, &targets, &BTreeSet::new()).await?;

        self.ensure_not_cancelled()?;
        remove_finalizer(self.store.as_ref(), &directive_resource(), directive).await?;
        info!(deleted, "replicas removed, finalizer released");
        Ok(deleted)
    }

    /// Delete owned replicas of the planned resource types that are not in `desired`
    pub(crate) async fn prune(
        &self,
        key: &DirectiveKey,
        targets: &[PlannedTarget<'_>],
        desired: &BTreeSet<ReplicaRef>,
    ) -> Result<usize, ReconcilerError> {
        let pruned = self.sweep(key, targets, desired).await?;
        if pruned > 0 {
            info!(pruned, "pruned replicas outside the desired set");
        }
        Ok(pruned)
    }

    async fn sweep(
        &self,
        key: &DirectiveKey,
        targets: &[PlannedTarget<'_>],
        keep: &BTreeSet<ReplicaRef>,
    ) -> Result<usize, ReconcilerError> {
        let owner_labels = ownership_labels(&key.name, &key.namespace);
        let sources = source_refs(targets);
        let mut deleted = 0;

        for resource in distinct_resources(targets) {
            let id = resource_id(&resource);
            let owned = self.store.list(&resource, None, &owner_labels).await?;
            for object in owned {
                let (Some(namespace), Some(name)) = (
                    object.metadata.namespace.as_deref(),
                    object.metadata.name.as_deref(),
                ) else {
                    continue;
                };
                if !is_owned_by(object.metadata.labels.as_ref(), &key.name, &key.namespace) {
                    continue;
                }
                let location = (id.clone(), namespace.to_string(), name.to_string());
                // A source carrying our labels is still a source
                if keep.contains(&location) || sources.contains(&location) {
                    continue;
                }
                self.ensure_not_cancelled()?;
                if self.delete_replica(&resource, namespace, name).await? {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    /// Delete one replica; absence counts as success
    ///
    /// Returns whether a delete actually happened.
    async fn delete_replica(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<bool, StoreError> {
        match self.store.delete(resource, Some(namespace), name).await {
            Ok(()) => {
                info!(kind = %resource.kind, namespace, name, "replica deleted");
                metrics::increment_replicas_deleted();
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!(kind = %resource.kind, namespace, name, "replica already gone");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
