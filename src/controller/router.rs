//! # Change Routers
//!
//! Map events on related objects to the directives that must reconcile.
//!
//! - A namespace event schedules every directive whose selector matches the
//!   namespace's current labels. Terminating namespaces schedule nothing.
//! - A ConfigMap/Secret event schedules every directive with a target naming
//!   that object, so source edits propagate without waiting for a resync.
//!
//! Routers never write; they only pick keys. The directive list comes from the
//! kube-runtime reflector store, the same cache the controller watches.

use crate::crd::Duplicator;
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Resource, ResourceExt};
use kube_runtime::reflector::{ObjectRef, Store};
use tracing::debug;

/// Directives whose selector matches `namespace`
#[must_use]
pub fn directives_for_namespace<'a>(
    namespace: &Namespace,
    directives: impl IntoIterator<Item = &'a Duplicator>,
) -> Vec<ObjectRef<Duplicator>> {
    if namespace.metadata.deletion_timestamp.is_some() {
        return Vec::new();
    }
    let labels = namespace.metadata.labels.as_ref();
    directives
        .into_iter()
        .filter(|d| d.spec.namespace_selector.matches(labels))
        .map(ObjectRef::from_obj)
        .collect()
}

/// Directives with a target naming `api_version` `kind` `namespace`/`name`
///
/// A target without an explicit namespace reads from its directive's namespace.
/// A target without an explicit apiVersion matches any version of the kind.
#[must_use]
pub fn directives_for_source<'a>(
    api_version: &str,
    kind: &str,
    namespace: &str,
    name: &str,
    directives: impl IntoIterator<Item = &'a Duplicator>,
) -> Vec<ObjectRef<Duplicator>> {
    directives
        .into_iter()
        .filter(|d| {
            let directive_ns = d.namespace().unwrap_or_default();
            d.spec.target_resources.iter().any(|t| {
                t.kind == kind
                    && t.api_version.as_deref().is_none_or(|v| v == api_version)
                    && t.name == name
                    && t.source_namespace(&directive_ns) == namespace
            })
        })
        .map(ObjectRef::from_obj)
        .collect()
}

/// Namespace watch mapper backed by the directive cache
#[derive(Clone)]
pub struct NamespaceRouter {
    directives: Store<Duplicator>,
}

impl std::fmt::Debug for NamespaceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceRouter").finish_non_exhaustive()
    }
}

impl NamespaceRouter {
    #[must_use]
    pub fn new(directives: Store<Duplicator>) -> Self {
        Self { directives }
    }

    pub fn route(&self, namespace: &Namespace) -> Vec<ObjectRef<Duplicator>> {
        let cached = self.directives.state();
        let refs = directives_for_namespace(namespace, cached.iter().map(|d| &**d));
        if !refs.is_empty() {
            debug!(
                namespace = namespace.name_any(),
                directives = refs.len(),
                "namespace change routed"
            );
            metrics::increment_namespace_events_routed(refs.len());
        }
        refs
    }
}

/// Source object watch mapper backed by the directive cache
#[derive(Clone)]
pub struct SourceRouter {
    directives: Store<Duplicator>,
}

impl std::fmt::Debug for SourceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRouter").finish_non_exhaustive()
    }
}

impl SourceRouter {
    #[must_use]
    pub fn new(directives: Store<Duplicator>) -> Self {
        Self { directives }
    }

    pub fn route<K>(&self, object: &K) -> Vec<ObjectRef<Duplicator>>
    where
        K: Resource<DynamicType = ()>,
    {
        let api_version = K::api_version(&());
        let kind = K::kind(&());
        let namespace = object.meta().namespace.clone().unwrap_or_default();
        let name = object.meta().name.clone().unwrap_or_default();
        let cached = self.directives.state();
        directives_for_source(&api_version, &kind, &namespace, &name, cached.iter().map(|d| &**d))
    }
}
