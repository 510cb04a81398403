//! # Kubernetes Store
//!
//! [`ObjectStore`] backed by the Kubernetes API through `kube::Api<DynamicObject>`.

use super::{label_selector, object_key, ObjectStore, StoreError};
use crate::constants::FIELD_MANAGER;
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::core::DynamicObject;
use kube::Client;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) if !ns.is_empty() => Api::namespaced_with(self.client.clone(), ns, resource),
            _ => Api::all_with(self.client.clone(), resource),
        }
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PostParams::default()
    }
}

fn object_name(resource: &ApiResource, object: &DynamicObject) -> Result<String, StoreError> {
    object
        .metadata
        .name
        .clone()
        .ok_or_else(|| StoreError::Rejected {
            code: 422,
            message: format!("{} object has no name", resource.kind),
        })
}

/// Classify a kube client error into the store taxonomy
fn map_error(err: kube::Error, resource: &ApiResource, key: String) -> StoreError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound {
            kind: resource.kind.clone(),
            key,
        },
        kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict {
            kind: resource.kind.clone(),
            key,
            message: ae.message,
        },
        kube::Error::Api(ae) if ae.code == 429 || ae.code >= 500 => {
            StoreError::Unavailable(format!("{} ({})", ae.message, ae.code))
        }
        kube::Error::Api(ae) => StoreError::Rejected {
            code: ae.code,
            message: ae.message,
        },
        kube::Error::SerdeError(e) => StoreError::Decode(e),
        other => StoreError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        trace!(kind = %resource.kind, key = %object_key(namespace, name), "store.get");
        self.api(resource, namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_error(e, resource, object_key(namespace, name)))
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let mut params = ListParams::default();
        if !labels.is_empty() {
            params = params.labels(&label_selector(labels));
        }
        trace!(kind = %resource.kind, selector = ?params.label_selector, "store.list");
        self.api(resource, namespace)
            .list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| map_error(e, resource, namespace.unwrap_or("*").to_string()))
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = object_name(resource, object)?;
        let namespace = object.metadata.namespace.as_deref();
        trace!(kind = %resource.kind, key = %object_key(namespace, &name), "store.create");
        self.api(resource, namespace)
            .create(&post_params(), object)
            .await
            .map_err(|e| map_error(e, resource, object_key(namespace, &name)))
    }

    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let name = object_name(resource, object)?;
        let namespace = object.metadata.namespace.as_deref();
        trace!(kind = %resource.kind, key = %object_key(namespace, &name), "store.update");
        self.api(resource, namespace)
            .replace(&name, &post_params(), object)
            .await
            .map_err(|e| map_error(e, resource, object_key(namespace, &name)))
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        trace!(kind = %resource.kind, key = %object_key(namespace, name), "store.delete");
        self.api(resource, namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| map_error(e, resource, object_key(namespace, name)))
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), StoreError> {
        let patch = serde_json::json!({ "status": status });
        self.api(resource, Some(namespace))
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
            .map(|_| ())
            .map_err(|e| map_error(e, resource, object_key(Some(namespace), name)))
    }
}
