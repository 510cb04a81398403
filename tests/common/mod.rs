//! Common test utilities for reconciliation tests
//!
//! Provides an in-memory `ObjectStore` that behaves like the API server where
//! the reconciler depends on it:
//! - every write bumps a global resource version
//! - `update` with a stale resource version is a conflict
//! - deleting an object that still carries finalizers only marks it deleted
//! - the object disappears once its last finalizer is removed
//!
//! plus fixtures for namespaces, ConfigMaps and directives.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use kube::api::ApiResource;
use kube::core::DynamicObject;
use resource_duplicator::controller::reconciler::status::stored_status;
use resource_duplicator::prelude::*;
use resource_duplicator::store::object_key;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Store key: (api_version/kind, namespace, name)
type Key = (String, String, String);

fn resource_id(resource: &ApiResource) -> String {
    format!("{}/{}", resource.api_version, resource.kind)
}

fn key_of(resource: &ApiResource, namespace: Option<&str>, name: &str) -> Key {
    (
        resource_id(resource),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

/// One mutating call seen by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write {
    pub op: &'static str,
    pub kind: String,
    pub key: String,
}

impl Write {
    pub fn is(&self, op: &str, kind: &str) -> bool {
        self.op == op && self.kind == kind
    }
}

#[derive(Default)]
struct State {
    objects: HashMap<Key, DynamicObject>,
    resource_version: u64,
    writes: Vec<Write>,
    // One-shot failures: (op, kind, object key)
    faults: Vec<(&'static str, String, String, StoreError)>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn take_fault(&mut self, op: &str, kind: &str, key: &str) -> Option<StoreError> {
        let index = self
            .faults
            .iter()
            .position(|(o, k, key_, _)| *o == op && k == kind && key_ == key)?;
        Some(self.faults.remove(index).3)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mutating calls, in order
    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    /// Fail the next `op` ("get", "create", "update", "delete") on `kind` `key`
    pub fn fail_next(&self, op: &'static str, kind: &str, key: &str, error: StoreError) {
        self.state
            .lock()
            .unwrap()
            .faults
            .push((op, kind.to_string(), key.to_string(), error));
    }

    /// Insert or replace an object directly, bypassing the write log
    pub fn seed(&self, resource: &ApiResource, object: DynamicObject) {
        let mut state = self.state.lock().unwrap();
        let mut object = object;
        object.metadata.resource_version = Some(state.next_version());
        let key = key_of(
            resource,
            object.metadata.namespace.as_deref(),
            object.metadata.name.as_deref().unwrap_or_default(),
        );
        state.objects.insert(key, object);
    }

    pub fn object(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<DynamicObject> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&key_of(resource, namespace, name))
            .cloned()
    }

    /// Every stored object of a resource type
    pub fn all(&self, resource: &ApiResource) -> Vec<DynamicObject> {
        let id = resource_id(resource);
        self.state
            .lock()
            .unwrap()
            .objects
            .iter()
            .filter(|(key, _)| key.0 == id)
            .map(|(_, object)| object.clone())
            .collect()
    }

    fn record(state: &mut State, op: &'static str, resource: &ApiResource, key: String) {
        state.writes.push(Write {
            op,
            kind: resource.kind.clone(),
            key,
        });
    }
}

fn has_finalizers(object: &DynamicObject) -> bool {
    object
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| !f.is_empty())
}

fn deletion_timestamp() -> k8s_openapi::apimachinery::pkg::apis::meta::v1::Time {
    serde_json::from_value(json!("2025-06-01T00:00:00Z")).unwrap()
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.take_fault("get", &resource.kind, &object_key(namespace, name)) {
            return Err(error);
        }
        Ok(state.objects.get(&key_of(resource, namespace, name)).cloned())
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let id = resource_id(resource);
        let state = self.state.lock().unwrap();
        let mut found: Vec<_> = state
            .objects
            .iter()
            .filter(|(key, _)| key.0 == id)
            .filter(|(key, _)| namespace.is_none_or(|ns| key.1 == ns))
            .filter(|(_, object)| {
                labels.iter().all(|(k, v)| {
                    object
                        .metadata
                        .labels
                        .as_ref()
                        .and_then(|l| l.get(k))
                        == Some(v)
                })
            })
            .map(|(key, object)| (key.clone(), object.clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found.into_iter().map(|(_, object)| object).collect())
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let namespace = object.metadata.namespace.as_deref();
        let name = object.metadata.name.clone().unwrap_or_default();
        let display = object_key(namespace, &name);
        let key = key_of(resource, namespace, &name);

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.take_fault("create", &resource.kind, &display) {
            return Err(error);
        }
        if state.objects.contains_key(&key) {
            return Err(StoreError::Conflict {
                kind: resource.kind.clone(),
                key: display,
                message: "already exists".to_string(),
            });
        }

        let mut created = object.clone();
        let version = state.next_version();
        created.metadata.uid = Some(format!("uid-{version}"));
        created.metadata.resource_version = Some(version);
        state.objects.insert(key, created.clone());
        Self::record(&mut state, "create", resource, display);
        Ok(created)
    }

    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let namespace = object.metadata.namespace.as_deref();
        let name = object.metadata.name.clone().unwrap_or_default();
        let display = object_key(namespace, &name);
        let key = key_of(resource, namespace, &name);

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.take_fault("update", &resource.kind, &display) {
            return Err(error);
        }
        let Some(existing) = state.objects.get(&key).cloned() else {
            return Err(StoreError::NotFound {
                kind: resource.kind.clone(),
                key: display,
            });
        };
        if let Some(sent) = object.metadata.resource_version.as_deref() {
            if Some(sent) != existing.metadata.resource_version.as_deref() {
                return Err(StoreError::Conflict {
                    kind: resource.kind.clone(),
                    key: display,
                    message: "the object has been modified".to_string(),
                });
            }
        }

        let mut updated = object.clone();
        // Status is owned by the status subresource
        match existing.data.get("status") {
            Some(status) => {
                if let Some(fields) = updated.data.as_object_mut() {
                    fields.insert("status".to_string(), status.clone());
                }
            }
            None => {
                if let Some(fields) = updated.data.as_object_mut() {
                    fields.remove("status");
                }
            }
        }
        updated.metadata.uid.clone_from(&existing.metadata.uid);
        updated
            .metadata
            .deletion_timestamp
            .clone_from(&existing.metadata.deletion_timestamp);
        updated.metadata.resource_version = Some(state.next_version());
        Self::record(&mut state, "update", resource, display);

        if updated.metadata.deletion_timestamp.is_some() && !has_finalizers(&updated) {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError> {
        let display = object_key(namespace, name);
        let key = key_of(resource, namespace, name);

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.take_fault("delete", &resource.kind, &display) {
            return Err(error);
        }
        let Some(existing) = state.objects.get(&key).cloned() else {
            return Err(StoreError::NotFound {
                kind: resource.kind.clone(),
                key: display,
            });
        };
        Self::record(&mut state, "delete", resource, display);

        if has_finalizers(&existing) {
            let mut marked = existing;
            if marked.metadata.deletion_timestamp.is_none() {
                marked.metadata.deletion_timestamp = Some(deletion_timestamp());
            }
            marked.metadata.resource_version = Some(state.next_version());
            state.objects.insert(key, marked);
        } else {
            state.objects.remove(&key);
        }
        Ok(())
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), StoreError> {
        let display = object_key(Some(namespace), name);
        let key = key_of(resource, Some(namespace), name);

        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.take_fault("patch_status", &resource.kind, &display) {
            return Err(error);
        }
        let version = state.next_version();
        let Some(existing) = state.objects.get_mut(&key) else {
            return Err(StoreError::NotFound {
                kind: resource.kind.clone(),
                key: display,
            });
        };
        if let Some(fields) = existing.data.as_object_mut() {
            fields.insert("status".to_string(), status);
        }
        existing.metadata.resource_version = Some(version);
        Self::record(&mut state, "patch_status", resource, display);
        Ok(())
    }
}

pub fn namespace_resource() -> ApiResource {
    ApiResource::erase::<Namespace>(&())
}

pub fn config_map_resource() -> ApiResource {
    ApiResource::erase::<ConfigMap>(&())
}

pub fn directive_resource() -> ApiResource {
    ApiResource::erase::<Duplicator>(&())
}

pub fn namespace(name: &str, labels: &[(&str, &str)]) -> DynamicObject {
    let labels: BTreeMap<_, _> = labels.iter().copied().collect();
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": name, "labels": labels }
    }))
    .unwrap()
}

pub fn config_map(namespace: &str, name: &str, data: &[(&str, &str)]) -> DynamicObject {
    let data: BTreeMap<_, _> = data.iter().copied().collect();
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": { "name": name, "namespace": namespace, "labels": { "app": "web" } },
        "data": data
    }))
    .unwrap()
}

pub fn directive(
    namespace: &str,
    name: &str,
    selector: &[(&str, &str)],
    targets: Vec<TargetResource>,
) -> DynamicObject {
    let mut directive = Duplicator::new(
        name,
        DuplicatorSpec {
            namespace_selector: NamespaceSelector {
                match_labels: selector
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            },
            target_resources: targets,
        },
    );
    directive.metadata.namespace = Some(namespace.to_string());
    directive.metadata.generation = Some(1);
    serde_json::from_value(serde_json::to_value(&directive).unwrap()).unwrap()
}

pub fn config_map_target(namespace: &str, name: &str) -> TargetResource {
    TargetResource {
        api_version: None,
        kind: "ConfigMap".to_string(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

/// The scenario cluster: `ns-a {env: staging}`, `ns-b {env: prod}`,
/// `source/app-config {k: v}` and directive `ops/d1` selecting `env=staging`
pub fn staging_cluster() -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.seed(&namespace_resource(), namespace("ops", &[]));
    store.seed(&namespace_resource(), namespace("source", &[]));
    store.seed(&namespace_resource(), namespace("ns-a", &[("env", "staging")]));
    store.seed(&namespace_resource(), namespace("ns-b", &[("env", "prod")]));
    store.seed(
        &config_map_resource(),
        config_map("source", "app-config", &[("k", "v")]),
    );
    store.seed(
        &directive_resource(),
        directive(
            "ops",
            "d1",
            &[("env", "staging")],
            vec![config_map_target("source", "app-config")],
        ),
    );
    store
}

pub fn reconciler(store: &Arc<MemoryStore>) -> Reconciler {
    let store: Arc<dyn ObjectStore> = Arc::clone(store) as Arc<dyn ObjectStore>;
    Reconciler::new(
        store,
        Arc::new(KindRegistry::with_builtin_kinds()),
        ReconcileSettings::default(),
    )
}

pub fn d1() -> DirectiveKey {
    DirectiveKey::new("ops", "d1")
}

pub fn status_of(store: &MemoryStore, key: &DirectiveKey) -> Option<DuplicatorStatus> {
    store
        .object(&directive_resource(), Some(&key.namespace), &key.name)
        .as_ref()
        .and_then(stored_status)
}

pub fn labels_of(object: &DynamicObject) -> BTreeMap<String, String> {
    object.metadata.labels.clone().unwrap_or_default()
}
