//! # Object Store
//!
//! The boundary between the reconciliation core and the cluster.
//!
//! Every object crosses this boundary untyped (`DynamicObject`) together with
//! the `ApiResource` describing its type, so the same seam serves directives,
//! namespaces, typed kinds and arbitrary kinds. [`KubeStore`] talks to the
//! Kubernetes API; tests drive the core through an in-memory implementation.
//!
//! Implementations must not retry internally: retry policy belongs to the
//! caller.

mod kubernetes;

pub use kubernetes::KubeStore;

use async_trait::async_trait;
use kube::api::ApiResource;
use kube::core::DynamicObject;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },
    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: String,
        key: String,
        message: String,
    },
    #[error("object store unavailable: {0}")]
    Unavailable(String),
    #[error("object store rejected request ({code}): {message}")]
    Rejected { code: u16, message: String },
    #[error("failed to decode object: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Generic object store with label-filtered listing
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object; `Ok(None)` when it does not exist
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<DynamicObject>, StoreError>;

    /// List objects carrying every label in `labels`
    /// `namespace: None` lists across all namespaces (or cluster-scoped objects)
    async fn list(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    /// Create an object; `Conflict` when it already exists
    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace an object; `Conflict` when its resource version is stale
    async fn update(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Delete an object; `NotFound` when it does not exist
    async fn delete(
        &self,
        resource: &ApiResource,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StoreError>;

    /// Overwrite the status of an object
    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        status: serde_json::Value,
    ) -> Result<(), StoreError>;
}

/// Render an equality label selector (`k1=v1,k2=v2`)
#[must_use]
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// `namespace/name` (or just `name` for cluster-scoped objects)
#[must_use]
pub fn object_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.to_string(),
    }
}
