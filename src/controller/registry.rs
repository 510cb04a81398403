//! # Kind Registry
//!
//! Maps a target's kind to the strategy used to decode, clear and re-encode
//! its source objects.
//!
//! Two kinds of entries exist:
//!
//! - **Typed** entries (ConfigMap, Secret) round-trip the source through its
//!   `k8s-openapi` type, so a malformed source is rejected before anything
//!   is written.
//! - The **dynamic** entry serves any target that names an explicit
//!   `apiVersion`, operating on the untyped object.
//!
//! A target that matches neither is unsupported, which the reconciler
//! reports as a fatal condition. The registry is immutable once built.

use crate::controller::duplicate::clear_identity;
use crate::crd::TargetResource;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::ApiResource;
use kube::core::{DynamicObject, GroupVersionKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unsupported target kind {kind}{}", api_version.as_ref().map(|v| format!(" ({v})")).unwrap_or_default())]
    Unsupported {
        kind: String,
        api_version: Option<String>,
    },
    #[error("invalid apiVersion {0:?}")]
    InvalidApiVersion(String),
}

/// Per-kind duplication capability
pub trait KindStrategy: Send + Sync + std::fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// API resource the target lives under
    fn resource(&self, target: &TargetResource) -> Result<ApiResource, RegistryError>;

    /// Decode `source`, clear its identity fields and encode it back
    fn normalize(&self, source: &DynamicObject) -> Result<DynamicObject, serde_json::Error>;
}

/// Strategy for a kind known at compile time
pub struct TypedKind<K> {
    _marker: PhantomData<fn() -> K>,
}

impl<K> TypedKind<K> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K> Default for TypedKind<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> std::fmt::Debug for TypedKind<K>
where
    K: kube::Resource<DynamicType = ()>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedKind")
            .field("kind", &K::kind(&()))
            .finish()
    }
}

impl<K> KindStrategy for TypedKind<K>
where
    K: kube::Resource<DynamicType = ()> + Serialize + DeserializeOwned + 'static,
{
    fn name(&self) -> &'static str {
        "typed"
    }

    fn resource(&self, _target: &TargetResource) -> Result<ApiResource, RegistryError> {
        Ok(ApiResource::erase::<K>(&()))
    }

    fn normalize(&self, source: &DynamicObject) -> Result<DynamicObject, serde_json::Error> {
        let mut typed: K = serde_json::from_value(serde_json::to_value(source)?)?;
        clear_identity(typed.meta_mut());
        serde_json::from_value(serde_json::to_value(&typed)?)
    }
}

/// Strategy for any kind addressed by apiVersion + kind
#[derive(Debug, Default)]
pub struct DynamicKind;

impl KindStrategy for DynamicKind {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn resource(&self, target: &TargetResource) -> Result<ApiResource, RegistryError> {
        let api_version = target
            .api_version
            .as_deref()
            .ok_or_else(|| RegistryError::Unsupported {
                kind: target.kind.clone(),
                api_version: None,
            })?;
        let (group, version) = split_api_version(api_version)?;
        let gvk = GroupVersionKind::gvk(group, version, &target.kind);
        Ok(ApiResource::from_gvk(&gvk))
    }

    fn normalize(&self, source: &DynamicObject) -> Result<DynamicObject, serde_json::Error> {
        let mut copy = source.clone();
        clear_identity(&mut copy.metadata);
        Ok(copy)
    }
}

/// Split `group/version` (or a bare core `version`)
pub fn split_api_version(api_version: &str) -> Result<(&str, &str), RegistryError> {
    let invalid = || RegistryError::InvalidApiVersion(api_version.to_string());
    match api_version.split_once('/') {
        Some((group, version)) if !group.is_empty() && !version.is_empty() => {
            if version.contains('/') {
                Err(invalid())
            } else {
                Ok((group, version))
            }
        }
        Some(_) => Err(invalid()),
        None if !api_version.is_empty() => Ok(("", api_version)),
        None => Err(invalid()),
    }
}

/// A target resolved against the registry
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub strategy: Arc<dyn KindStrategy>,
    pub resource: ApiResource,
}

#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    typed: BTreeMap<String, (String, Arc<dyn KindStrategy>)>,
    dynamic: Option<Arc<dyn KindStrategy>>,
}

impl KindRegistry {
    /// Registry with no entries: every target is unsupported
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// ConfigMap and Secret as typed kinds, plus the dynamic entry
    #[must_use]
    pub fn with_builtin_kinds() -> Self {
        Self::new()
            .register::<ConfigMap>()
            .register::<Secret>()
            .with_dynamic()
    }

    /// Built-in typed kinds, with the dynamic entry only if allowed
    #[must_use]
    pub fn from_config(allow_dynamic_kinds: bool) -> Self {
        let registry = Self::new().register::<ConfigMap>().register::<Secret>();
        if allow_dynamic_kinds {
            registry.with_dynamic()
        } else {
            registry
        }
    }

    /// Register a typed kind under its kind name
    #[must_use]
    pub fn register<K>(mut self) -> Self
    where
        K: kube::Resource<DynamicType = ()> + Serialize + DeserializeOwned + 'static,
    {
        let strategy: Arc<dyn KindStrategy> = Arc::new(TypedKind::<K>::new());
        self.typed.insert(
            K::kind(&()).into_owned(),
            (K::api_version(&()).into_owned(), strategy),
        );
        self
    }

    #[must_use]
    pub fn with_dynamic(mut self) -> Self {
        self.dynamic = Some(Arc::new(DynamicKind));
        self
    }

    #[must_use]
    pub fn has_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    /// Names of the registered typed kinds
    pub fn typed_kinds(&self) -> impl Iterator<Item = &str> {
        self.typed.keys().map(String::as_str)
    }

    /// Resolve the strategy and API resource serving `target`
    ///
    /// A typed entry wins when the kind matches and the target either omits
    /// `apiVersion` or names the typed entry's version.
    pub fn resolve(&self, target: &TargetResource) -> Result<ResolvedTarget, RegistryError> {
        if let Some((api_version, strategy)) = self.typed.get(&target.kind) {
            let version_matches = target
                .api_version
                .as_deref()
                .is_none_or(|requested| requested == api_version);
            if version_matches {
                return Ok(ResolvedTarget {
                    resource: strategy.resource(target)?,
                    strategy: Arc::clone(strategy),
                });
            }
        }

        match (&self.dynamic, &target.api_version) {
            (Some(strategy), Some(_)) => Ok(ResolvedTarget {
                resource: strategy.resource(target)?,
                strategy: Arc::clone(strategy),
            }),
            _ => Err(RegistryError::Unsupported {
                kind: target.kind.clone(),
                api_version: target.api_version.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(api_version: Option<&str>, kind: &str) -> TargetResource {
        TargetResource {
            api_version: api_version.map(str::to_string),
            kind: kind.to_string(),
            namespace: "source".to_string(),
            name: "app".to_string(),
        }
    }

    #[test]
    fn test_builtin_typed_kinds_resolve_without_api_version() {
        let registry = KindRegistry::with_builtin_kinds();

        let resolved = registry.resolve(&target(None, "ConfigMap")).unwrap();
        assert_eq!(resolved.strategy.name(), "typed");
        assert_eq!(resolved.resource.plural, "configmaps");
        assert_eq!(resolved.resource.api_version, "v1");

        let resolved = registry.resolve(&target(Some("v1"), "Secret")).unwrap();
        assert_eq!(resolved.strategy.name(), "typed");
        assert_eq!(resolved.resource.plural, "secrets");
    }

    #[test]
    fn test_dynamic_entry_serves_explicit_api_version() {
        let registry = KindRegistry::with_builtin_kinds();
        let resolved = registry
            .resolve(&target(Some("apps/v1"), "Deployment"))
            .unwrap();
        assert_eq!(resolved.strategy.name(), "dynamic");
        assert_eq!(resolved.resource.group, "apps");
        assert_eq!(resolved.resource.version, "v1");
        assert_eq!(resolved.resource.plural, "deployments");
    }

    #[test]
    fn test_unknown_kind_without_api_version_is_unsupported() {
        let registry = KindRegistry::with_builtin_kinds();
        let err = registry.resolve(&target(None, "Deployment")).unwrap_err();
        assert_eq!(
            err,
            RegistryError::Unsupported {
                kind: "Deployment".to_string(),
                api_version: None
            }
        );
    }

    #[test]
    fn test_without_dynamic_only_typed_kinds_resolve() {
        let registry = KindRegistry::from_config(false);
        assert!(!registry.has_dynamic());
        assert!(registry.resolve(&target(None, "ConfigMap")).is_ok());
        assert!(matches!(
            registry.resolve(&target(Some("apps/v1"), "Deployment")),
            Err(RegistryError::Unsupported { .. })
        ));
        assert_eq!(
            registry.typed_kinds().collect::<Vec<_>>(),
            vec!["ConfigMap", "Secret"]
        );
    }

    #[test]
    fn test_typed_kind_with_foreign_api_version_falls_back_to_dynamic() {
        let registry = KindRegistry::with_builtin_kinds();
        let resolved = registry
            .resolve(&target(Some("example.com/v1"), "ConfigMap"))
            .unwrap();
        assert_eq!(resolved.strategy.name(), "dynamic");
        assert_eq!(resolved.resource.group, "example.com");
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(split_api_version("v1").unwrap(), ("", "v1"));
        assert_eq!(split_api_version("apps/v1").unwrap(), ("apps", "v1"));
        assert!(split_api_version("").is_err());
        assert!(split_api_version("/v1").is_err());
        assert!(split_api_version("apps/").is_err());
        assert!(split_api_version("a/b/c").is_err());
    }

    #[test]
    fn test_typed_normalize_clears_identity() {
        let source: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "app-config",
                "namespace": "source",
                "uid": "1234",
                "resourceVersion": "42",
                "creationTimestamp": "2025-01-01T00:00:00Z",
                "labels": { "app": "web" }
            },
            "data": { "k": "v" }
        }))
        .unwrap();

        let normalized = TypedKind::<ConfigMap>::new().normalize(&source).unwrap();
        assert_eq!(normalized.metadata.uid, None);
        assert_eq!(normalized.metadata.resource_version, None);
        assert_eq!(normalized.metadata.creation_timestamp, None);
        assert_eq!(normalized.metadata.name.as_deref(), Some("app-config"));
        assert_eq!(normalized.data["data"]["k"], "v");
        assert_eq!(
            normalized.types.as_ref().map(|t| t.kind.as_str()),
            Some("ConfigMap")
        );
    }

    #[test]
    fn test_typed_normalize_rejects_malformed_source() {
        let source: DynamicObject = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "app-config", "namespace": "source" },
            "data": { "k": 5 }
        }))
        .unwrap();

        assert!(TypedKind::<ConfigMap>::new().normalize(&source).is_err());
        assert!(DynamicKind.normalize(&source).is_ok());
    }
}
