//! # Duplicator Spec
//!
//! The user-authored directive: which namespaces receive copies, and of what.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Duplicator Custom Resource Definition
///
/// Mirrors each target resource into every namespace whose labels satisfy
/// `namespaceSelector`.
///
/// # Example
///
/// ```yaml
/// apiVersion: syoze.syoze.fr/v1
/// kind: Duplicator
/// metadata:
///   name: app-config
///   namespace: ops
/// spec:
///   namespaceSelector:
///     matchLabels:
///       env: staging
///   targetResources:
///     - kind: ConfigMap
///       namespace: source
///       name: app-config
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Duplicator",
    group = "syoze.syoze.fr",
    version = "v1",
    namespaced,
    status = "crate::crd::DuplicatorStatus",
    shortname = "dup",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Replicas", "type":"integer", "jsonPath":".status.replicas"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatorSpec {
    /// Namespaces receiving the copies
    /// An empty selector matches every namespace
    #[serde(default)]
    pub namespace_selector: NamespaceSelector,
    /// Resources to copy, processed in order
    #[serde(default)]
    pub target_resources: Vec<TargetResource>,
}

/// Conjunctive label-equality selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl NamespaceSelector {
    /// Whether a namespace carrying `labels` is selected
    #[must_use]
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        crate::controller::selector::matches(&self.match_labels, labels)
    }
}

/// Reference to the original resource to be copied
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetResource {
    /// API version of the resource (e.g. "v1", "apps/v1")
    /// Optional for kinds the controller knows natively (ConfigMap, Secret)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Kind of the resource (e.g. "ConfigMap")
    pub kind: String,
    /// Namespace holding the source object
    /// Defaults to the Duplicator's own namespace
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Name of the source object, reused for every replica
    #[serde(default)]
    pub name: String,
}

impl TargetResource {
    /// Namespace of the source object, falling back to the directive's namespace
    #[must_use]
    pub fn source_namespace<'a>(&'a self, directive_namespace: &'a str) -> &'a str {
        if self.namespace.is_empty() {
            directive_namespace
        } else {
            &self.namespace
        }
    }
}
