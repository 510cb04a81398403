//! # Validation
//!
//! Checks a directive before anything is written. A directive that fails here
//! can never converge as written, so every failure is an `InvalidSpec`.

use super::cleanup::resource_id;
use super::reconcile::PlannedTarget;
use super::types::{DirectiveKey, ReconcilerError};
use crate::constants::MAX_LABEL_VALUE_LEN;
use crate::crd::DuplicatorSpec;
use regex::Regex;
use std::collections::HashMap;

const DNS_LABEL: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$";
const DNS_SUBDOMAIN: &str = r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";
const LABEL_NAME: &str = r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$";

fn is_match(pattern: &str, value: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(value))
}

/// Kubernetes namespace (RFC 1123 label): 1-63 characters
#[must_use]
pub fn is_dns_label(value: &str) -> bool {
    value.len() <= 63 && is_match(DNS_LABEL, value)
}

/// Kubernetes object name (RFC 1123 subdomain): 1-253 characters
#[must_use]
pub fn is_dns_subdomain(value: &str) -> bool {
    value.len() <= 253 && is_match(DNS_SUBDOMAIN, value)
}

/// Label value: empty, or up to 63 alphanumerics, `-`, `_`, `.` with
/// alphanumeric ends
#[must_use]
pub fn is_label_value(value: &str) -> bool {
    value.is_empty() || (value.len() <= MAX_LABEL_VALUE_LEN && is_match(LABEL_NAME, value))
}

/// Label key: `[prefix/]name`, the prefix being a DNS subdomain
#[must_use]
pub fn is_label_key(key: &str) -> bool {
    let (prefix, name) = match key.rsplit_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    prefix.is_none_or(is_dns_subdomain)
        && name.len() <= MAX_LABEL_VALUE_LEN
        && is_match(LABEL_NAME, name)
}

/// Validate a directive's identity and spec
pub fn validate_directive(key: &DirectiveKey, spec: &DuplicatorSpec) -> Result<(), ReconcilerError> {
    let invalid = |message: String| Err(ReconcilerError::InvalidSpec(message));

    // The name and namespace are written into ownership label values
    if !is_label_value(&key.name) {
        return invalid(format!(
            "metadata.name '{}' must be a valid label value (at most {MAX_LABEL_VALUE_LEN} characters)",
            key.name
        ));
    }

    for (label, value) in &spec.namespace_selector.match_labels {
        if !is_label_key(label) {
            return invalid(format!(
                "namespaceSelector.matchLabels key '{label}' is not a valid label key"
            ));
        }
        if !is_label_value(value) {
            return invalid(format!(
                "namespaceSelector.matchLabels['{label}'] value '{value}' is not a valid label value"
            ));
        }
    }

    for (index, target) in spec.target_resources.iter().enumerate() {
        if target.kind.trim().is_empty() {
            return invalid(format!("targetResources[{index}].kind cannot be empty"));
        }
        if !is_dns_subdomain(&target.name) {
            return invalid(format!(
                "targetResources[{index}].name '{}' must be a valid Kubernetes name",
                target.name
            ));
        }
        if !target.namespace.is_empty() && !is_dns_label(&target.namespace) {
            return invalid(format!(
                "targetResources[{index}].namespace '{}' must be a valid Kubernetes namespace",
                target.namespace
            ));
        }
    }

    Ok(())
}

/// Reject resolved targets that share a resource type and name
///
/// Two such targets read from different source namespaces but write the same
/// replica name, so one source namespace would receive the other's copy on top
/// of its own object.
pub(crate) fn validate_distinct_targets(targets: &[PlannedTarget<'_>]) -> Result<(), ReconcilerError> {
    let mut seen: HashMap<(String, &str), usize> = HashMap::new();
    for (index, planned) in targets.iter().enumerate() {
        let id = resource_id(&planned.resolved.resource);
        if let Some(first) = seen.insert((id.clone(), planned.target.name.as_str()), index) {
            return Err(ReconcilerError::InvalidSpec(format!(
                "targetResources[{index}] and targetResources[{first}] both name {id} '{}'",
                planned.target.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::registry::KindRegistry;
    use crate::crd::{NamespaceSelector, TargetResource};

    fn spec(labels: &[(&str, &str)], targets: Vec<TargetResource>) -> DuplicatorSpec {
        DuplicatorSpec {
            namespace_selector: NamespaceSelector {
                match_labels: labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            },
            target_resources: targets,
        }
    }

    fn target(kind: &str, namespace: &str, name: &str) -> TargetResource {
        TargetResource {
            api_version: None,
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_valid_directive() {
        let key = DirectiveKey::new("ops", "d1");
        let spec = spec(
            &[("env", "staging"), ("example.com/tier", "")],
            vec![target("ConfigMap", "source", "app-config"), target("Secret", "", "db.creds")],
        );
        assert!(validate_directive(&key, &spec).is_ok());
    }

    #[test]
    fn test_name_too_long_for_label() {
        let key = DirectiveKey::new("ops", "d".repeat(64));
        let err = validate_directive(&key, &spec(&[], vec![])).unwrap_err();
        assert!(matches!(err, ReconcilerError::InvalidSpec(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_selector() {
        let key = DirectiveKey::new("ops", "d1");
        assert!(validate_directive(&key, &spec(&[("bad key", "x")], vec![])).is_err());
        assert!(validate_directive(&key, &spec(&[("env", "-x")], vec![])).is_err());
    }

    #[test]
    fn test_invalid_targets() {
        let key = DirectiveKey::new("ops", "d1");
        for bad in [
            target("", "source", "app"),
            target("ConfigMap", "source", ""),
            target("ConfigMap", "source", "App_Config"),
            target("ConfigMap", "Source", "app"),
        ] {
            assert!(
                validate_directive(&key, &spec(&[], vec![bad.clone()])).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    fn planned<'a>(registry: &KindRegistry, targets: &'a [TargetResource]) -> Vec<PlannedTarget<'a>> {
        targets
            .iter()
            .map(|target| PlannedTarget {
                target,
                resolved: registry.resolve(target).unwrap(),
                source_namespace: target.source_namespace("ops").to_string(),
            })
            .collect()
    }

    #[test]
    fn test_targets_sharing_resource_and_name_are_rejected() {
        let registry = KindRegistry::with_builtin_kinds();
        let mut explicit = target("ConfigMap", "src2", "app");
        explicit.api_version = Some("v1".to_string());
        let targets = vec![target("ConfigMap", "src1", "app"), explicit];

        let err = validate_distinct_targets(&planned(&registry, &targets)).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("targetResources[1]"));
    }

    #[test]
    fn test_same_name_across_kinds_is_allowed() {
        let registry = KindRegistry::with_builtin_kinds();
        let targets = vec![
            target("ConfigMap", "src1", "app"),
            target("Secret", "src2", "app"),
            target("ConfigMap", "src2", "app-extra"),
        ];
        assert!(validate_distinct_targets(&planned(&registry, &targets)).is_ok());
    }

    #[test]
    fn test_label_helpers() {
        assert!(is_label_key("app.kubernetes.io/name"));
        assert!(!is_label_key("/name"));
        assert!(!is_label_key("a/b/c"));
        assert!(is_label_value(""));
        assert!(!is_label_value(&"v".repeat(64)));
        assert!(is_dns_label("ns-a"));
        assert!(!is_dns_label("ns.a"));
        assert!(is_dns_subdomain("ns.a"));
    }
}
