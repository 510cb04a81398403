//! # Namespace Matcher
//!
//! Conjunctive label-equality matching of namespaces against a directive's
//! selector.

use crate::constants::{
    LABEL_MANAGED, LABEL_MANAGED_BY_NAME, LABEL_MANAGED_BY_NAMESPACE, MANAGED_VALUE,
};
use std::collections::BTreeMap;

/// Whether `labels` satisfies `selector`
///
/// Every selector key must be present with an equal value. An empty selector
/// matches every namespace, including one without labels.
#[must_use]
pub fn matches(
    selector: &BTreeMap<String, String>,
    labels: Option<&BTreeMap<String, String>>,
) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.and_then(|l| l.get(key)) == Some(value))
}

/// The three labels identifying replicas owned by a directive
#[must_use]
pub fn ownership_labels(owner_name: &str, owner_namespace: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_MANAGED.to_string(), MANAGED_VALUE.to_string()),
        (LABEL_MANAGED_BY_NAME.to_string(), owner_name.to_string()),
        (
            LABEL_MANAGED_BY_NAMESPACE.to_string(),
            owner_namespace.to_string(),
        ),
    ])
}

/// Whether `labels` marks an object as owned by the given directive
#[must_use]
pub fn is_owned_by(
    labels: Option<&BTreeMap<String, String>>,
    owner_name: &str,
    owner_namespace: &str,
) -> bool {
    matches(&ownership_labels(owner_name, owner_namespace), labels)
}
