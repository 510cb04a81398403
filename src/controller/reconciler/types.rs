//! # Types
//!
//! Core types for the reconciler.

use crate::controller::backoff::BackoffState;
use crate::controller::registry::{KindRegistry, RegistryError};
use crate::controller::upsert::UpsertResult;
use crate::crd::Duplicator;
use crate::store::{ObjectStore, StoreError};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ApiResource;
use kube::ResourceExt;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Identity of a directive: (namespace, name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectiveKey {
    pub namespace: String,
    pub name: String,
}

impl DirectiveKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn from_resource(directive: &Duplicator) -> Self {
        Self::new(
            directive.namespace().unwrap_or_default(),
            directive.name_any(),
        )
    }
}

impl fmt::Display for DirectiveKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("source {kind} {namespace}/{name} not found")]
    SourceMissing {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("{0}")]
    UnsupportedKind(RegistryError),
    #[error("invalid spec: {0}")]
    InvalidSpec(String),
    #[error("source {kind} {key} cannot be duplicated: {error}")]
    InvalidSource {
        kind: String,
        key: String,
        #[source]
        error: serde_json::Error,
    },
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl ReconcilerError {
    /// Whether no retry can succeed until the directive itself changes
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconcilerError::UnsupportedKind(_) | ReconcilerError::InvalidSpec(_)
        )
    }

    /// Short label used for metrics and the requeue reason
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::Store(e) if e.is_conflict() => "conflict",
            ReconcilerError::Store(_) => "store",
            ReconcilerError::SourceMissing { .. } => "source-missing",
            ReconcilerError::UnsupportedKind(_) => "unsupported-kind",
            ReconcilerError::InvalidSpec(_) => "invalid-spec",
            ReconcilerError::InvalidSource { .. } => "invalid-source",
            ReconcilerError::Cancelled => "cancelled",
        }
    }
}

impl From<RegistryError> for ReconcilerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unsupported { .. } => ReconcilerError::UnsupportedKind(err),
            RegistryError::InvalidApiVersion(_) => ReconcilerError::InvalidSpec(err.to_string()),
        }
    }
}

/// Result of one reconciliation, as seen by the scheduler
#[derive(Debug)]
pub enum Outcome {
    /// Converged (or nothing left to do)
    Done,
    /// Transient failure; run again after a backoff
    Retry(ReconcilerError),
    /// Cannot converge until the directive changes
    Fatal(ReconcilerError),
}

impl Outcome {
    #[must_use]
    pub fn from_result(result: Result<(), ReconcilerError>) -> Self {
        match result {
            Ok(()) => Outcome::Done,
            Err(e) if e.is_fatal() => Outcome::Fatal(e),
            Err(e) => Outcome::Retry(e),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Done => "done",
            Outcome::Retry(_) => "retry",
            Outcome::Fatal(_) => "fatal",
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Outcome::Done)
    }
}

/// Settings consumed by the reconciliation core
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Delete owned replicas outside the desired set after a successful sync
    pub prune_unmatched_replicas: bool,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            prune_unmatched_replicas: true,
        }
    }
}

/// What one sync pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Namespaces the selector matched, sorted
    pub matched_namespaces: Vec<String>,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Pairs skipped because the destination is the source namespace
    pub skipped: usize,
}

impl ReconcileReport {
    pub fn record(&mut self, result: UpsertResult) {
        match result {
            UpsertResult::Created => self.created += 1,
            UpsertResult::Updated => self.updated += 1,
            UpsertResult::Unchanged => self.unchanged += 1,
        }
    }

    /// Replicas that exist and mirror their source
    #[must_use]
    pub fn replicas(&self) -> usize {
        self.created + self.updated + self.unchanged
    }
}

#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ObjectStore>,
    pub registry: Arc<KindRegistry>,
    pub settings: ReconcileSettings,
    // Backoff state per directive (identified by namespace/name), driven by the error policy
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    cancelled: Arc<AtomicBool>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: Arc<KindRegistry>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            registry,
            settings,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop starting new store calls; in-flight reconciliations return `Retry(Cancelled)`
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_not_cancelled(&self) -> Result<(), ReconcilerError> {
        if self.is_cancelled() {
            Err(ReconcilerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Forget the retry history of a directive after it converged
    pub fn reset_backoff(&self, key: &DirectiveKey) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(&key.to_string()) {
                state.reset();
            }
        }
    }

    /// Drop the retry history of a directive that no longer exists
    pub fn forget_backoff(&self, key: &DirectiveKey) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(&key.to_string());
        }
    }
}

pub(crate) fn directive_resource() -> ApiResource {
    ApiResource::erase::<Duplicator>(&())
}

pub(crate) fn namespace_resource() -> ApiResource {
    ApiResource::erase::<Namespace>(&())
}
