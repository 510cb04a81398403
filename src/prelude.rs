//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use resource_duplicator::prelude::*;
//! ```
//!
//! This brings into scope:
//! - The CRD types (`Duplicator`, `DuplicatorSpec`, ...)
//! - The object store seam (`ObjectStore`, `StoreError`)
//! - Reconciler types (`Reconciler`, `Outcome`, `ReconcilerError`, ...)
//! - The kind registry (`KindRegistry`, `KindStrategy`)
//! - Controller configuration

pub use crate::crd::*;

pub use crate::store::{KubeStore, ObjectStore, StoreError};

pub use crate::controller::reconciler::{
    DirectiveKey, Outcome, ReconcileReport, ReconcileSettings, Reconciler, ReconcilerError,
};

pub use crate::controller::registry::{KindRegistry, KindStrategy, RegistryError};

pub use crate::config::{ControllerConfig, ServerConfig};
