//! # Controller
//!
//! The reconciliation core.
//!
//! Leaf-first: `selector` decides which namespaces a directive targets,
//! `registry` resolves target kinds, `duplicate` derives the replica of a
//! source object, `upsert` writes it idempotently, `finalizer` guards
//! deletion, `reconciler` orchestrates one directive, and `router` turns
//! namespace and source changes into reconcile requests.

pub mod backoff;
pub mod duplicate;
pub mod finalizer;
pub mod reconciler;
pub mod registry;
pub mod router;
pub mod selector;
pub mod upsert;
