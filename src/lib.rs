//! Resource Duplicator Library
//!
//! Keeps copies of selected cluster resources (ConfigMaps, Secrets, or any
//! other kind) synchronized from a source namespace into every namespace
//! matching a label selector, and removes those copies when the owning
//! `Duplicator` is deleted.
//!
//! ## Quick Start
//!
//! ```rust
//! use resource_duplicator::prelude::*;
//! ```
//!
//! The reconciliation core (`controller`) only talks to the cluster through
//! the [`store::ObjectStore`] trait, so it can be driven by the Kubernetes
//! API ([`store::KubeStore`]) or by any other store implementation.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod store;
