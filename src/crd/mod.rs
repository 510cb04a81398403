//! # Custom Resource Definitions
//!
//! CRD types for the Resource Duplicator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Duplicator` specification (selector and target resources)
//! - `status.rs` - Status types surfacing the last reconciliation outcome

mod spec;
mod status;

pub use spec::{Duplicator, DuplicatorSpec, NamespaceSelector, TargetResource};
pub use status::{
    Condition, DuplicatorStatus, CONDITION_READY, PHASE_FAILED, PHASE_PROGRESSING, PHASE_READY,
    REASON_INVALID_SPEC, REASON_RETRY_PENDING, REASON_SYNCED, REASON_UNSUPPORTED_KIND,
};
