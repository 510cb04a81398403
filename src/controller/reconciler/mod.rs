//! # Reconciler
//!
//! Core reconciliation logic for `Duplicator` resources.
//!
//! The reconciler:
//! - Adds the finalizer before any replica exists
//! - Copies every target into every namespace the selector matches
//! - Prunes owned replicas that are no longer wanted
//! - Removes every owned replica, then the finalizer, when the directive is deleted
//! - Records the result on the directive's status
//!
//! It never retries on its own: each call returns an [`Outcome`] and the
//! scheduler owns backoff.

mod cleanup;
mod reconcile;
pub mod status;
mod types;
pub mod validation;

pub use types::{
    DirectiveKey, Outcome, ReconcileReport, ReconcileSettings, Reconciler, ReconcilerError,
};
