//! # Runtime
//!
//! Process wiring around the reconciliation core: start-up, the kube-runtime
//! controller loop, and the error policy feeding its work queue.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
