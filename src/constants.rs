//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the `Duplicator` custom resource
pub const API_GROUP: &str = "syoze.syoze.fr";

/// Finalizer that blocks deletion of a `Duplicator` until its replicas are gone
pub const DUPLICATOR_FINALIZER: &str = "syoze.syoze.fr/duplicator-finalizer";

/// Label marking an object as a replica written by this controller
pub const LABEL_MANAGED: &str = "syoze.syoze.fr/managed";

/// Label carrying the name of the owning `Duplicator`
pub const LABEL_MANAGED_BY_NAME: &str = "syoze.syoze.fr/managed-by-name";

/// Label carrying the namespace of the owning `Duplicator`
pub const LABEL_MANAGED_BY_NAMESPACE: &str = "syoze.syoze.fr/managed-by-namespace";

/// Value of [`LABEL_MANAGED`] on every replica
pub const MANAGED_VALUE: &str = "true";

/// Field manager reported on every write
pub const FIELD_MANAGER: &str = "resource-duplicator";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default requeue interval after a successful reconciliation (seconds)
/// Picks up changes that no watch reports, such as a namespace losing a label
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default minimum retry backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default maximum retry backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default number of directives reconciled concurrently
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Maximum length of a label value (the directive name is written into one)
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// Initial backoff applied when the API server answers a watch with 429 (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 2000;

/// Cap on the watch stream backoff (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;
