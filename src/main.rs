//! # Resource Duplicator
//!
//! A Kubernetes controller that keeps copies of selected resources synchronized
//! from a source namespace into every namespace matching a label selector.
//!
//! ## Overview
//!
//! Each `Duplicator` names a namespace selector and a list of target objects.
//! The controller:
//!
//! 1. **Watches directives** - every `Duplicator` in every namespace
//! 2. **Watches namespaces** - newly labelled namespaces receive their replicas immediately
//! 3. **Watches sources** - edits to a copied ConfigMap or Secret propagate without waiting for resync
//! 4. **Cleans up** - a finalizer holds directive deletion until every replica is gone
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! cargo run --bin resource-duplicator
//! ```

use anyhow::Result;
use resource_duplicator::runtime::initialization::initialize;
use resource_duplicator::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.client,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await
}
