//! # Reconcile
//!
//! One reconciliation of one directive.
//!
//! 1. Fetch the directive; gone means already cleaned up.
//! 2. Deleting: tear down (see `cleanup`).
//! 3. Otherwise validate the spec and resolve every target, add the finalizer,
//!    then converge every (matched namespace, target) pair and prune owned
//!    replicas that fell out of the desired set.
//! 4. Record the result on the directive's status.
//!
//! Pairs are independent: a failure part-way leaves earlier pairs applied and
//! the retry converges the rest, since duplication and upsert are idempotent.

use super::cleanup::{resource_id, source_refs, ReplicaRef};
use super::status::{build_status, stored_status, update_status};
use super::types::{
    directive_resource, namespace_resource, DirectiveKey, Outcome, ReconcileReport, Reconciler,
    ReconcilerError,
};
use super::validation::{validate_directive, validate_distinct_targets};
use crate::controller::duplicate::duplicate;
use crate::controller::finalizer::{add_finalizer, has_finalizer, FinalizerState};
use crate::controller::registry::ResolvedTarget;
use crate::controller::selector;
use crate::controller::upsert::{upsert, UpsertResult};
use crate::crd::{DuplicatorSpec, NamespaceSelector, TargetResource};
use crate::observability::metrics;
use crate::store::{object_key, StoreError};
use kube::core::DynamicObject;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// A target resolved against the registry, with its source namespace settled
#[derive(Debug)]
pub(crate) struct PlannedTarget<'a> {
    pub target: &'a TargetResource,
    pub resolved: ResolvedTarget,
    pub source_namespace: String,
}

impl Reconciler {
    /// Reconcile the directive identified by `key`
    pub async fn reconcile_directive(&self, key: &DirectiveKey) -> Outcome {
        let span = info_span!(
            "controller.reconcile",
            resource.name = %key.name,
            resource.namespace = %key.namespace
        );
        async move {
            let start = Instant::now();
            metrics::increment_reconciliations();

            let outcome = self.reconcile_inner(key).await;

            metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
            metrics::increment_reconcile_outcome(outcome.as_str());
            match &outcome {
                Outcome::Done => debug!("reconciliation complete"),
                Outcome::Retry(e) => {
                    warn!(error = %e, reason = e.reason(), "reconciliation will be retried");
                }
                Outcome::Fatal(e) => error!(error = %e, "reconciliation failed permanently"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn reconcile_inner(&self, key: &DirectiveKey) -> Outcome {
        if let Err(e) = self.ensure_not_cancelled() {
            return Outcome::Retry(e);
        }

        let directive = match self
            .store
            .get(&directive_resource(), Some(&key.namespace), &key.name)
            .await
        {
            Ok(Some(directive)) => directive,
            Ok(None) => {
                debug!("directive not found, nothing to do");
                self.forget_backoff(key);
                return Outcome::Done;
            }
            Err(e) => return Outcome::Retry(e.into()),
        };

        match FinalizerState::of(&directive.metadata) {
            FinalizerState::Released => {
                debug!("directive released, waiting for the store to remove it");
                Outcome::Done
            }
            FinalizerState::Deleting => {
                Outcome::from_result(self.cleanup(&directive, key).await.map(|_| ()))
            }
            FinalizerState::Active | FinalizerState::Protected => {
                self.sync_and_report(directive, key).await
            }
        }
    }

    async fn sync_and_report(&self, directive: DynamicObject, key: &DirectiveKey) -> Outcome {
        let mut current = directive;
        let result = self.sync(&mut current, key).await;

        if matches!(result, Err(ReconcilerError::Cancelled)) {
            return Outcome::Retry(ReconcilerError::Cancelled);
        }

        let previous = stored_status(&current);
        let now = chrono::Utc::now().to_rfc3339();
        let status = build_status(previous.as_ref(), current.metadata.generation, &result, &now);
        let written = update_status(self.store.as_ref(), &current, &status).await;

        match (result, written) {
            (Ok(report), Ok(_)) => {
                info!(
                    namespaces = report.matched_namespaces.len(),
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    pruned = report.deleted,
                    "directive synced"
                );
                Outcome::Done
            }
            (Ok(_), Err(e)) => Outcome::Retry(e.into()),
            (Err(e), Ok(_)) => Outcome::from_result(Err(e)),
            (Err(e), Err(status_error)) => {
                // The original failure decides the outcome
                warn!(error = %status_error, "failed to record failure on status");
                Outcome::from_result(Err(e))
            }
        }
    }

    /// Converge every replica of an active directive
    ///
    /// `directive` is refreshed in place when the finalizer is added.
    async fn sync(
        &self,
        directive: &mut DynamicObject,
        key: &DirectiveKey,
    ) -> Result<ReconcileReport, ReconcilerError> {
        let spec = decode_spec(directive)?;
        validate_directive(key, &spec)?;
        let targets = self.plan_targets(&spec, key)?;
        validate_distinct_targets(&targets)?;
        let source_locations = source_refs(&targets);

        if !has_finalizer(&directive.metadata) {
            self.ensure_not_cancelled()?;
            *directive = add_finalizer(self.store.as_ref(), &directive_resource(), directive).await?;
        }

        let namespaces = self.matched_namespaces(&spec.namespace_selector).await?;
        let mut report = ReconcileReport::default();
        let mut sources: HashMap<usize, DynamicObject> = HashMap::new();
        let mut desired: BTreeSet<ReplicaRef> = BTreeSet::new();

        for namespace in &namespaces {
            let Some(ns_name) = namespace.metadata.name.as_deref() else {
                continue;
            };
            if namespace.metadata.deletion_timestamp.is_some() {
                debug!(namespace = ns_name, "skipping terminating namespace");
                continue;
            }
            report.matched_namespaces.push(ns_name.to_string());

            for (index, planned) in targets.iter().enumerate() {
                self.ensure_not_cancelled()?;

                // Never write over any target's source, not only this pair's own
                let location = (
                    resource_id(&planned.resolved.resource),
                    ns_name.to_string(),
                    planned.target.name.clone(),
                );
                if source_locations.contains(&location) {
                    report.skipped += 1;
                    continue;
                }

                if !sources.contains_key(&index) {
                    let source = self.fetch_source(planned).await?;
                    sources.insert(index, source);
                }
                let Some(source) = sources.get(&index) else {
                    continue;
                };

                let replica = duplicate(planned.resolved.strategy.as_ref(), source, ns_name, key)
                    .map_err(|error| ReconcilerError::InvalidSource {
                        kind: planned.target.kind.clone(),
                        key: object_key(Some(&planned.source_namespace), &planned.target.name),
                        error,
                    })?;

                let result =
                    upsert(self.store.as_ref(), &planned.resolved.resource, &replica).await?;
                metrics::increment_replicas_applied(result.as_str());
                if result != UpsertResult::Unchanged {
                    info!(
                        kind = %planned.target.kind,
                        namespace = ns_name,
                        name = %planned.target.name,
                        result = result.as_str(),
                        "replica applied"
                    );
                }
                report.record(result);
                desired.insert(location);
            }
        }

        if self.settings.prune_unmatched_replicas {
            report.deleted = self.prune(key, &targets, &desired).await?;
        }

        report.matched_namespaces.sort();
        Ok(report)
    }

    /// Resolve every target before anything is written
    pub(crate) fn plan_targets<'a>(
        &self,
        spec: &'a DuplicatorSpec,
        key: &DirectiveKey,
    ) -> Result<Vec<PlannedTarget<'a>>, ReconcilerError> {
        spec.target_resources
            .iter()
            .map(|target| {
                Ok(PlannedTarget {
                    target,
                    resolved: self.registry.resolve(target)?,
                    source_namespace: target.source_namespace(&key.namespace).to_string(),
                })
            })
            .collect()
    }

    /// Namespaces whose labels satisfy `selector`, in store order
    pub(crate) async fn matched_namespaces(
        &self,
        selector: &NamespaceSelector,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let namespaces = self
            .store
            .list(&namespace_resource(), None, &selector.match_labels)
            .await?;
        Ok(namespaces
            .into_iter()
            .filter(|ns| selector::matches(&selector.match_labels, ns.metadata.labels.as_ref()))
            .collect())
    }

    async fn fetch_source(&self, planned: &PlannedTarget<'_>) -> Result<DynamicObject, ReconcilerError> {
        self.store
            .get(
                &planned.resolved.resource,
                Some(&planned.source_namespace),
                &planned.target.name,
            )
            .await?
            .ok_or_else(|| ReconcilerError::SourceMissing {
                kind: planned.target.kind.clone(),
                namespace: planned.source_namespace.clone(),
                name: planned.target.name.clone(),
            })
    }
}

/// The directive's spec, decoded from the untyped object
pub(crate) fn decode_spec(directive: &DynamicObject) -> Result<DuplicatorSpec, ReconcilerError> {
    match directive.data.get("spec") {
        None | Some(serde_json::Value::Null) => Ok(DuplicatorSpec::default()),
        Some(spec) => serde_json::from_value(spec.clone())
            .map_err(|e| ReconcilerError::InvalidSpec(format!("spec cannot be decoded: {e}"))),
    }
}
