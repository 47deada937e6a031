// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! One reconcile pass.
//!
//! ```text
//! desired ─► HealthFilter ─► Registry::adjust_endpoints ─┐
//!                                                        ├─► Plan::calculate ─► Registry::apply_changes
//!                           Registry::records ───────────┘
//! ```
//!
//! The caller owns the loop: it decides when to run a pass, with which desired endpoints
//! and liveness, and what to do with the returned [`ReconcileOutcome`].

use crate::endpoint::{normalize_dns_name, Endpoint};
use crate::errors::{ProviderError, ReconcileError};
use crate::health::{HealthFilter, Liveness};
use crate::metrics;
use crate::plan::{ChangeSummary, Plan, Policy};
use crate::provider::factory::ProviderFactory;
use crate::provider::{Credentials, ProviderConfig};
use crate::registry::txt::TxtRegistry;
use crate::registry::{NoopRegistry, Registry};
use crate::status::{create_condition, Condition};
use crate::status_reasons::{
    CONDITION_TYPE_READY, REASON_CANCELLED, REASON_CONFIGURATION_ERROR, REASON_DRY_RUN,
    REASON_PROVIDER_ERROR, REASON_RECONCILE_SUCCESS, STATUS_FALSE, STATUS_TRUE,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Settings of the reconcile pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReconcilerConfig {
    pub policy: Policy,
}

/// Result of one pass, ready to be written to a status.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub condition: Condition,
    /// Planned changes, including those not applied because the pass failed
    pub changes: ChangeSummary,
    /// SHA-256 of the desired endpoints, hex encoded
    pub endpoints_hash: String,
}

impl ReconcileOutcome {
    /// Outcome of a pass that failed before any change was planned.
    #[must_use]
    pub fn failed(error: &ReconcileError, desired: &[Endpoint]) -> Self {
        Self {
            condition: failure_condition(error),
            changes: ChangeSummary::default(),
            endpoints_hash: calculate_endpoints_hash(&normalize(desired.to_vec())),
        }
    }
}

pub struct Reconciler {
    registry: Arc<dyn Registry>,
    config: ReconcilerConfig,
}

impl Reconciler {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, config: ReconcilerConfig) -> Self {
        Self { registry, config }
    }

    /// Build the provider registered as `provider` and wrap it in a TXT registry when
    /// `owner_id` is set, or in a registry without ownership otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Config`] for an unknown provider, bad credentials or an
    /// invalid owner id.
    pub fn from_factory(
        factory: &ProviderFactory,
        provider: &str,
        credentials: &Credentials,
        provider_config: ProviderConfig,
        owner_id: Option<String>,
        txt_prefix: &str,
        config: ReconcilerConfig,
    ) -> Result<Self, ReconcileError> {
        let provider = factory.build(provider, credentials, provider_config)?;
        let registry: Arc<dyn Registry> = match owner_id {
            Some(owner) => Arc::new(TxtRegistry::new(provider, owner, txt_prefix)?),
            None => Arc::new(NoopRegistry::new(provider)),
        };
        Ok(Self::new(registry, config))
    }

    /// Run one pass and report its outcome as a `Ready` condition.
    ///
    /// Failures never escape as errors: they end up in the condition, with the backend's
    /// message verbatim.
    pub async fn reconcile(
        &self,
        desired: Vec<Endpoint>,
        liveness: &Liveness,
        cancel: &CancellationToken,
    ) -> ReconcileOutcome {
        let provider = self.registry.provider().name();
        let dry_run = self.registry.provider().config().dry_run;
        let desired = normalize(desired);
        let endpoints_hash = calculate_endpoints_hash(&desired);
        let started = Instant::now();

        let mut changes = ChangeSummary::default();
        let result = self
            .try_reconcile(desired, liveness, &mut changes, cancel)
            .await;
        metrics::record_reconcile(provider, result.is_ok(), started.elapsed());

        let condition = match result {
            Ok(()) => {
                info!(
                    provider = %provider,
                    created = changes.created,
                    updated = changes.updated,
                    deleted = changes.deleted,
                    dry_run = dry_run,
                    "Reconcile pass finished"
                );
                let reason = if dry_run {
                    REASON_DRY_RUN
                } else {
                    REASON_RECONCILE_SUCCESS
                };
                create_condition(
                    CONDITION_TYPE_READY,
                    STATUS_TRUE,
                    reason,
                    &summary_message(&changes, dry_run),
                )
            }
            Err(e) => {
                if e.is_cancelled() {
                    warn!(provider = %provider, error = %e, "Reconcile pass cancelled");
                } else {
                    error!(provider = %provider, error = %e, "Reconcile pass failed");
                }
                failure_condition(&e)
            }
        };

        ReconcileOutcome {
            condition,
            changes,
            endpoints_hash,
        }
    }

    /// Run one pass, filling `summary` as soon as the changes are planned.
    ///
    /// # Errors
    ///
    /// Returns the first provider error; see [`crate::plan::batch::ChangeSubmitter`] for
    /// how a failing batch affects the others.
    pub async fn try_reconcile(
        &self,
        desired: Vec<Endpoint>,
        liveness: &Liveness,
        summary: &mut ChangeSummary,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let desired = HealthFilter::filter(desired, liveness);
        let desired = self.registry.adjust_endpoints(desired);

        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled("reading records").into());
        }
        let current = self.registry.records(cancel).await?;

        let changes = Plan {
            current,
            desired,
            owner_id: self.registry.owner_id().map(str::to_string),
            policy: self.config.policy,
        }
        .calculate();
        *summary = changes.summary();

        self.registry.apply_changes(changes, cancel).await?;
        Ok(())
    }
}

/// SHA-256 over the JSON form of `endpoints`, order-independent.
#[must_use]
pub fn calculate_endpoints_hash(endpoints: &[Endpoint]) -> String {
    let mut sorted: Vec<&Endpoint> = endpoints.iter().collect();
    sorted.sort_by_key(|endpoint| endpoint.key());
    let json = serde_json::to_string(&sorted).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    endpoints
        .into_iter()
        .map(|mut endpoint| {
            endpoint.dns_name = normalize_dns_name(&endpoint.dns_name).to_ascii_lowercase();
            endpoint.labels.clear();
            endpoint
        })
        .collect()
}

fn failure_condition(error: &ReconcileError) -> Condition {
    let reason = match error {
        ReconcileError::Config(_) => REASON_CONFIGURATION_ERROR,
        e if e.is_cancelled() => REASON_CANCELLED,
        ReconcileError::Provider(_) => REASON_PROVIDER_ERROR,
    };
    create_condition(CONDITION_TYPE_READY, STATUS_FALSE, reason, &error.to_string())
}

fn summary_message(changes: &ChangeSummary, dry_run: bool) -> String {
    let total = changes.created + changes.updated + changes.deleted;
    if total == 0 {
        return "All records are up to date".to_string();
    }
    let verb = if dry_run { "planned" } else { "applied" };
    format!(
        "{total} changes {verb} ({} created, {} updated, {} deleted)",
        changes.created, changes.updated, changes.deleted
    )
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
