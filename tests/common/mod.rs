// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zonemux::endpoint::{Endpoint, RecordType};
use zonemux::health::Liveness;
use zonemux::provider::inmemory::InMemoryProvider;
use zonemux::provider::ProviderConfig;
use zonemux::reconciler::{ReconcileOutcome, Reconciler, ReconcilerConfig};
use zonemux::registry::txt::TxtRegistry;

pub const ZONE: &str = "example.net";

/// In-memory backend serving [`ZONE`], without pacing.
pub fn backend() -> Arc<InMemoryProvider> {
    Arc::new(InMemoryProvider::new(
        &[ZONE.to_string()],
        ProviderConfig {
            batch_change_interval: 0,
            ..Default::default()
        },
    ))
}

/// Reconciler writing into `backend` on behalf of `owner`.
pub fn owner(backend: &Arc<InMemoryProvider>, owner: &str, config: ReconcilerConfig) -> Reconciler {
    let registry = TxtRegistry::new(backend.clone(), owner, "").expect("valid owner id");
    Reconciler::new(Arc::new(registry), config)
}

/// Run one pass and fail the test unless it succeeded.
pub async fn pass(reconciler: &Reconciler, desired: Vec<Endpoint>) -> ReconcileOutcome {
    let outcome = reconciler
        .reconcile(desired, &Liveness::new(), &CancellationToken::new())
        .await;
    assert!(
        outcome.condition.is_ready(),
        "reconcile failed: {:?}",
        outcome.condition.message
    );
    outcome
}

pub fn a(name: &str, targets: &[&str]) -> Endpoint {
    Endpoint::new(
        name,
        RecordType::A,
        targets.iter().map(|t| (*t).to_string()).collect(),
    )
}

/// Stored record with the given name and type.
pub async fn stored(
    backend: &InMemoryProvider,
    name: &str,
    record_type: RecordType,
) -> Vec<Endpoint> {
    backend
        .zone_records(ZONE)
        .await
        .into_iter()
        .filter(|r| r.dns_name == name && r.record_type == record_type)
        .collect()
}
