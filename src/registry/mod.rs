// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ownership registries.
//!
//! A registry sits between the planner and a provider. On read it annotates provider
//! records with ownership labels (see [`crate::endpoint::labels`]); on write it adds the
//! bookkeeping changes that persist ownership next to the records themselves.
//!
//! - [`NoopRegistry`] - no ownership; the planner owns every record
//! - [`txt::TxtRegistry`] - one TXT record per owner and record

pub mod txt;

use crate::endpoint::Endpoint;
use crate::errors::ProviderError;
use crate::plan::Changes;
use crate::provider::Provider;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ownership layer over a [`Provider`].
#[async_trait]
pub trait Registry: Send + Sync {
    /// Owner on whose behalf changes are planned; `None` disables ownership checks.
    fn owner_id(&self) -> Option<&str>;

    /// Provider the registry writes to.
    fn provider(&self) -> &dyn Provider;

    /// Provider records, annotated with ownership labels.
    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, ProviderError>;

    /// Apply `changes` together with the registry's own bookkeeping changes.
    async fn apply_changes(
        &self,
        changes: Changes,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// Normalize desired endpoints; delegates to the provider.
    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        self.provider().adjust_endpoints(endpoints)
    }
}

/// Registry that records no ownership.
pub struct NoopRegistry {
    provider: Arc<dyn Provider>,
}

impl NoopRegistry {
    #[must_use]
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Registry for NoopRegistry {
    fn owner_id(&self) -> Option<&str> {
        None
    }

    fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, ProviderError> {
        self.provider.records(cancel).await
    }

    async fn apply_changes(
        &self,
        changes: Changes,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        self.provider.apply_changes(changes, cancel).await
    }
}
