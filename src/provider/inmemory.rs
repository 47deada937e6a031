// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory provider.
//!
//! Zones are fixed at construction and records live in a process-local map. Each batch
//! is validated against the current state and applied atomically: deleting or updating
//! a record that does not exist, or creating one that already exists, rejects the whole
//! batch.

use super::{submit_changes, Credentials, Provider, ProviderConfig};
use crate::constants::{CREDENTIALS_KEY_INMEMORY_ZONES, PROVIDER_INMEMORY};
use crate::endpoint::{normalize_dns_name, Endpoint, EndpointKey, Labels};
use crate::errors::{ConfigError, ProviderError};
use crate::plan::batch::{ChangeSink, ZoneChange};
use crate::plan::Changes;
use crate::zone::Zone;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type ZoneRecords = BTreeMap<EndpointKey, Endpoint>;

/// Provider keeping its zones in memory.
pub struct InMemoryProvider {
    config: ProviderConfig,
    zones: BTreeMap<String, Zone>,
    records: RwLock<BTreeMap<String, ZoneRecords>>,
}

impl InMemoryProvider {
    /// Create a provider serving `zone_names`. Zone ids equal the zone names.
    #[must_use]
    pub fn new(zone_names: &[String], config: ProviderConfig) -> Self {
        let zones: BTreeMap<String, Zone> = zone_names
            .iter()
            .map(|name| normalize_dns_name(name.trim()))
            .filter(|name| !name.is_empty())
            .map(|name| (name.clone(), Zone::new(name.clone(), name.clone(), &name)))
            .collect();
        let records = zones.keys().map(|id| (id.clone(), ZoneRecords::new())).collect();
        Self {
            config,
            zones,
            records: RwLock::new(records),
        }
    }

    /// Build from credentials; `INMEMORY_ZONES` is an optional comma separated list.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other provider constructors.
    pub fn from_credentials(
        credentials: &Credentials,
        config: ProviderConfig,
    ) -> Result<Self, ConfigError> {
        let zone_names: Vec<String> = credentials
            .get_str(CREDENTIALS_KEY_INMEMORY_ZONES)
            .map(|zones| zones.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self::new(&zone_names, config))
    }

    /// Records currently stored in `zone_id`.
    pub async fn zone_records(&self, zone_id: &str) -> Vec<Endpoint> {
        self.records
            .read()
            .await
            .get(zone_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Validate `batch` against `records` and apply it, or leave `records` untouched.
    fn apply_batch(
        zone: &Zone,
        records: &mut ZoneRecords,
        batch: &ZoneChange,
    ) -> Result<(), ProviderError> {
        let mut staged = records.clone();
        for endpoint in &batch.deletions {
            if staged.remove(&endpoint.key()).is_none() {
                return Err(ProviderError::InvalidChange {
                    zone: zone.id.clone(),
                    reason: format!("record {} does not exist", endpoint.key()),
                });
            }
        }
        for endpoint in &batch.additions {
            let key = endpoint.key();
            if staged.contains_key(&key) {
                return Err(ProviderError::InvalidChange {
                    zone: zone.id.clone(),
                    reason: format!("record {key} already exists"),
                });
            }
            let mut stored = endpoint.clone();
            stored.labels = Labels::new();
            staged.insert(key, stored);
        }
        *records = staged;
        Ok(())
    }
}

#[async_trait]
impl ChangeSink for InMemoryProvider {
    async fn submit(&self, zone: &Zone, batch: &ZoneChange) -> Result<(), ProviderError> {
        let mut state = self.records.write().await;
        let records = state.entry(zone.id.clone()).or_default();
        Self::apply_batch(zone, records, batch)?;
        debug!(zone = %zone.id, records = records.len(), "Applied in-memory batch");
        Ok(())
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    fn name(&self) -> &'static str {
        PROVIDER_INMEMORY
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn zones(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, Zone>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled("listing zones"));
        }
        let filter = self.config.zone_filter();
        Ok(self
            .zones
            .iter()
            .filter(|(_, zone)| filter.matches(zone))
            .map(|(id, zone)| (id.clone(), zone.clone()))
            .collect())
    }

    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, ProviderError> {
        let zones = self.zones(cancel).await?;
        let state = self.records.read().await;
        Ok(zones
            .keys()
            .filter_map(|id| state.get(id))
            .flat_map(|records| records.values().cloned())
            .collect())
    }

    async fn apply_changes(
        &self,
        changes: Changes,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        submit_changes(self, self, changes, cancel).await
    }
}

/// Constructor registered in the provider factory.
///
/// # Errors
///
/// See [`InMemoryProvider::from_credentials`].
pub fn build(
    credentials: &Credentials,
    config: ProviderConfig,
) -> Result<Arc<dyn Provider>, ConfigError> {
    Ok(Arc::new(InMemoryProvider::from_credentials(
        credentials,
        config,
    )?))
}

#[cfg(test)]
#[path = "inmemory_tests.rs"]
mod inmemory_tests;
