// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone partitioning, batching and paced submission of changes.
//!
//! # Algorithm
//!
//! 1. **Partition by zone** - every addition and deletion is assigned to the zone with the
//!    longest matching domain suffix. Records matching no zone are dropped with a warning.
//! 2. **Batch within a zone** - changes are grouped by record name, names are sorted, and
//!    whole name groups are packed greedily into batches no larger than the batch size.
//!    A name is never split across batches; a name whose own change count exceeds the
//!    batch size is skipped for this pass. A batch size of `0` disables batching.
//! 3. **Submit** - each batch is logged line by line and handed to a [`ChangeSink`],
//!    pausing a fixed interval between submissions. The first failure aborts the remaining
//!    batches of that zone.

use crate::endpoint::Endpoint;
use crate::errors::ProviderError;
use crate::metrics;
use crate::zone::{find_zone, Zone};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Additions and deletions targeting one zone (or not yet partitioned).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneChange {
    pub additions: Vec<Endpoint>,
    pub deletions: Vec<Endpoint>,
}

impl ZoneChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.additions.len() + self.deletions.len()
    }
}

/// Provider-native submission of one batch.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    /// Submit one batch to `zone` as a single provider change request.
    async fn submit(&self, zone: &Zone, batch: &ZoneChange) -> Result<(), ProviderError>;
}

/// Split `change` by owning zone.
///
/// Zones left without changes are not present in the result.
#[must_use]
pub fn partition_by_zone(
    change: ZoneChange,
    zones: &BTreeMap<String, Zone>,
) -> BTreeMap<String, ZoneChange> {
    let mut partitioned: BTreeMap<String, ZoneChange> = BTreeMap::new();

    for (endpoint, is_addition) in change
        .additions
        .into_iter()
        .map(|e| (e, true))
        .chain(change.deletions.into_iter().map(|e| (e, false)))
    {
        let Some(zone_id) = find_zone(zones, &endpoint.dns_name) else {
            warn!(
                record = %endpoint.dns_name,
                record_type = %endpoint.record_type,
                "No matching zone for record, skipping"
            );
            metrics::record_dropped("no_matching_zone");
            continue;
        };
        let entry = partitioned.entry(zone_id.to_string()).or_default();
        if is_addition {
            entry.additions.push(endpoint);
        } else {
            entry.deletions.push(endpoint);
        }
    }

    partitioned.retain(|_, change| !change.is_empty());
    partitioned
}

/// Split one zone's change into batches of at most `batch_size` record changes.
///
/// Changes for one record name always travel together. Names are visited in
/// lexicographic order. A `batch_size` of `0` returns the change as a single batch.
#[must_use]
pub fn batch_change(change: ZoneChange, batch_size: usize) -> Vec<ZoneChange> {
    if change.is_empty() {
        return Vec::new();
    }
    if batch_size == 0 {
        return vec![change];
    }

    let mut by_name: BTreeMap<String, ZoneChange> = BTreeMap::new();
    for endpoint in change.additions {
        by_name
            .entry(endpoint.dns_name.clone())
            .or_default()
            .additions
            .push(endpoint);
    }
    for endpoint in change.deletions {
        by_name
            .entry(endpoint.dns_name.clone())
            .or_default()
            .deletions
            .push(endpoint);
    }

    let mut batches = Vec::new();
    let mut current = ZoneChange::default();
    for (name, group) in by_name {
        if group.len() > batch_size {
            warn!(
                record = %name,
                changes = group.len(),
                batch_size = batch_size,
                "Record name has more changes than the batch size allows, skipping"
            );
            metrics::record_dropped("batch_size_exceeded");
            continue;
        }
        if current.len() + group.len() > batch_size {
            batches.push(std::mem::take(&mut current));
        }
        current.additions.extend(group.additions);
        current.deletions.extend(group.deletions);
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Submits partitioned, batched changes through a [`ChangeSink`].
#[derive(Clone, Debug)]
pub struct ChangeSubmitter {
    /// Provider name, for logs and metrics
    pub provider: &'static str,
    pub batch_size: usize,
    pub interval: Duration,
    pub dry_run: bool,
}

impl ChangeSubmitter {
    /// Partition `change` over `zones`, batch each zone and submit every batch.
    ///
    /// Batches of a zone stop at the first failure. Remaining zones are still attempted
    /// and the first error is returned once all zones were processed. Cancellation aborts
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns the first submission error, or [`ProviderError::Cancelled`].
    pub async fn submit(
        &self,
        sink: &dyn ChangeSink,
        zones: &BTreeMap<String, Zone>,
        change: ZoneChange,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let mut first_error = None;
        let mut submitted_any = false;

        for (zone_id, zone_change) in partition_by_zone(change, zones) {
            let Some(zone) = zones.get(&zone_id) else {
                continue;
            };
            let batches = batch_change(zone_change, self.batch_size);
            let total = batches.len();

            for (index, batch) in batches.into_iter().enumerate() {
                if submitted_any && !self.dry_run {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return Err(ProviderError::cancelled("waiting between change batches"));
                        }
                        () = tokio::time::sleep(self.interval) => {}
                    }
                }
                if cancel.is_cancelled() {
                    return Err(ProviderError::cancelled("submitting change batches"));
                }

                self.log_batch(zone, &batch, index + 1, total);
                if self.dry_run {
                    continue;
                }

                submitted_any = true;
                match sink.submit(zone, &batch).await {
                    Ok(()) => {
                        metrics::record_batch_submitted(self.provider, &zone.id, &batch);
                    }
                    Err(e) => {
                        error!(
                            provider = self.provider,
                            zone = %zone.id,
                            batch = index + 1,
                            batches = total,
                            error = %e,
                            "Change batch failed, skipping remaining batches for zone"
                        );
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                        break;
                    }
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn log_batch(&self, zone: &Zone, batch: &ZoneChange, index: usize, total: usize) {
        for endpoint in &batch.deletions {
            info!(
                provider = self.provider,
                zone = %zone.id,
                dry_run = self.dry_run,
                "Del records: {endpoint}"
            );
        }
        for endpoint in &batch.additions {
            info!(
                provider = self.provider,
                zone = %zone.id,
                dry_run = self.dry_run,
                "Add records: {endpoint}"
            );
        }
        info!(
            provider = self.provider,
            zone = %zone.id,
            batch = index,
            batches = total,
            changes = batch.len(),
            dry_run = self.dry_run,
            "Submitting change batch"
        );
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod batch_tests;
