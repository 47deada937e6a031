// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Change planning.
//!
//! [`Plan::calculate`] diffs the records currently held by a provider against the desired
//! endpoints and produces [`Changes`]. When an owner id is set, the diff is
//! ownership-aware: it only touches records the owner contributed to, and on records
//! shared with other owners it adds or withdraws just this owner's targets.
//!
//! The [`batch`] submodule takes the resulting changes the rest of the way to a provider:
//! partitioning by zone, batching by record name and paced submission.

pub mod batch;

use crate::endpoint::labels;
use crate::endpoint::{Endpoint, EndpointKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Changes to apply to a provider.
///
/// An update is always expressed as the old endpoint in `update_old` and the new one at
/// the same index in `update_new`; providers apply it as a deletion plus an addition.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde(default)]
    pub create: Vec<Endpoint>,
    #[serde(default)]
    pub update_old: Vec<Endpoint>,
    #[serde(default)]
    pub update_new: Vec<Endpoint>,
    #[serde(default)]
    pub delete: Vec<Endpoint>,
}

impl Changes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary {
            created: self.create.len(),
            updated: self.update_new.len(),
            deleted: self.delete.len(),
        }
    }

    fn push_update(&mut self, old: Endpoint, new: Endpoint) {
        self.update_old.push(old);
        self.update_new.push(new);
    }
}

/// Counts of planned changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Whether the planner may remove records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Create, update and delete
    #[default]
    Sync,
    /// Create and update only
    UpsertOnly,
}

/// Inputs of one planning pass.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    /// Records held by the provider, with ownership labels when a registry is in use
    pub current: Vec<Endpoint>,
    /// Desired endpoints of this owner
    pub desired: Vec<Endpoint>,
    /// Owner on whose behalf the plan is made; `None` disables ownership checks
    pub owner_id: Option<String>,
    pub policy: Policy,
}

impl Plan {
    /// Compute the changes moving `current` to `desired`.
    #[must_use]
    pub fn calculate(&self) -> Changes {
        let current = index_first(&self.current, "current");
        let desired = index_first(&self.desired, "desired");
        let mut changes = Changes::default();

        for (key, wanted) in &desired {
            match (current.get(key), self.owner_id.as_deref()) {
                (None, owner) => {
                    let mut created = (*wanted).clone();
                    created.labels.clear();
                    if let Some(owner) = owner {
                        labels::set_owner(&mut created, owner, &wanted.targets);
                    }
                    changes.create.push(created);
                }
                (Some(existing), None) => {
                    if !existing.satisfies(wanted) {
                        changes.push_update((*existing).clone(), (*wanted).clone());
                    }
                }
                (Some(existing), Some(owner)) => {
                    if labels::owners(existing).is_empty() {
                        warn!(
                            record = %key,
                            owner = %owner,
                            "Record exists without an owner, leaving it untouched"
                        );
                        continue;
                    }
                    let merged = merge_owner_contribution(existing, wanted, owner);
                    if !existing.satisfies(&merged) || existing.labels != merged.labels {
                        changes.push_update((*existing).clone(), merged);
                    }
                }
            }
        }

        if self.policy == Policy::UpsertOnly {
            return changes;
        }

        for (key, existing) in &current {
            if desired.contains_key(key) {
                continue;
            }
            match self.owner_id.as_deref() {
                None => changes.delete.push((*existing).clone()),
                Some(owner) => {
                    let owners = labels::owners(existing);
                    if !owners.iter().any(|o| o == owner) {
                        continue;
                    }
                    if owners.len() == 1 {
                        changes.delete.push((*existing).clone());
                    } else {
                        debug!(
                            record = %key,
                            owner = %owner,
                            remaining = owners.len() - 1,
                            "Withdrawing contribution from shared record"
                        );
                        let withdrawn = withdraw_owner_contribution(existing, owner);
                        changes.push_update((*existing).clone(), withdrawn);
                    }
                }
            }
        }

        changes
    }
}

fn index_first<'a>(endpoints: &'a [Endpoint], side: &str) -> BTreeMap<EndpointKey, &'a Endpoint> {
    let mut index = BTreeMap::new();
    for endpoint in endpoints {
        let key = endpoint.key();
        if index.contains_key(&key) {
            debug!(record = %key, side = %side, "Duplicate endpoint, keeping the first");
            continue;
        }
        index.insert(key, endpoint);
    }
    index
}

/// Replace `owner`'s previous contribution to `existing` with the targets of `wanted`.
///
/// Targets previously contributed by `owner` and no longer wanted are removed unless
/// another owner contributed them too. Per-target provider-specific properties follow
/// their targets; other properties of `wanted` (such as the routing policy marker) are
/// set on the result. The TTL of `wanted` wins when set.
#[must_use]
pub fn merge_owner_contribution(existing: &Endpoint, wanted: &Endpoint, owner: &str) -> Endpoint {
    let previous: BTreeSet<String> = labels::owned_targets(existing, owner)
        .unwrap_or_default()
        .into_iter()
        .collect();
    let others = labels::targets_of_other_owners(existing, owner);

    let mut merged = existing.clone();
    let (kept, removed): (Vec<String>, Vec<String>) =
        existing.targets.iter().cloned().partition(|target| {
            !previous.contains(target) || others.contains(target) || wanted.targets.contains(target)
        });
    merged.targets = kept;
    for target in &removed {
        merged.provider_specific.remove(target);
    }

    for target in &wanted.targets {
        if !merged.targets.contains(target) {
            merged.targets.push(target.clone());
        }
    }
    for property in wanted.provider_specific.iter() {
        merged
            .provider_specific
            .set(property.name.clone(), property.value.clone());
    }
    if matches!(wanted.ttl, Some(ttl) if ttl > 0) {
        merged.ttl = wanted.ttl;
    }

    labels::set_owner(&mut merged, owner, &wanted.targets);
    merged
}

/// Remove `owner`'s contribution from a record shared with other owners.
#[must_use]
pub fn withdraw_owner_contribution(existing: &Endpoint, owner: &str) -> Endpoint {
    let previous: BTreeSet<String> = labels::owned_targets(existing, owner)
        .unwrap_or_default()
        .into_iter()
        .collect();
    let others = labels::targets_of_other_owners(existing, owner);

    let mut withdrawn = existing.clone();
    withdrawn
        .targets
        .retain(|target| !previous.contains(target) || others.contains(target));
    for target in previous.difference(&others) {
        withdrawn.provider_specific.remove(target);
    }
    labels::remove_owner(&mut withdrawn, owner);
    withdrawn
}
