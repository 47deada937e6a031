// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health filtering of desired endpoints.
//!
//! Liveness is probed elsewhere; this module only consumes the result, a map from target
//! to `true` (alive) or `false` (dead). Targets missing from the map count as alive.

use crate::endpoint::{Endpoint, RecordType};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Liveness per target, as reported by an external prober.
pub type Liveness = BTreeMap<String, bool>;

/// Removes dead targets from desired endpoints.
pub struct HealthFilter;

impl HealthFilter {
    /// Drop targets reported dead, together with their per-target provider-specific
    /// entries. Members of a routing policy left without targets are dropped.
    ///
    /// Liveness is judged per name and record type, across every member sharing them:
    /// when all of their targets are dead the members are returned unchanged rather than
    /// emptied. TXT endpoints are never filtered.
    #[must_use]
    pub fn filter(endpoints: Vec<Endpoint>, liveness: &Liveness) -> Vec<Endpoint> {
        if liveness.is_empty() {
            return endpoints;
        }
        let is_alive = |target: &String| liveness.get(target).copied().unwrap_or(true);

        let mut any_alive: BTreeMap<(String, RecordType), bool> = BTreeMap::new();
        for endpoint in &endpoints {
            let alive = any_alive
                .entry((endpoint.dns_name.clone(), endpoint.record_type))
                .or_insert(false);
            *alive |= endpoint.targets.iter().any(is_alive);
        }

        endpoints
            .into_iter()
            .filter_map(|mut endpoint| {
                if endpoint.record_type == RecordType::TXT {
                    return Some(endpoint);
                }
                let (alive, dead): (Vec<String>, Vec<String>) =
                    endpoint.targets.iter().cloned().partition(is_alive);
                if dead.is_empty() {
                    return Some(endpoint);
                }
                let group = (endpoint.dns_name.clone(), endpoint.record_type);
                if !any_alive.get(&group).copied().unwrap_or(true) {
                    warn!(
                        record = %endpoint.key(),
                        targets = dead.len(),
                        "Every target is unhealthy, publishing the record unfiltered"
                    );
                    return Some(endpoint);
                }

                debug!(record = %endpoint.key(), removed = ?dead, "Removing unhealthy targets");
                if alive.is_empty() {
                    return None;
                }
                for target in &dead {
                    endpoint.provider_specific.remove(target);
                }
                endpoint.targets = alive;
                Some(endpoint)
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod health_tests;
