// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Routing policy metadata carried in provider-specific properties.
//!
//! Two representations exist for load-balanced names:
//!
//! - **Unmerged**: one endpoint per member, each carrying a `geo-code` or `weight`
//!   property. This is what the desired-state source produces.
//! - **Merged**: one endpoint per name carrying a single `routingpolicy` marker and one
//!   property per target holding that target's geo code or weight. This is what
//!   providers with native routing policies read back.
//!
//! [`endpoints_to_provider_format`] converts the former into the latter so that the
//! desired state diffs cleanly against the read-back state.

use super::{Endpoint, ProviderSpecific};
use crate::constants::{
    GEO_CODE_KEY, ROUTING_POLICY_GEO, ROUTING_POLICY_KEY, ROUTING_POLICY_WEIGHTED, WEIGHT_KEY,
};
use crate::endpoint::RecordType;
use std::collections::BTreeMap;
use tracing::debug;

/// Routing policy of a merged endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutingPolicy {
    Geo,
    Weighted,
}

impl RoutingPolicy {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geo => ROUTING_POLICY_GEO,
            Self::Weighted => ROUTING_POLICY_WEIGHTED,
        }
    }

    /// Parse the value of a `routingpolicy` property.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            ROUTING_POLICY_GEO => Some(Self::Geo),
            ROUTING_POLICY_WEIGHTED => Some(Self::Weighted),
            _ => None,
        }
    }
}

/// Routing policy of an endpoint, if it carries one.
///
/// TXT endpoints never carry a routing policy.
#[must_use]
pub fn routing_policy(endpoint: &Endpoint) -> Option<RoutingPolicy> {
    if endpoint.record_type == RecordType::TXT {
        return None;
    }
    endpoint
        .provider_specific
        .get(ROUTING_POLICY_KEY)
        .and_then(RoutingPolicy::parse)
}

/// Parse a weight, falling back to zero for malformed values.
#[must_use]
pub fn parse_weight(value: &str) -> f64 {
    match value.trim().parse::<f64>() {
        Ok(weight) if weight.is_finite() && weight >= 0.0 => weight,
        _ => {
            debug!(weight = %value, "Unparsable weight, defaulting to 0");
            0.0
        }
    }
}

/// Render a weight the way it is stored in provider-specific properties.
///
/// Whole numbers render without a fractional part so that `"100"` survives a
/// parse/format cycle unchanged.
#[must_use]
pub fn format_weight(weight: f64) -> String {
    if weight.fract() == 0.0 && weight.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = weight as i64;
        whole.to_string()
    } else {
        weight.to_string()
    }
}

/// Group the targets of a merged endpoint by their per-target policy value.
///
/// Groups keep the order in which their value first appears. Weighted values are
/// normalized through [`parse_weight`], so malformed weights fall into the `"0"` group.
/// Targets without a property fall into the empty-value group (geo) or `"0"` (weighted).
#[must_use]
pub fn group_targets_by_policy_value(
    endpoint: &Endpoint,
    policy: RoutingPolicy,
) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for target in &endpoint.targets {
        let raw = endpoint.provider_specific.get(target).unwrap_or_default();
        let value = match policy {
            RoutingPolicy::Geo => raw.to_string(),
            RoutingPolicy::Weighted => format_weight(parse_weight(raw)),
        };
        match groups.iter_mut().find(|(v, _)| *v == value) {
            Some((_, targets)) => targets.push(target.clone()),
            None => groups.push((value, vec![target.clone()])),
        }
    }
    groups
}

/// Merge endpoints sharing a DNS name into the single-record form used by providers
/// with native routing policies.
///
/// Groups by `dns_name`, taking TTL and record type from the first member. A group is
/// merged when any member carries a `geo-code` or `weight` property; each target is then
/// annotated with its member's geo code or weight and one `routingpolicy` marker is
/// added. Endpoints already in merged form, and groups without markers, pass through.
/// When unmarked endpoints share a name, only the first one is kept.
#[must_use]
pub fn endpoints_to_provider_format(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<Endpoint>> = BTreeMap::new();
    let mut merged_already: Vec<Endpoint> = Vec::new();

    for endpoint in endpoints {
        if endpoint.provider_specific.contains(ROUTING_POLICY_KEY) {
            merged_already.push(endpoint);
            continue;
        }
        if !groups.contains_key(&endpoint.dns_name) {
            order.push(endpoint.dns_name.clone());
        }
        groups
            .entry(endpoint.dns_name.clone())
            .or_default()
            .push(endpoint);
    }

    let mut result = merged_already;
    for name in order {
        let Some(members) = groups.remove(&name) else {
            continue;
        };
        let is_geo = members
            .iter()
            .any(|e| e.provider_specific.contains(GEO_CODE_KEY));
        let is_weighted = members
            .iter()
            .any(|e| e.provider_specific.contains(WEIGHT_KEY));

        if !is_geo && !is_weighted {
            if members.len() > 1 {
                debug!(
                    dns_name = %name,
                    dropped = members.len() - 1,
                    "Multiple endpoints without routing markers share a name, keeping the first"
                );
            }
            result.extend(members.into_iter().take(1));
            continue;
        }

        let (policy, member_key) = if is_geo {
            (RoutingPolicy::Geo, GEO_CODE_KEY)
        } else {
            (RoutingPolicy::Weighted, WEIGHT_KEY)
        };

        let first = &members[0];
        let mut merged = Endpoint::new(&first.dns_name, first.record_type, Vec::new());
        merged.ttl = first.ttl;
        merged.labels = first.labels.clone();

        let mut properties = ProviderSpecific::new();
        properties.set(ROUTING_POLICY_KEY, policy.as_str());
        for member in &members {
            let raw = member
                .provider_specific
                .get(member_key)
                .unwrap_or_default();
            let value = match policy {
                RoutingPolicy::Geo => raw.to_string(),
                RoutingPolicy::Weighted => format_weight(parse_weight(raw)),
            };
            for target in &member.targets {
                if !merged.targets.contains(target) {
                    merged.targets.push(target.clone());
                }
                properties.set(target.clone(), value.clone());
            }
        }
        merged.provider_specific = properties;
        result.push(merged);
    }

    result
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;
