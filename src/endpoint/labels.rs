// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ownership labels.
//!
//! The TXT registry attaches these labels to every record it reads so that the planner
//! knows who owns a record and which of its targets each owner contributed. The planner
//! writes them back on the endpoints it emits and the registry turns the difference into
//! TXT record changes.
//!
//! | Label | Value |
//! |---|---|
//! | `owner` | sorted, comma separated owner ids |
//! | `targets/<owner>` | targets contributed by `<owner>`, form-urlencoded |
//! | `orphan` | present on registry TXT records whose owned record is gone |

use super::Endpoint;
use std::collections::BTreeSet;
use url::form_urlencoded;

/// Comma separated list of owners of a record
pub const OWNER_LABEL: &str = "owner";

/// Prefix of the per-owner target list label
pub const OWNED_TARGETS_PREFIX: &str = "targets/";

/// Marks a registry TXT record left behind by its owner
pub const ORPHAN_LABEL: &str = "orphan";

/// Encode a target list as `t=<target>&t=<target>`.
#[must_use]
pub fn encode_targets(targets: &[String]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(targets.iter().map(|t| ("t", t.as_str())))
        .finish()
}

/// Decode a target list produced by [`encode_targets`].
#[must_use]
pub fn decode_targets(encoded: &str) -> Vec<String> {
    form_urlencoded::parse(encoded.as_bytes())
        .filter(|(key, _)| key == "t")
        .map(|(_, value)| value.into_owned())
        .collect()
}

/// Owners recorded on an endpoint, sorted.
#[must_use]
pub fn owners(endpoint: &Endpoint) -> Vec<String> {
    endpoint
        .labels
        .get(OWNER_LABEL)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|owner| !owner.is_empty())
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
        .unwrap_or_default()
}

#[must_use]
pub fn is_owned_by(endpoint: &Endpoint, owner: &str) -> bool {
    owners(endpoint).iter().any(|o| o == owner)
}

/// Targets contributed by `owner`, or `None` if `owner` does not own the endpoint.
#[must_use]
pub fn owned_targets(endpoint: &Endpoint, owner: &str) -> Option<Vec<String>> {
    if !is_owned_by(endpoint, owner) {
        return None;
    }
    Some(
        endpoint
            .labels
            .get(&format!("{OWNED_TARGETS_PREFIX}{owner}"))
            .map(|encoded| decode_targets(encoded))
            .unwrap_or_default(),
    )
}

/// Record `owner` as an owner of `endpoint` contributing `targets`.
pub fn set_owner(endpoint: &mut Endpoint, owner: &str, targets: &[String]) {
    let mut all: BTreeSet<String> = owners(endpoint).into_iter().collect();
    all.insert(owner.to_string());
    endpoint.labels.insert(
        OWNER_LABEL.to_string(),
        all.into_iter().collect::<Vec<_>>().join(","),
    );
    endpoint.labels.insert(
        format!("{OWNED_TARGETS_PREFIX}{owner}"),
        encode_targets(targets),
    );
}

/// Remove `owner` and its target list from `endpoint`.
pub fn remove_owner(endpoint: &mut Endpoint, owner: &str) {
    let remaining: Vec<String> = owners(endpoint)
        .into_iter()
        .filter(|o| o != owner)
        .collect();
    if remaining.is_empty() {
        endpoint.labels.remove(OWNER_LABEL);
    } else {
        endpoint
            .labels
            .insert(OWNER_LABEL.to_string(), remaining.join(","));
    }
    endpoint
        .labels
        .remove(&format!("{OWNED_TARGETS_PREFIX}{owner}"));
}

/// Targets contributed by every owner other than `owner`.
#[must_use]
pub fn targets_of_other_owners(endpoint: &Endpoint, owner: &str) -> BTreeSet<String> {
    owners(endpoint)
        .iter()
        .filter(|o| o.as_str() != owner)
        .filter_map(|o| owned_targets(endpoint, o))
        .flatten()
        .collect()
}

#[must_use]
pub fn is_orphan(endpoint: &Endpoint) -> bool {
    endpoint.labels.contains_key(ORPHAN_LABEL)
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
