// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider-hosted DNS zones and the filters deciding which zones are managed.
//!
//! A zone is eligible when it passes all three filters:
//!
//! 1. [`DomainFilter`] - its domain is one of (or a parent/child of) the configured suffixes
//! 2. [`ZoneIdFilter`] - its id or name is on the allow-list (empty list allows all)
//! 3. visibility - matches the configured [`Visibility`] (unset allows both)

use crate::endpoint::{is_subdomain_of, normalize_dns_name};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a zone answers on the public internet or only inside private networks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    /// Parse a provider visibility string; anything other than `private` is public.
    #[must_use]
    pub fn from_provider(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("private") => Self::Private,
            _ => Self::Public,
        }
    }
}

/// A provider-hosted DNS zone snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Provider identifier
    pub id: String,
    /// Provider-side name used to address the zone in API calls
    pub name: String,
    /// Domain suffix served by the zone, without trailing dot
    pub domain_name: String,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
}

impl Zone {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, domain_name: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            domain_name: normalize_dns_name(domain_name),
            visibility: Visibility::Public,
            name_servers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Domain suffix filter with exclusions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DomainFilter {
    /// Included suffixes; empty includes everything
    #[serde(default)]
    pub filters: Vec<String>,
    /// Excluded suffixes, checked after inclusion
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl DomainFilter {
    #[must_use]
    pub fn new(filters: Vec<String>) -> Self {
        Self {
            filters,
            exclude: Vec::new(),
        }
    }

    fn included(&self) -> impl Iterator<Item = String> + '_ {
        self.filters
            .iter()
            .map(|f| normalize_dns_name(f.trim()))
            .filter(|f| !f.is_empty())
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude
            .iter()
            .map(|f| normalize_dns_name(f.trim()))
            .filter(|f| !f.is_empty())
            .any(|f| is_subdomain_of(name, &f))
    }

    /// Whether a record name falls under the filter.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.is_excluded(name) {
            return false;
        }
        let mut included = self.included().peekable();
        if included.peek().is_none() {
            return true;
        }
        included.any(|f| is_subdomain_of(name, &f))
    }

    /// Whether a zone domain falls under the filter, also accepting zones that are a
    /// parent of a filtered suffix (a filter of `app.example.com` selects zone
    /// `example.com`).
    #[must_use]
    pub fn matches_zone(&self, domain: &str) -> bool {
        if self.matches(domain) {
            return true;
        }
        if self.is_excluded(domain) {
            return false;
        }
        self.included().any(|f| is_subdomain_of(&f, domain))
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.included().next().is_some()
    }
}

/// Allow-list of zone ids or provider-side zone names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ZoneIdFilter(pub Vec<String>);

impl ZoneIdFilter {
    #[must_use]
    pub fn matches(&self, zone: &Zone) -> bool {
        self.0.is_empty() || self.0.iter().any(|id| id == &zone.id || id == &zone.name)
    }
}

/// Combined zone eligibility filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneFilter {
    pub domain_filter: DomainFilter,
    pub zone_id_filter: ZoneIdFilter,
    pub visibility: Option<Visibility>,
}

impl ZoneFilter {
    #[must_use]
    pub fn matches(&self, zone: &Zone) -> bool {
        self.domain_filter.matches_zone(&zone.domain_name)
            && self.zone_id_filter.matches(zone)
            && self.visibility.is_none_or(|v| v == zone.visibility)
    }
}

/// Find the zone owning `name` by longest domain-suffix match.
///
/// Returns the zone id.
#[must_use]
pub fn find_zone<'a>(zones: &'a BTreeMap<String, Zone>, name: &str) -> Option<&'a str> {
    let name = normalize_dns_name(name);
    zones
        .iter()
        .filter(|(_, zone)| !zone.domain_name.is_empty())
        .filter(|(_, zone)| is_subdomain_of(&name, &zone.domain_name))
        .max_by_key(|(_, zone)| zone.domain_name.len())
        .map(|(id, _)| id.as_str())
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
