// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider-agnostic DNS endpoint model.
//!
//! An [`Endpoint`] describes one DNS record set: a name, a record type, its targets and
//! optional routing metadata. Endpoints are rebuilt from the desired state on every
//! reconciliation pass and are never shared between passes.
//!
//! Names are kept without a trailing dot internally. Providers that need the fully
//! qualified form add it back at their boundary with [`ensure_trailing_dot`].
//!
//! # Example
//!
//! ```rust
//! use zonemux::endpoint::{Endpoint, RecordType};
//!
//! let endpoint = Endpoint::new("www.example.com.", RecordType::A, vec!["192.0.2.1".into()])
//!     .with_ttl(60);
//!
//! assert_eq!(endpoint.dns_name, "www.example.com");
//! assert_eq!(endpoint.effective_ttl(300), 60);
//! ```

pub mod labels;
pub mod policy;

use crate::constants::MAX_TXT_STRING_LEN;
use crate::errors::EndpointError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// DNS record types known to the endpoint model.
#[allow(clippy::upper_case_acronyms)]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    MX,
    NS,
    PTR,
    SRV,
    TXT,
    CAA,
    SOA,
}

impl RecordType {
    /// Canonical upper-case name of the record type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::CNAME => "CNAME",
            Self::MX => "MX",
            Self::NS => "NS",
            Self::PTR => "PTR",
            Self::SRV => "SRV",
            Self::TXT => "TXT",
            Self::CAA => "CAA",
            Self::SOA => "SOA",
        }
    }

    /// Record types managed by providers when listing records.
    ///
    /// MX is managed in addition to the address, alias, delegation and text types.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::A
                | Self::AAAA
                | Self::CNAME
                | Self::NS
                | Self::PTR
                | Self::SRV
                | Self::TXT
                | Self::MX
        )
    }

    /// Record types whose targets end with a hostname that must be fully qualified
    /// on the wire.
    #[must_use]
    pub fn has_hostname_targets(&self) -> bool {
        matches!(self, Self::CNAME | Self::MX | Self::SRV)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "AAAA" => Ok(Self::AAAA),
            "CNAME" => Ok(Self::CNAME),
            "MX" => Ok(Self::MX),
            "NS" => Ok(Self::NS),
            "PTR" => Ok(Self::PTR),
            "SRV" => Ok(Self::SRV),
            "TXT" => Ok(Self::TXT),
            "CAA" => Ok(Self::CAA),
            "SOA" => Ok(Self::SOA),
            _ => Err(EndpointError::UnknownRecordType(s.to_string())),
        }
    }
}

/// One provider-specific property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderSpecificProperty {
    pub name: String,
    pub value: String,
}

/// Insertion-ordered provider-specific properties.
///
/// The order is preserved because some providers emit property lists in order, but
/// equality ignores it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProviderSpecific(Vec<ProviderSpecificProperty>);

impl ProviderSpecific {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Set `name` to `value`, replacing an existing entry in place or appending.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.0.iter_mut().find(|p| p.name == name) {
            existing.value = value;
        } else {
            self.0.push(ProviderSpecificProperty { name, value });
        }
    }

    /// Remove `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|p| p.name == name)?;
        Some(self.0.remove(index).value)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderSpecificProperty> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_map(&self) -> BTreeMap<&str, &str> {
        self.0
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
            .collect()
    }
}

impl PartialEq for ProviderSpecific {
    fn eq(&self, other: &Self) -> bool {
        self.as_map() == other.as_map()
    }
}

impl Eq for ProviderSpecific {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProviderSpecific {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (name, value) in iter {
            properties.set(name, value);
        }
        properties
    }
}

/// Free-form labels attached to an endpoint.
///
/// Labels carry ownership metadata between the registry and the planner and are never
/// written to a provider.
pub type Labels = BTreeMap<String, String>;

/// Identity of an endpoint for diffing: name, type and set identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub dns_name: String,
    pub record_type: RecordType,
    pub set_identifier: String,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.set_identifier.is_empty() {
            write!(f, "{} {}", self.dns_name, self.record_type)
        } else {
            write!(
                f,
                "{} {} ({})",
                self.dns_name, self.record_type, self.set_identifier
            )
        }
    }
}

/// Canonical DNS record description, independent of any provider wire format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Name this record answers for, without trailing dot
    pub dns_name: String,

    /// Record type
    pub record_type: RecordType,

    /// Record data; meaning depends on the record type
    #[serde(default)]
    pub targets: Vec<String>,

    /// TTL in seconds; unset or zero means provider default
    #[serde(default, rename = "recordTTL", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,

    /// Distinguishes endpoints sharing a name and type under a routing policy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,

    /// Provider-specific routing metadata
    #[serde(default, skip_serializing_if = "ProviderSpecific::is_empty")]
    pub provider_specific: ProviderSpecific,

    /// Ownership metadata, never sent to a provider
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Labels,
}

impl Endpoint {
    /// Create an endpoint. The trailing dot of `dns_name` is removed.
    #[must_use]
    pub fn new(dns_name: impl AsRef<str>, record_type: RecordType, targets: Vec<String>) -> Self {
        Self {
            dns_name: normalize_dns_name(dns_name.as_ref()),
            record_type,
            targets,
            ttl: None,
            set_identifier: String::new(),
            provider_specific: ProviderSpecific::new(),
            labels: Labels::new(),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_set_identifier(mut self, set_identifier: impl Into<String>) -> Self {
        self.set_identifier = set_identifier.into();
        self
    }

    #[must_use]
    pub fn with_provider_specific(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.provider_specific.set(name, value);
        self
    }

    #[must_use]
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            dns_name: self.dns_name.clone(),
            record_type: self.record_type,
            set_identifier: self.set_identifier.clone(),
        }
    }

    /// TTL to send to a provider: `default` when unset or zero.
    #[must_use]
    pub fn effective_ttl(&self, default: u32) -> u32 {
        match self.ttl {
            Some(ttl) if ttl > 0 => ttl,
            _ => default,
        }
    }

    /// Compare targets ignoring order and duplicates.
    #[must_use]
    pub fn same_targets(&self, other: &Endpoint) -> bool {
        let ours: BTreeSet<&str> = self.targets.iter().map(String::as_str).collect();
        let theirs: BTreeSet<&str> = other.targets.iter().map(String::as_str).collect();
        ours == theirs
    }

    /// Whether `self` (current state) already satisfies `desired`.
    ///
    /// Targets and provider-specific properties must match. The TTL is only compared
    /// when the desired endpoint sets one.
    #[must_use]
    pub fn satisfies(&self, desired: &Endpoint) -> bool {
        let ttl_matches = match desired.ttl {
            Some(ttl) if ttl > 0 => self.ttl == Some(ttl),
            _ => true,
        };
        ttl_matches
            && self.same_targets(desired)
            && self.provider_specific == desired.provider_specific
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())?;
        if let Some(ttl) = self.ttl {
            write!(f, " {ttl}")?;
        }
        write!(f, " [{}]", self.targets.join(" "))
    }
}

/// Remove a single trailing dot from a DNS name.
#[must_use]
pub fn normalize_dns_name(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_string()
}

/// Append a trailing dot to a DNS name unless it already has one.
#[must_use]
pub fn ensure_trailing_dot(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{name}.")
    }
}

/// Split a TXT value into character-strings of at most [`MAX_TXT_STRING_LEN`] bytes.
///
/// Chunks end on character boundaries. An empty value yields one empty chunk.
#[must_use]
pub fn split_txt(value: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for c in value.chars() {
        if current.len() + c.len_utf8() > MAX_TXT_STRING_LEN {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    chunks.push(current);
    chunks
}

/// Whether `name` equals `domain` or is a subdomain of it (both without trailing dot).
#[must_use]
pub fn is_subdomain_of(name: &str, domain: &str) -> bool {
    let name = normalize_dns_name(name).to_ascii_lowercase();
    let domain = normalize_dns_name(domain).to_ascii_lowercase();
    if domain.is_empty() {
        return true;
    }
    name == domain || name.ends_with(&format!(".{domain}"))
}
