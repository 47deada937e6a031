// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Google Cloud DNS provider.
//!
//! Talks to the Cloud DNS v1 REST API:
//!
//! - `GET  /projects/{project}/managedZones` - zone discovery
//! - `GET  /projects/{project}/managedZones/{zone}/rrsets` - record listing
//! - `POST /projects/{project}/managedZones/{zone}/changes` - one call per change batch
//!
//! List calls follow `nextPageToken` until exhausted. Zones with a `peeringConfig` belong
//! to another project and are never managed.
//!
//! # Routing policies
//!
//! A record set may carry a `routingPolicy` with either `geo` items (`location` plus
//! `rrdatas`) or `wrr` items (`weight` plus `rrdatas`). Such a record set decodes to one
//! merged endpoint: every target is annotated with its item's location or weight and a
//! single `routingpolicy` marker names the policy. Encoding reverses this, emitting one
//! policy item per distinct location or weight.

use super::{submit_changes, Credentials, Provider, ProviderConfig};
use crate::constants::{
    CREDENTIALS_KEY_GOOGLE, CREDENTIALS_KEY_PROJECT_ID, GOOGLE_DNS_API_BASE_URL,
    GOOGLE_LIST_PAGE_SIZE, PROVIDER_GOOGLE, ROUTING_POLICY_KEY,
};
use crate::endpoint::policy::{
    endpoints_to_provider_format, format_weight, group_targets_by_policy_value, parse_weight,
    routing_policy, RoutingPolicy,
};
use crate::endpoint::{ensure_trailing_dot, normalize_dns_name, split_txt, Endpoint, RecordType};
use crate::errors::{ConfigError, ProviderError};
use crate::metrics;
use crate::plan::batch::{ChangeSink, ZoneChange};
use crate::plan::Changes;
use crate::zone::{Visibility, Zone};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

// ============================================================================
// Wire format
// ============================================================================

/// A Cloud DNS managed zone.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedZone {
    pub name: String,
    pub dns_name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peering_config: Option<serde_json::Value>,
}

/// A Cloud DNS record set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecordSet {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rrdatas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_policy: Option<RrSetRoutingPolicy>,
}

/// Routing policy of a record set; `geo` and `wrr` are mutually exclusive.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RrSetRoutingPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrr: Option<WrrPolicy>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPolicy {
    #[serde(default)]
    pub items: Vec<GeoPolicyItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPolicyItem {
    pub location: String,
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WrrPolicy {
    #[serde(default)]
    pub items: Vec<WrrPolicyItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WrrPolicyItem {
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub rrdatas: Vec<String>,
}

/// Body of a `changes.create` call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additions: Vec<ResourceRecordSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deletions: Vec<ResourceRecordSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZonesPage {
    #[serde(default)]
    managed_zones: Vec<ManagedZone>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RrSetsPage {
    #[serde(default)]
    rrsets: Vec<ResourceRecordSet>,
    next_page_token: Option<String>,
}

/// Fields of the credential blob that may carry a bearer token.
#[derive(Debug, Default, Deserialize)]
struct CredentialBlob {
    access_token: Option<String>,
    token: Option<String>,
}

// ============================================================================
// Translation
// ============================================================================

fn is_quoted(value: &str) -> bool {
    value.len() > 1 && value.starts_with('"') && value.ends_with('"')
}

/// Quoted character-strings of a TXT value, space separated.
fn quote_txt(value: &str) -> String {
    split_txt(value)
        .iter()
        .map(|chunk| format!("\"{}\"", chunk.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Concatenate the quoted character-strings of a TXT rrdata.
///
/// Text outside quotes is dropped; an unterminated string runs to the end.
fn unquote_txt(rrdata: &str) -> String {
    let mut value = String::new();
    let mut quoted = false;
    let mut chars = rrdata.chars();
    while let Some(c) = chars.next() {
        match (quoted, c) {
            (false, '"') => quoted = true,
            (true, '"') => quoted = false,
            (true, '\\') => value.extend(chars.next()),
            (true, c) => value.push(c),
            (false, _) => {}
        }
    }
    value
}

/// Wire form of one target.
fn encode_target(record_type: RecordType, target: &str) -> String {
    match record_type {
        RecordType::TXT if !is_quoted(target) => quote_txt(target),
        t if t.has_hostname_targets() => ensure_trailing_dot(target),
        _ => target.to_string(),
    }
}

/// Canonical form of one wire target.
fn decode_target(record_type: RecordType, rrdata: &str) -> String {
    match record_type {
        RecordType::TXT if rrdata.starts_with('"') => unquote_txt(rrdata),
        t if t.has_hostname_targets() => normalize_dns_name(rrdata),
        _ => rrdata.to_string(),
    }
}

/// Encode an endpoint as a record set.
///
/// Endpoints carrying a routing policy become a `geo` or `wrr` record set with one item per
/// distinct location or weight; malformed weights encode as `0`.
#[must_use]
pub fn endpoint_to_record_set(endpoint: &Endpoint, default_ttl: u32) -> ResourceRecordSet {
    let record_type = endpoint.record_type;
    let encode = |targets: &[String]| -> Vec<String> {
        targets
            .iter()
            .map(|t| encode_target(record_type, t))
            .collect()
    };

    let mut record_set = ResourceRecordSet {
        name: ensure_trailing_dot(&endpoint.dns_name),
        record_type: record_type.to_string(),
        ttl: Some(endpoint.effective_ttl(default_ttl)),
        rrdatas: Vec::new(),
        routing_policy: None,
    };

    match routing_policy(endpoint) {
        Some(policy @ RoutingPolicy::Geo) => {
            let items = group_targets_by_policy_value(endpoint, policy)
                .into_iter()
                .map(|(location, targets)| GeoPolicyItem {
                    location,
                    rrdatas: encode(&targets),
                })
                .collect();
            record_set.routing_policy = Some(RrSetRoutingPolicy {
                geo: Some(GeoPolicy { items }),
                wrr: None,
            });
        }
        Some(policy @ RoutingPolicy::Weighted) => {
            let items = group_targets_by_policy_value(endpoint, policy)
                .into_iter()
                .map(|(weight, targets)| WrrPolicyItem {
                    weight: parse_weight(&weight),
                    rrdatas: encode(&targets),
                })
                .collect();
            record_set.routing_policy = Some(RrSetRoutingPolicy {
                geo: None,
                wrr: Some(WrrPolicy { items }),
            });
        }
        None => record_set.rrdatas = encode(&endpoint.targets),
    }

    record_set
}

/// Decode a record set into an endpoint.
///
/// Returns `None` for unsupported record types, for record sets without data and for
/// routing policies carrying neither `geo` nor `wrr` items.
#[must_use]
pub fn record_set_to_endpoint(record_set: &ResourceRecordSet) -> Option<Endpoint> {
    let record_type = match record_set.record_type.parse::<RecordType>() {
        Ok(t) if t.is_supported() => t,
        _ => {
            debug!(
                record = %record_set.name,
                record_type = %record_set.record_type,
                "Unsupported record type, skipping"
            );
            metrics::record_dropped("unsupported_type");
            return None;
        }
    };

    let mut endpoint = Endpoint::new(&record_set.name, record_type, Vec::new());
    endpoint.ttl = record_set.ttl;

    let Some(policy) = &record_set.routing_policy else {
        if record_set.rrdatas.is_empty() {
            warn!(record = %record_set.name, "Record set without data, skipping");
            metrics::record_dropped("malformed_record");
            return None;
        }
        endpoint.targets = record_set
            .rrdatas
            .iter()
            .map(|r| decode_target(record_type, r))
            .collect();
        return Some(endpoint);
    };

    let members: Vec<(String, &Vec<String>)> = match (&policy.wrr, &policy.geo) {
        (Some(wrr), _) => {
            endpoint
                .provider_specific
                .set(ROUTING_POLICY_KEY, RoutingPolicy::Weighted.as_str());
            wrr.items
                .iter()
                .map(|item| (format_weight(item.weight), &item.rrdatas))
                .collect()
        }
        (None, Some(geo)) => {
            endpoint
                .provider_specific
                .set(ROUTING_POLICY_KEY, RoutingPolicy::Geo.as_str());
            geo.items
                .iter()
                .map(|item| (item.location.clone(), &item.rrdatas))
                .collect()
        }
        (None, None) => Vec::new(),
    };

    for (value, rrdatas) in members {
        for rrdata in rrdatas {
            let target = decode_target(record_type, rrdata);
            if !endpoint.targets.contains(&target) {
                endpoint.targets.push(target.clone());
            }
            endpoint.provider_specific.set(target, value.clone());
        }
    }

    if endpoint.targets.is_empty() {
        warn!(
            record = %record_set.name,
            "Routing policy without geo or weighted items, skipping"
        );
        metrics::record_dropped("malformed_record");
        return None;
    }
    Some(endpoint)
}

/// Translate one batch into a Cloud DNS change body.
#[must_use]
pub fn batch_to_change(batch: &ZoneChange, default_ttl: u32) -> Change {
    Change {
        additions: batch
            .additions
            .iter()
            .map(|e| endpoint_to_record_set(e, default_ttl))
            .collect(),
        deletions: batch
            .deletions
            .iter()
            .map(|e| endpoint_to_record_set(e, default_ttl))
            .collect(),
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Cloud DNS provider bound to one project.
pub struct GoogleProvider {
    client: reqwest::Client,
    base_url: String,
    project: String,
    token: String,
    config: ProviderConfig,
}

impl GoogleProvider {
    /// Build from `GOOGLE` (credential blob) and `PROJECT_ID`.
    ///
    /// The blob is JSON; its `access_token` (or `token`) field is sent as bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a key is missing or the blob carries no token.
    pub fn from_credentials(
        credentials: &Credentials,
        config: ProviderConfig,
    ) -> Result<Self, ConfigError> {
        let blob = credentials.require_str(PROVIDER_GOOGLE, CREDENTIALS_KEY_GOOGLE)?;
        let project = credentials.require_str(PROVIDER_GOOGLE, CREDENTIALS_KEY_PROJECT_ID)?;

        let parsed: CredentialBlob =
            serde_json::from_str(&blob).map_err(|e| ConfigError::InvalidCredential {
                key: CREDENTIALS_KEY_GOOGLE.to_string(),
                reason: format!("not valid JSON: {e}"),
            })?;
        let token = parsed
            .access_token
            .or(parsed.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::InvalidCredential {
                key: CREDENTIALS_KEY_GOOGLE.to_string(),
                reason: "no access_token or token field".to_string(),
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: GOOGLE_DNS_API_BASE_URL.to_string(),
            project,
            token,
            config,
        })
    }

    /// Point the provider at another API endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        let raw = format!("{}/projects/{}/{path}", self.base_url, self.project);
        Url::parse(&raw).map_err(|e| ProviderError::Decode {
            context: raw.clone(),
            reason: format!("invalid URL: {e}"),
        })
    }

    fn list_url(&self, path: &str, page_token: Option<&str>) -> Result<Url, ProviderError> {
        let mut url = self.url(path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("maxResults", &GOOGLE_LIST_PAGE_SIZE.to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }

    /// Send `request` and decode a JSON body, racing against `cancel`.
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<T, ProviderError> {
        let transport = |source: reqwest::Error| ProviderError::Transport {
            url: url.to_string(),
            source,
        };

        let exchange = async {
            let response = request.bearer_auth(&self.token).send().await?;
            let status = response.status();
            Ok::<_, reqwest::Error>((status, response.text().await?))
        };
        let (status, body) = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(ProviderError::cancelled(format!("calling {url}")));
            }
            exchange = exchange => exchange.map_err(transport)?,
        };

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode {
            context: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn list_managed_zones(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ManagedZone>, ProviderError> {
        let mut zones = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.list_url("managedZones", page_token.as_deref())?;
            let page: ManagedZonesPage = self
                .send(self.client.get(url.clone()), &url, cancel)
                .await?;
            zones.extend(page.managed_zones);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(zones),
            }
        }
    }

    async fn list_record_sets(
        &self,
        zone: &Zone,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResourceRecordSet>, ProviderError> {
        let path = format!("managedZones/{}/rrsets", zone.name);
        let mut record_sets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = self.list_url(&path, page_token.as_deref())?;
            let page: RrSetsPage = self
                .send(self.client.get(url.clone()), &url, cancel)
                .await?;
            debug!(
                zone = %zone.name,
                records = page.rrsets.len(),
                "Fetched record set page"
            );
            record_sets.extend(page.rrsets);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(record_sets),
            }
        }
    }
}

#[async_trait]
impl ChangeSink for GoogleProvider {
    async fn submit(&self, zone: &Zone, batch: &ZoneChange) -> Result<(), ProviderError> {
        let change = batch_to_change(batch, self.config.default_ttl);
        // A started submission runs to completion; cancellation is checked between batches.
        let url = self.url(&format!("managedZones/{}/changes", zone.name))?;
        let _: Change = self
            .send(
                self.client.post(url.clone()).json(&change),
                &url,
                &CancellationToken::new(),
            )
            .await?;
        info!(
            zone = %zone.name,
            additions = change.additions.len(),
            deletions = change.deletions.len(),
            "Cloud DNS change accepted"
        );
        Ok(())
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &'static str {
        PROVIDER_GOOGLE
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn zones(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, Zone>, ProviderError> {
        let filter = self.config.zone_filter();
        let mut zones = BTreeMap::new();

        for managed in self.list_managed_zones(cancel).await? {
            if managed.peering_config.is_some() {
                debug!(zone = %managed.name, "Skipping peering zone");
                continue;
            }
            let id = if managed.id.is_empty() {
                managed.name.clone()
            } else {
                managed.id.clone()
            };
            let mut zone = Zone::new(id, managed.name, &managed.dns_name)
                .with_visibility(Visibility::from_provider(managed.visibility.as_deref()));
            zone.name_servers = managed.name_servers;

            if !filter.matches(&zone) {
                debug!(zone = %zone.name, domain = %zone.domain_name, "Zone filtered out");
                continue;
            }
            zones.insert(zone.id.clone(), zone);
        }

        if zones.is_empty() {
            info!(project = %self.project, "No zones match the configured filters");
        }
        Ok(zones)
    }

    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, ProviderError> {
        let mut endpoints = Vec::new();
        for zone in self.zones(cancel).await?.values() {
            for record_set in self.list_record_sets(zone, cancel).await? {
                if let Some(endpoint) = record_set_to_endpoint(&record_set) {
                    endpoints.push(endpoint);
                }
            }
        }
        Ok(endpoints)
    }

    async fn apply_changes(
        &self,
        changes: Changes,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        submit_changes(self, self, changes, cancel).await
    }

    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        endpoints_to_provider_format(endpoints)
    }
}

/// Constructor registered in the provider factory.
///
/// # Errors
///
/// See [`GoogleProvider::from_credentials`].
pub fn build(
    credentials: &Credentials,
    config: ProviderConfig,
) -> Result<Arc<dyn Provider>, ConfigError> {
    Ok(Arc::new(GoogleProvider::from_credentials(
        credentials,
        config,
    )?))
}

#[cfg(test)]
#[path = "google_tests.rs"]
mod google_tests;
