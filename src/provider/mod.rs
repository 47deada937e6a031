// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS provider adapters.
//!
//! Every backend implements [`Provider`]: zone discovery, record listing, change
//! application and a pre-apply normalization of the desired endpoints. Backends are
//! constructed by name through a [`factory::ProviderFactory`].
//!
//! # Available Providers
//!
//! - [`google`] - Cloud DNS REST API with geo and weighted routing policies
//! - [`rfc2136`] - authoritative servers through dynamic update and zone transfer
//! - [`inmemory`] - in-process zones for tests and dry runs
//!
//! Providers never retry. Transport and API errors are returned unchanged and the whole
//! pass is retried by the caller.

pub mod factory;
pub mod google;
pub mod inmemory;
pub mod rfc2136;

use crate::constants::{
    DEFAULT_BATCH_CHANGE_INTERVAL_MILLIS, DEFAULT_BATCH_CHANGE_SIZE, DEFAULT_RECORD_TTL_SECS,
};
use crate::endpoint::Endpoint;
use crate::errors::{ConfigError, ProviderError};
use crate::plan::batch::{ChangeSink, ChangeSubmitter, ZoneChange};
use crate::plan::Changes;
use crate::zone::{DomainFilter, Visibility, Zone, ZoneFilter, ZoneIdFilter};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Capability interface of one DNS backend.
///
/// All operations honour `cancel`: pagination loops and pacing sleeps abort with
/// [`ProviderError::Cancelled`] as soon as it fires.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name, as registered in the factory
    fn name(&self) -> &'static str;

    /// Configuration the provider was built with
    fn config(&self) -> &ProviderConfig;

    /// Eligible zones keyed by zone id. Returns an empty map when nothing matches.
    async fn zones(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, Zone>, ProviderError>;

    /// All records of the eligible zones, decoded into endpoints.
    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, ProviderError>;

    /// Apply `changes`, partitioned by zone and batched.
    async fn apply_changes(
        &self,
        changes: Changes,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;

    /// Normalize desired endpoints into the shape [`Provider::records`] reads back.
    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        endpoints
    }
}

/// Settings shared by every provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// Domain suffixes to manage, with exclusions
    pub domain_filter: DomainFilter,

    /// Zone ids or provider-side zone names to manage; empty manages all
    pub zone_id_filter: ZoneIdFilter,

    /// Restrict to public or private zones; unset manages both
    pub zone_type_filter: Option<Visibility>,

    /// Maximum record changes per submission; `0` submits each zone's change whole
    pub batch_change_size: usize,

    /// Pause between submissions, in milliseconds
    pub batch_change_interval: u64,

    /// Log changes without submitting them
    pub dry_run: bool,

    /// TTL sent for endpoints without one
    pub default_ttl: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            domain_filter: DomainFilter::default(),
            zone_id_filter: ZoneIdFilter::default(),
            zone_type_filter: None,
            batch_change_size: DEFAULT_BATCH_CHANGE_SIZE,
            batch_change_interval: DEFAULT_BATCH_CHANGE_INTERVAL_MILLIS,
            dry_run: false,
            default_ttl: DEFAULT_RECORD_TTL_SECS,
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn zone_filter(&self) -> ZoneFilter {
        ZoneFilter {
            domain_filter: self.domain_filter.clone(),
            zone_id_filter: self.zone_id_filter.clone(),
            visibility: self.zone_type_filter,
        }
    }

    #[must_use]
    pub fn submitter(&self, provider: &'static str) -> ChangeSubmitter {
        ChangeSubmitter {
            provider,
            batch_size: self.batch_change_size,
            interval: Duration::from_millis(self.batch_change_interval),
            dry_run: self.dry_run,
        }
    }
}

/// Opaque credential bundle, shaped like the data map of a Kubernetes `Secret`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials(BTreeMap<String, Vec<u8>>);

impl Credentials {
    /// Merge `data` and `stringData` of a `Secret`; `stringData` wins on conflicts.
    #[must_use]
    pub fn from_secret(secret: &Secret) -> Self {
        let mut values: BTreeMap<String, Vec<u8>> = secret
            .data
            .as_ref()
            .map(|data| {
                data.iter()
                    .map(|(key, value)| (key.clone(), value.0.clone()))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(string_data) = &secret.string_data {
            for (key, value) in string_data {
                values.insert(key.clone(), value.as_bytes().to_vec());
            }
        }
        Self(values)
    }

    #[must_use]
    pub fn from_string_map(values: BTreeMap<String, String>) -> Self {
        Self(
            values
                .into_iter()
                .map(|(key, value)| (key, value.into_bytes()))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Value of `key` as UTF-8 with surrounding whitespace removed.
    ///
    /// Empty values count as absent.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Value of `key`, required by `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingCredential`] when the key is absent or empty.
    pub fn require_str(&self, provider: &str, key: &str) -> Result<String, ConfigError> {
        self.get_str(key).ok_or_else(|| ConfigError::MissingCredential {
            provider: provider.to_string(),
            key: key.to_string(),
        })
    }
}

/// Collapse provider-level changes into one [`ZoneChange`].
///
/// Old values of updates and deletions become deletions; new values of updates and
/// creations become additions. Records outside the domain filter are dropped.
#[must_use]
pub fn collect_change(changes: Changes, domain_filter: &DomainFilter) -> ZoneChange {
    let keep = |endpoint: &Endpoint| {
        let matches = domain_filter.matches(&endpoint.dns_name);
        if !matches {
            debug!(record = %endpoint.dns_name, "Record outside the domain filter, skipping");
        }
        matches
    };

    ZoneChange {
        additions: changes
            .update_new
            .into_iter()
            .chain(changes.create)
            .filter(|e| keep(e))
            .collect(),
        deletions: changes
            .update_old
            .into_iter()
            .chain(changes.delete)
            .filter(|e| keep(e))
            .collect(),
    }
}

/// Shared tail of [`Provider::apply_changes`]: collect, partition, batch and submit.
///
/// An empty change is logged and succeeds without listing zones.
///
/// # Errors
///
/// Returns zone listing errors and the first submission error.
pub async fn submit_changes<P>(
    provider: &P,
    sink: &dyn ChangeSink,
    changes: Changes,
    cancel: &CancellationToken,
) -> Result<(), ProviderError>
where
    P: Provider + ?Sized,
{
    let config = provider.config();
    let change = collect_change(changes, &config.domain_filter);
    if change.is_empty() {
        info!(provider = provider.name(), "All records are already up to date");
        return Ok(());
    }

    let zones = provider.zones(cancel).await?;
    config
        .submitter(provider.name())
        .submit(sink, &zones, change, cancel)
        .await
}
