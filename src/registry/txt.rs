// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TXT ownership registry.
//!
//! Every owner of a record keeps one TXT record next to it. The TXT record is named after
//! the owner and the owned record type, so owners sharing a hostname never write to the
//! same TXT record:
//!
//! ```text
//! lb.example.net.                 A    10.0.0.1 10.0.0.2
//! team-a-a.lb.example.net.        TXT  "heritage=zonemux,zonemux/owner=team-a,zonemux/version=1,zonemux/targets=t=10.0.0.1"
//! team-b-a.lb.example.net.        TXT  "heritage=zonemux,zonemux/owner=team-b,zonemux/version=1,zonemux/targets=t=10.0.0.2"
//! ```
//!
//! A leading `*.` of a wildcard record stays the first label of its TXT name. The TXT
//! record carries the set identifier of the record it describes.

use super::Registry;
use crate::constants::{MAX_OWNER_ID_LEN, REGISTRY_HERITAGE, REGISTRY_VERSION};
use crate::endpoint::labels::{self, decode_targets, encode_targets, ORPHAN_LABEL};
use crate::endpoint::{Endpoint, EndpointKey, RecordType};
use crate::errors::{ConfigError, ProviderError};
use crate::plan::Changes;
use crate::provider::Provider;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const HERITAGE_KEY: &str = "heritage";
const OWNER_KEY: &str = "zonemux/owner";
const VERSION_KEY: &str = "zonemux/version";
const TARGETS_KEY: &str = "zonemux/targets";

/// Ownership entry stored in a registry TXT record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipRecord {
    pub owner: String,
    pub targets: Vec<String>,
}

impl OwnershipRecord {
    /// Render the TXT payload, unquoted.
    #[must_use]
    pub fn to_txt(&self) -> String {
        format!(
            "{HERITAGE_KEY}={REGISTRY_HERITAGE},{OWNER_KEY}={},{VERSION_KEY}={REGISTRY_VERSION},{TARGETS_KEY}={}",
            self.owner,
            encode_targets(&self.targets)
        )
    }

    /// Parse a TXT payload. Returns `None` for TXT records not written by zonemux or
    /// written with an unknown payload version.
    #[must_use]
    pub fn parse(txt: &str) -> Option<Self> {
        let txt = txt.trim().trim_matches('"');
        let fields: BTreeMap<&str, &str> = txt
            .split(',')
            .filter_map(|field| field.split_once('='))
            .collect();

        if fields.get(HERITAGE_KEY) != Some(&REGISTRY_HERITAGE) {
            return None;
        }
        if fields.get(VERSION_KEY) != Some(&REGISTRY_VERSION) {
            debug!(payload = %txt, "Skipping registry record with unknown version");
            return None;
        }
        let owner = fields.get(OWNER_KEY).filter(|o| !o.is_empty())?;
        Some(Self {
            owner: (*owner).to_string(),
            targets: fields
                .get(TARGETS_KEY)
                .map(|encoded| decode_targets(encoded))
                .unwrap_or_default(),
        })
    }
}

/// Check that `owner` can be embedded in a DNS label.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOwnerId`] unless `owner` is 1 to 40 characters of
/// `[a-z0-9-]`.
pub fn validate_owner_id(owner: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidOwnerId {
        owner: owner.to_string(),
        reason,
    };
    if owner.is_empty() {
        return Err(invalid("must not be empty".to_string()));
    }
    if owner.len() > MAX_OWNER_ID_LEN {
        return Err(invalid(format!(
            "must be at most {MAX_OWNER_ID_LEN} characters"
        )));
    }
    if let Some(c) = owner
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(invalid(format!("character '{c}' is not allowed")));
    }
    Ok(())
}

/// Registry persisting ownership in per-owner TXT records.
pub struct TxtRegistry {
    provider: Arc<dyn Provider>,
    owner_id: String,
    prefix: String,
    /// This owner's TXT records as last read, keyed by the record they describe
    own_records: Mutex<BTreeMap<EndpointKey, Endpoint>>,
}

impl TxtRegistry {
    /// Create a registry writing on behalf of `owner_id`.
    ///
    /// `prefix` is prepended to the first label of every TXT name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOwnerId`] when `owner_id` is not label-safe.
    pub fn new(
        provider: Arc<dyn Provider>,
        owner_id: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let owner_id = owner_id.into();
        validate_owner_id(&owner_id)?;
        Ok(Self {
            provider,
            owner_id,
            prefix: prefix.into().to_ascii_lowercase(),
            own_records: Mutex::new(BTreeMap::new()),
        })
    }

    /// TXT record name holding `owner`'s claim on a `record_type` record at `dns_name`.
    #[must_use]
    pub fn txt_name(&self, owner: &str, record_type: RecordType, dns_name: &str) -> String {
        let label = format!(
            "{}{owner}-{}",
            self.prefix,
            record_type.as_str().to_ascii_lowercase()
        );
        match dns_name.strip_prefix("*.") {
            Some(parent) => format!("*.{label}.{parent}"),
            None => format!("{label}.{dns_name}"),
        }
    }

    /// Name and type of the record a TXT record of `owner` describes.
    fn owned_name(&self, owner: &str, txt_name: &str) -> Option<(String, RecordType)> {
        let (wildcard, rest) = match txt_name.strip_prefix("*.") {
            Some(rest) => (true, rest),
            None => (false, txt_name),
        };
        let (label, parent) = rest.split_once('.')?;
        let record_type = label
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix(owner)?
            .strip_prefix('-')?;
        let record_type = RecordType::from_str(record_type).ok()?;
        let dns_name = if wildcard {
            format!("*.{parent}")
        } else {
            parent.to_string()
        };
        Some((dns_name, record_type))
    }

    /// TXT record for this owner's claim on `record` with `targets`.
    fn txt_record(&self, record: &Endpoint, targets: Vec<String>) -> Endpoint {
        let payload = OwnershipRecord {
            owner: self.owner_id.clone(),
            targets,
        };
        let mut txt = Endpoint::new(
            self.txt_name(&self.owner_id, record.record_type, &record.dns_name),
            RecordType::TXT,
            vec![payload.to_txt()],
        )
        .with_set_identifier(record.set_identifier.clone());
        txt.ttl = record.ttl;
        txt
    }
}

#[async_trait]
impl Registry for TxtRegistry {
    fn owner_id(&self) -> Option<&str> {
        Some(&self.owner_id)
    }

    fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, ProviderError> {
        let records = self.provider.records(cancel).await?;

        let mut claims: BTreeMap<EndpointKey, Vec<OwnershipRecord>> = BTreeMap::new();
        let mut own_records = BTreeMap::new();
        let mut plain = Vec::with_capacity(records.len());

        for record in records {
            let claim = match (record.record_type, record.targets.as_slice()) {
                (RecordType::TXT, [payload]) => OwnershipRecord::parse(payload),
                _ => None,
            };
            let Some(claim) = claim else {
                plain.push(record);
                continue;
            };
            let Some((dns_name, record_type)) = self.owned_name(&claim.owner, &record.dns_name)
            else {
                debug!(record = %record.dns_name, owner = %claim.owner, "Registry record name does not match its owner, ignoring");
                plain.push(record);
                continue;
            };
            let key = EndpointKey {
                dns_name,
                record_type,
                set_identifier: record.set_identifier.clone(),
            };
            if claim.owner == self.owner_id {
                own_records.insert(key.clone(), record);
            }
            claims.entry(key).or_default().push(claim);
        }

        let mut claimed = BTreeSet::new();
        for record in &mut plain {
            let key = record.key();
            if let Some(owners) = claims.get(&key) {
                for claim in owners {
                    labels::set_owner(record, &claim.owner, &claim.targets);
                }
                claimed.insert(key);
            }
        }

        for (key, txt) in &own_records {
            if claimed.contains(key) {
                continue;
            }
            debug!(record = %key, txt = %txt.dns_name, "Registry record outlived its record");
            let mut orphan = txt.clone();
            labels::set_owner(&mut orphan, &self.owner_id, &[]);
            orphan.labels.insert(ORPHAN_LABEL.to_string(), "true".to_string());
            plain.push(orphan);
        }

        debug!(
            records = plain.len(),
            claimed = claimed.len(),
            owner = %self.owner_id,
            "Read records through TXT registry"
        );
        *self.own_records.lock().await = own_records;
        Ok(plain)
    }

    async fn apply_changes(
        &self,
        changes: Changes,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let own_records = self.own_records.lock().await.clone();
        let owner = self.owner_id.as_str();
        let orphan_deletions: BTreeSet<EndpointKey> = changes
            .delete
            .iter()
            .filter(|endpoint| labels::is_orphan(endpoint))
            .map(Endpoint::key)
            .collect();
        let previous_txt = |record: &Endpoint, targets: Vec<String>| {
            own_records
                .get(&record.key())
                .cloned()
                .unwrap_or_else(|| self.txt_record(record, targets))
        };

        let mut out = changes.clone();

        for record in &changes.create {
            let Some(targets) = labels::owned_targets(record, owner) else {
                continue;
            };
            let txt = self.txt_record(record, targets);
            match own_records.get(&record.key()) {
                Some(stale) if !orphan_deletions.contains(&stale.key()) => {
                    out.update_old.push(stale.clone());
                    out.update_new.push(txt);
                }
                _ => out.create.push(txt),
            }
        }

        for (old, new) in changes.update_old.iter().zip(&changes.update_new) {
            match (
                labels::owned_targets(old, owner),
                labels::owned_targets(new, owner),
            ) {
                (None, Some(targets)) => out.create.push(self.txt_record(new, targets)),
                (Some(targets), None) => out.delete.push(previous_txt(old, targets)),
                (Some(before), Some(after)) if before != after || old.ttl != new.ttl => {
                    out.update_old.push(previous_txt(old, before));
                    out.update_new.push(self.txt_record(new, after));
                }
                _ => {}
            }
        }

        for record in &changes.delete {
            if labels::is_orphan(record) {
                continue;
            }
            if let Some(targets) = labels::owned_targets(record, owner) {
                out.delete.push(previous_txt(record, targets));
            }
        }

        if !out.is_empty() {
            let registry = out.summary();
            info!(
                owner = %owner,
                created = registry.created - changes.create.len(),
                updated = registry.updated - changes.update_new.len(),
                deleted = registry.deleted - changes.delete.len(),
                "Adding registry records to change set"
            );
        }
        self.provider.apply_changes(out, cancel).await
    }
}

#[cfg(test)]
#[path = "txt_tests.rs"]
mod txt_tests;
