// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RFC 2136 provider for authoritative nameservers.
//!
//! Records are read with a zone transfer (AXFR over TCP) and written with dynamic
//! updates: every deleted endpoint becomes a delete-by-rdata of its record set and every
//! added endpoint an append. Requests are TSIG-signed when a key is configured.
//!
//! The nameserver has no notion of routing policy: endpoints carrying one are written
//! as plain record sets of all their targets.
//!
//! `hickory-client` is synchronous, so every exchange runs on the blocking pool.

use super::{submit_changes, Credentials, Provider, ProviderConfig};
use crate::constants::{
    CREDENTIALS_KEY_RFC2136_HOST, CREDENTIALS_KEY_RFC2136_PORT, CREDENTIALS_KEY_RFC2136_TSIG_KEYNAME,
    CREDENTIALS_KEY_RFC2136_TSIG_SECRET, CREDENTIALS_KEY_RFC2136_TSIG_SECRET_ALG,
    CREDENTIALS_KEY_RFC2136_ZONES, DNS_PORT, PROVIDER_RFC2136, TSIG_FUDGE_TIME_SECS,
};
use crate::endpoint::{
    ensure_trailing_dot, normalize_dns_name, split_txt, Endpoint, ProviderSpecific, RecordType,
};
use crate::errors::{ConfigError, ProviderError};
use crate::metrics;
use crate::plan::batch::{ChangeSink, ZoneChange};
use crate::plan::Changes;
use crate::zone::Zone;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::client::{Client, SyncClient};
use hickory_client::op::ResponseCode;
use hickory_client::rr::rdata::tsig::TsigAlgorithm;
use hickory_client::rr::{rdata, DNSClass, Name, RData, Record, RecordSet};
use hickory_client::tcp::TcpClientConnection;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// TSIG key used to sign transfers and updates.
#[derive(Clone, Debug)]
pub struct TsigKey {
    pub name: String,
    pub algorithm: TsigAlgorithm,
    pub secret: Vec<u8>,
}

/// Parse a TSIG algorithm name such as `hmac-sha256`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidCredential`] for unknown algorithms.
pub fn parse_tsig_algorithm(value: &str) -> Result<TsigAlgorithm, ConfigError> {
    match normalize_dns_name(value.trim()).to_ascii_lowercase().as_str() {
        "hmac-md5" | "hmac-md5.sig-alg.reg.int" => Ok(TsigAlgorithm::HmacMd5),
        "hmac-sha1" => Ok(TsigAlgorithm::HmacSha1),
        "hmac-sha224" => Ok(TsigAlgorithm::HmacSha224),
        "hmac-sha256" => Ok(TsigAlgorithm::HmacSha256),
        "hmac-sha384" => Ok(TsigAlgorithm::HmacSha384),
        "hmac-sha512" => Ok(TsigAlgorithm::HmacSha512),
        other => Err(ConfigError::InvalidCredential {
            key: CREDENTIALS_KEY_RFC2136_TSIG_SECRET_ALG.to_string(),
            reason: format!("unsupported TSIG algorithm '{other}'"),
        }),
    }
}

/// Server address plus optional TSIG key; everything a blocking exchange needs.
#[derive(Clone, Debug)]
struct Connector {
    server: SocketAddr,
    tsig: Option<TsigKey>,
}

impl Connector {
    fn error(&self, zone: &str, operation: &str, reason: impl Into<String>) -> ProviderError {
        ProviderError::Dns {
            server: self.server.to_string(),
            zone: zone.to_string(),
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    fn client(
        &self,
        zone: &str,
        operation: &str,
    ) -> Result<SyncClient<TcpClientConnection>, ProviderError> {
        let conn = TcpClientConnection::new(self.server)
            .map_err(|e| self.error(zone, operation, format!("connection failed: {e}")))?;

        let Some(key) = &self.tsig else {
            return Ok(SyncClient::new(conn));
        };
        let key_name = Name::from_str(&ensure_trailing_dot(&key.name))
            .map_err(|e| self.error(zone, operation, format!("invalid TSIG key name: {e}")))?;
        let signer = TSigner::new(
            key.secret.clone(),
            key.algorithm.clone(),
            key_name,
            u16::try_from(TSIG_FUDGE_TIME_SECS).unwrap_or(300),
        )
        .map_err(|e| self.error(zone, operation, format!("invalid TSIG key: {e}")))?;
        Ok(SyncClient::with_tsigner(conn, signer))
    }

    /// Transfer `zone` and return its records.
    fn transfer(&self, zone: &str) -> Result<Vec<Record>, ProviderError> {
        let client = self.client(zone, "AXFR")?;
        let origin = zone_name(zone).map_err(|reason| self.error(zone, "AXFR", reason))?;

        let response = client
            .query(&origin, DNSClass::IN, hickory_client::rr::RecordType::AXFR)
            .map_err(|e| self.error(zone, "AXFR", e.to_string()))?;
        match response.response_code() {
            ResponseCode::NoError => Ok(response.answers().to_vec()),
            code => Err(self.error(zone, "AXFR", format!("{code:?}"))),
        }
    }

    /// Send one update per record set: deletions first, then additions.
    fn update(
        &self,
        zone: &str,
        deletions: Vec<RecordSet>,
        additions: Vec<RecordSet>,
    ) -> Result<(), ProviderError> {
        let client = self.client(zone, "UPDATE")?;
        let origin = zone_name(zone).map_err(|reason| self.error(zone, "UPDATE", reason))?;

        for record_set in deletions {
            let name = record_set.name().clone();
            let response = client
                .delete_by_rdata(record_set, origin.clone())
                .map_err(|e| self.error(zone, "UPDATE", e.to_string()))?;
            self.check(zone, &name, response.response_code())?;
        }
        for record_set in additions {
            let name = record_set.name().clone();
            let response = client
                .append(record_set, origin.clone(), false)
                .map_err(|e| self.error(zone, "UPDATE", e.to_string()))?;
            self.check(zone, &name, response.response_code())?;
        }
        Ok(())
    }

    fn check(&self, zone: &str, name: &Name, code: ResponseCode) -> Result<(), ProviderError> {
        if code == ResponseCode::NoError {
            return Ok(());
        }
        error!(
            server = %self.server,
            zone = %zone,
            record = %name,
            code = ?code,
            "DNS UPDATE rejected by server"
        );
        Err(self.error(zone, "UPDATE", format!("{code:?} for {name}")))
    }
}

fn zone_name(zone: &str) -> Result<Name, String> {
    Name::from_str(&ensure_trailing_dot(zone)).map_err(|e| format!("invalid zone name: {e}"))
}

fn host_name(value: &str) -> Result<Name, String> {
    Name::from_str(&ensure_trailing_dot(value)).map_err(|e| format!("invalid host name '{value}': {e}"))
}

// ============================================================================
// Translation
// ============================================================================

/// Canonical target of one record's data, or `None` for unmanaged data.
fn rdata_to_target(data: &RData) -> Option<String> {
    let target = match data {
        RData::A(address) => address.to_string(),
        RData::AAAA(address) => address.to_string(),
        RData::CNAME(name) => normalize_dns_name(&name.0.to_string()),
        RData::NS(name) => normalize_dns_name(&name.0.to_string()),
        RData::PTR(name) => normalize_dns_name(&name.0.to_string()),
        RData::MX(mx) => format!(
            "{} {}",
            mx.preference(),
            normalize_dns_name(&mx.exchange().to_string())
        ),
        RData::SRV(srv) => format!(
            "{} {} {} {}",
            srv.priority(),
            srv.weight(),
            srv.port(),
            normalize_dns_name(&srv.target().to_string())
        ),
        RData::TXT(txt) => txt
            .txt_data()
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect(),
        _ => return None,
    };
    Some(target)
}

/// Group transferred records into endpoints, one per name and type.
///
/// Records of unsupported types (SOA, DNSSEC material, ...) are skipped.
#[must_use]
pub fn records_to_endpoints(records: &[Record]) -> Vec<Endpoint> {
    let mut order: Vec<(String, RecordType)> = Vec::new();
    let mut grouped: BTreeMap<(String, RecordType), Endpoint> = BTreeMap::new();

    for record in records {
        let Ok(record_type) = record.record_type().to_string().parse::<RecordType>() else {
            continue;
        };
        if !record_type.is_supported() {
            continue;
        }
        let Some(target) = record.data().and_then(rdata_to_target) else {
            debug!(record = %record.name(), "Record without usable data, skipping");
            metrics::record_dropped("malformed_record");
            continue;
        };

        let dns_name = normalize_dns_name(&record.name().to_string());
        let key = (dns_name.to_ascii_lowercase(), record_type);
        let endpoint = grouped.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Endpoint::new(&dns_name, record_type, Vec::new()).with_ttl(record.ttl())
        });
        if !endpoint.targets.contains(&target) {
            endpoint.targets.push(target);
        }
    }

    order
        .into_iter()
        .filter_map(|key| grouped.remove(&key))
        .collect()
}

/// Merge desired endpoints into one per name and type, the shape a zone transfer reads back.
///
/// Targets are unioned in order. Set identifiers and provider-specific properties are
/// dropped since a plain record set cannot carry them; the first TTL set wins.
#[must_use]
pub fn merge_record_sets(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut order: Vec<(String, RecordType)> = Vec::new();
    let mut grouped: BTreeMap<(String, RecordType), Endpoint> = BTreeMap::new();

    for endpoint in endpoints {
        let key = (endpoint.dns_name.to_ascii_lowercase(), endpoint.record_type);
        match grouped.get_mut(&key) {
            Some(merged) => {
                for target in endpoint.targets {
                    if !merged.targets.contains(&target) {
                        merged.targets.push(target);
                    }
                }
                if merged.ttl.is_none() {
                    merged.ttl = endpoint.ttl;
                }
            }
            None => {
                if !endpoint.set_identifier.is_empty() || !endpoint.provider_specific.is_empty() {
                    debug!(record = %endpoint.key(), "Dropping routing metadata for plain record set");
                }
                let mut merged = endpoint;
                merged.set_identifier = String::new();
                merged.provider_specific = ProviderSpecific::new();
                order.push(key.clone());
                grouped.insert(key, merged);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| grouped.remove(&key))
        .collect()
}

/// Record data for one endpoint target.
fn target_to_rdata(record_type: RecordType, target: &str) -> Result<RData, String> {
    let rdata = match record_type {
        RecordType::A => {
            let address = Ipv4Addr::from_str(target)
                .map_err(|e| format!("invalid IPv4 address '{target}': {e}"))?;
            RData::A(address.into())
        }
        RecordType::AAAA => {
            let address = Ipv6Addr::from_str(target)
                .map_err(|e| format!("invalid IPv6 address '{target}': {e}"))?;
            RData::AAAA(address.into())
        }
        RecordType::CNAME => RData::CNAME(rdata::CNAME(host_name(target)?)),
        RecordType::NS => RData::NS(rdata::NS(host_name(target)?)),
        RecordType::PTR => RData::PTR(rdata::PTR(host_name(target)?)),
        RecordType::MX => {
            let (preference, exchange) = target
                .split_once(char::is_whitespace)
                .ok_or_else(|| format!("MX target '{target}' is not '<preference> <host>'"))?;
            let preference = preference
                .parse::<u16>()
                .map_err(|e| format!("invalid MX preference '{preference}': {e}"))?;
            RData::MX(rdata::MX::new(preference, host_name(exchange.trim())?))
        }
        RecordType::SRV => {
            let parts: Vec<&str> = target.split_whitespace().collect();
            let [priority, weight, port, host] = parts.as_slice() else {
                return Err(format!(
                    "SRV target '{target}' is not '<priority> <weight> <port> <host>'"
                ));
            };
            let number = |field: &str| {
                field
                    .parse::<u16>()
                    .map_err(|e| format!("invalid SRV field '{field}': {e}"))
            };
            RData::SRV(rdata::SRV::new(
                number(priority)?,
                number(weight)?,
                number(port)?,
                host_name(host)?,
            ))
        }
        RecordType::TXT => RData::TXT(rdata::TXT::new(split_txt(target))),
        other => return Err(format!("record type {other} is not managed")),
    };
    Ok(rdata)
}

/// Build the record set written for `endpoint`.
///
/// # Errors
///
/// Returns a description of the first target that cannot be encoded.
pub fn endpoint_to_record_set(endpoint: &Endpoint, default_ttl: u32) -> Result<RecordSet, String> {
    let name = host_name(&endpoint.dns_name)?;
    let record_type = hickory_client::rr::RecordType::from_str(endpoint.record_type.as_str())
        .map_err(|e| format!("unknown record type {}: {e}", endpoint.record_type))?;

    let mut record_set = RecordSet::with_ttl(name, record_type, endpoint.effective_ttl(default_ttl));
    for target in &endpoint.targets {
        record_set.add_rdata(target_to_rdata(endpoint.record_type, target)?);
    }
    Ok(record_set)
}

fn encode_all(endpoints: &[Endpoint], default_ttl: u32) -> Vec<RecordSet> {
    endpoints
        .iter()
        .filter_map(|endpoint| match endpoint_to_record_set(endpoint, default_ttl) {
            Ok(record_set) => Some(record_set),
            Err(reason) => {
                warn!(record = %endpoint.key(), reason = %reason, "Cannot encode record, skipping");
                metrics::record_dropped("malformed_record");
                None
            }
        })
        .collect()
}

// ============================================================================
// Provider
// ============================================================================

/// Provider writing to one authoritative nameserver.
pub struct Rfc2136Provider {
    connector: Connector,
    zones: Vec<String>,
    config: ProviderConfig,
}

impl Rfc2136Provider {
    /// Build from `RFC2136_*` credential keys.
    ///
    /// `RFC2136_HOST` and `RFC2136_ZONES` are required. A TSIG key is used when
    /// `RFC2136_TSIG_KEYNAME` and `RFC2136_TSIG_SECRET` are both present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for missing or malformed keys.
    pub fn from_credentials(
        credentials: &Credentials,
        config: ProviderConfig,
    ) -> Result<Self, ConfigError> {
        let invalid = |key: &str, reason: String| ConfigError::InvalidCredential {
            key: key.to_string(),
            reason,
        };

        let host = credentials.require_str(PROVIDER_RFC2136, CREDENTIALS_KEY_RFC2136_HOST)?;
        let address = IpAddr::from_str(&host)
            .map_err(|e| invalid(CREDENTIALS_KEY_RFC2136_HOST, format!("'{host}': {e}")))?;
        let port = match credentials.get_str(CREDENTIALS_KEY_RFC2136_PORT) {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| invalid(CREDENTIALS_KEY_RFC2136_PORT, format!("'{port}': {e}")))?,
            None => DNS_PORT,
        };

        let zones: Vec<String> = credentials
            .require_str(PROVIDER_RFC2136, CREDENTIALS_KEY_RFC2136_ZONES)?
            .split(',')
            .map(|zone| normalize_dns_name(zone.trim()))
            .filter(|zone| !zone.is_empty())
            .collect();

        let tsig = match (
            credentials.get_str(CREDENTIALS_KEY_RFC2136_TSIG_KEYNAME),
            credentials.get_str(CREDENTIALS_KEY_RFC2136_TSIG_SECRET),
        ) {
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingCredential {
                    provider: PROVIDER_RFC2136.to_string(),
                    key: CREDENTIALS_KEY_RFC2136_TSIG_SECRET.to_string(),
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingCredential {
                    provider: PROVIDER_RFC2136.to_string(),
                    key: CREDENTIALS_KEY_RFC2136_TSIG_KEYNAME.to_string(),
                })
            }
            (Some(name), Some(secret)) => {
                let secret = BASE64.decode(secret.as_bytes()).map_err(|e| {
                    invalid(CREDENTIALS_KEY_RFC2136_TSIG_SECRET, format!("not base64: {e}"))
                })?;
                let algorithm = credentials
                    .get_str(CREDENTIALS_KEY_RFC2136_TSIG_SECRET_ALG)
                    .map_or(Ok(TsigAlgorithm::HmacSha256), |alg| parse_tsig_algorithm(&alg))?;
                Some(TsigKey {
                    name,
                    algorithm,
                    secret,
                })
            }
        };

        Ok(Self {
            connector: Connector {
                server: SocketAddr::new(address, port),
                tsig,
            },
            zones,
            config,
        })
    }

    #[must_use]
    pub fn server(&self) -> SocketAddr {
        self.connector.server
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.connector.tsig.is_some()
    }
}

#[async_trait]
impl ChangeSink for Rfc2136Provider {
    async fn submit(&self, zone: &Zone, batch: &ZoneChange) -> Result<(), ProviderError> {
        let deletions = encode_all(&batch.deletions, self.config.default_ttl);
        let additions = encode_all(&batch.additions, self.config.default_ttl);
        let connector = self.connector.clone();
        let zone_name = zone.domain_name.clone();

        tokio::task::spawn_blocking(move || connector.update(&zone_name, deletions, additions))
            .await
            .map_err(|e| self.connector.error(&zone.domain_name, "UPDATE", format!("task failed: {e}")))??;

        info!(
            server = %self.connector.server,
            zone = %zone.domain_name,
            additions = batch.additions.len(),
            deletions = batch.deletions.len(),
            "DNS UPDATE accepted"
        );
        Ok(())
    }
}

#[async_trait]
impl Provider for Rfc2136Provider {
    fn name(&self) -> &'static str {
        PROVIDER_RFC2136
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn zones(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, Zone>, ProviderError> {
        if cancel.is_cancelled() {
            return Err(ProviderError::cancelled("listing zones"));
        }
        let filter = self.config.zone_filter();
        Ok(self
            .zones
            .iter()
            .map(|name| Zone::new(name.clone(), name.clone(), name))
            .filter(|zone| filter.matches(zone))
            .map(|zone| (zone.id.clone(), zone))
            .collect())
    }

    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, ProviderError> {
        let mut endpoints = Vec::new();
        for zone in self.zones(cancel).await?.into_values() {
            let connector = self.connector.clone();
            let zone_name = zone.domain_name.clone();
            let task = tokio::task::spawn_blocking(move || connector.transfer(&zone_name));

            let records = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(ProviderError::cancelled(format!("transferring zone {}", zone.domain_name)));
                }
                joined = task => joined.map_err(|e| {
                    self.connector.error(&zone.domain_name, "AXFR", format!("task failed: {e}"))
                })??,
            };

            debug!(zone = %zone.domain_name, records = records.len(), "Zone transfer complete");
            endpoints.extend(records_to_endpoints(&records));
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
        merge_record_sets(endpoints)
    }
}

/// Constructor registered in the provider factory.
///
/// # Errors
///
/// See [`Rfc2136Provider::from_credentials`].
pub fn build(
    credentials: &Credentials,
    config: ProviderConfig,
) -> Result<Arc<dyn Provider>, ConfigError> {
    Ok(Arc::new(Rfc2136Provider::from_credentials(
        credentials,
        config,
    )?))
}

#[cfg(test)]
#[path = "rfc2136_tests.rs"]
mod rfc2136_tests;
