// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the RFC 2136 provider.

#[cfg(test)]
mod tests {
    use crate::endpoint::{Endpoint, RecordType};
    use crate::errors::ConfigError;
    use crate::provider::rfc2136::*;
    use crate::provider::{Credentials, Provider, ProviderConfig};
    use crate::registry::txt::OwnershipRecord;
    use crate::zone::DomainFilter;
    use hickory_client::rr::rdata::tsig::TsigAlgorithm;
    use hickory_client::rr::{rdata, Name, RData, Record};
    use std::collections::BTreeMap;
    use std::net::Ipv4Addr;
    use std::str::FromStr;
    use tokio_util::sync::CancellationToken;

    fn credentials(pairs: &[(&str, &str)]) -> Credentials {
        Credentials::from_string_map(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    fn record(name: &str, ttl: u32, data: RData) -> Record {
        Record::from_rdata(Name::from_str(name).unwrap(), ttl, data)
    }

    fn provider() -> Rfc2136Provider {
        Rfc2136Provider::from_credentials(
            &credentials(&[("RFC2136_HOST", "10.0.0.53"), ("RFC2136_ZONES", "example.net")]),
            ProviderConfig::default(),
        )
        .unwrap()
    }

    /// What a zone transfer would return after writing `endpoints`.
    fn written(endpoints: &[Endpoint]) -> Vec<Endpoint> {
        let records: Vec<Record> = endpoints
            .iter()
            .flat_map(|endpoint| {
                endpoint_to_record_set(endpoint, 300)
                    .unwrap()
                    .records_without_rrsigs()
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        records_to_endpoints(&records)
    }

    #[test]
    fn test_from_credentials_defaults() {
        let provider = Rfc2136Provider::from_credentials(
            &credentials(&[
                ("RFC2136_HOST", "10.0.0.53"),
                ("RFC2136_ZONES", "example.net, example.org."),
            ]),
            ProviderConfig::default(),
        )
        .unwrap();

        assert_eq!(provider.server().to_string(), "10.0.0.53:53");
        assert!(!provider.is_signed());
    }

    #[test]
    fn test_from_credentials_with_tsig() {
        let provider = Rfc2136Provider::from_credentials(
            &credentials(&[
                ("RFC2136_HOST", "10.0.0.53"),
                ("RFC2136_PORT", "5353"),
                ("RFC2136_ZONES", "example.net"),
                ("RFC2136_TSIG_KEYNAME", "zonemux-key"),
                ("RFC2136_TSIG_SECRET", "c2VjcmV0LXNlY3JldC1zZWNyZXQ="),
                ("RFC2136_TSIG_SECRET_ALG", "hmac-sha512"),
            ]),
            ProviderConfig::default(),
        )
        .unwrap();

        assert_eq!(provider.server().port(), 5353);
        assert!(provider.is_signed());
    }

    #[test]
    fn test_from_credentials_errors() {
        let missing_host =
            Rfc2136Provider::from_credentials(&credentials(&[]), ProviderConfig::default());
        assert!(matches!(
            missing_host,
            Err(ConfigError::MissingCredential { key, .. }) if key == "RFC2136_HOST"
        ));

        let bad_host = Rfc2136Provider::from_credentials(
            &credentials(&[("RFC2136_HOST", "ns1"), ("RFC2136_ZONES", "example.net")]),
            ProviderConfig::default(),
        );
        assert!(matches!(
            bad_host,
            Err(ConfigError::InvalidCredential { key, .. }) if key == "RFC2136_HOST"
        ));

        let half_tsig = Rfc2136Provider::from_credentials(
            &credentials(&[
                ("RFC2136_HOST", "10.0.0.53"),
                ("RFC2136_ZONES", "example.net"),
                ("RFC2136_TSIG_KEYNAME", "zonemux-key"),
            ]),
            ProviderConfig::default(),
        );
        assert!(matches!(
            half_tsig,
            Err(ConfigError::MissingCredential { key, .. }) if key == "RFC2136_TSIG_SECRET"
        ));

        let bad_secret = Rfc2136Provider::from_credentials(
            &credentials(&[
                ("RFC2136_HOST", "10.0.0.53"),
                ("RFC2136_ZONES", "example.net"),
                ("RFC2136_TSIG_KEYNAME", "zonemux-key"),
                ("RFC2136_TSIG_SECRET", "not base64!"),
            ]),
            ProviderConfig::default(),
        );
        assert!(matches!(
            bad_secret,
            Err(ConfigError::InvalidCredential { key, .. }) if key == "RFC2136_TSIG_SECRET"
        ));
    }

    #[test]
    fn test_parse_tsig_algorithm() {
        assert_eq!(
            parse_tsig_algorithm("HMAC-SHA256.").unwrap(),
            TsigAlgorithm::HmacSha256
        );
        assert_eq!(
            parse_tsig_algorithm("hmac-md5.sig-alg.reg.int").unwrap(),
            TsigAlgorithm::HmacMd5
        );
        assert!(parse_tsig_algorithm("rot13").is_err());
    }

    #[tokio::test]
    async fn test_zones_are_filtered() {
        let provider = Rfc2136Provider::from_credentials(
            &credentials(&[
                ("RFC2136_HOST", "10.0.0.53"),
                ("RFC2136_ZONES", "example.net,example.org"),
            ]),
            ProviderConfig {
                domain_filter: DomainFilter::new(vec!["www.example.org".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();

        let zones = provider.zones(&CancellationToken::new()).await.unwrap();
        assert_eq!(zones.keys().cloned().collect::<Vec<_>>(), vec!["example.org"]);
    }

    #[test]
    fn test_records_are_grouped_by_name_and_type() {
        let records = vec![
            record(
                "example.net.",
                3600,
                RData::SOA(rdata::SOA::new(
                    Name::from_str("ns1.example.net.").unwrap(),
                    Name::from_str("admin.example.net.").unwrap(),
                    1,
                    3600,
                    600,
                    86400,
                    300,
                )),
            ),
            record("www.example.net.", 300, RData::A(Ipv4Addr::new(10, 0, 0, 1).into())),
            record("www.example.net.", 300, RData::A(Ipv4Addr::new(10, 0, 0, 2).into())),
            record(
                "example.net.",
                3600,
                RData::MX(rdata::MX::new(10, Name::from_str("mail.example.net.").unwrap())),
            ),
            record(
                "_sip._tcp.example.net.",
                60,
                RData::SRV(rdata::SRV::new(
                    10,
                    5,
                    5060,
                    Name::from_str("sip.example.net.").unwrap(),
                )),
            ),
            record(
                "api.example.net.",
                300,
                RData::CNAME(rdata::CNAME(Name::from_str("www.example.net.").unwrap())),
            ),
            record(
                "example.net.",
                300,
                RData::TXT(rdata::TXT::new(vec!["v=spf1".to_string(), " -all".to_string()])),
            ),
        ];

        let endpoints = records_to_endpoints(&records);
        assert_eq!(
            endpoints,
            vec![
                Endpoint::new(
                    "www.example.net",
                    RecordType::A,
                    vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
                )
                .with_ttl(300),
                Endpoint::new(
                    "example.net",
                    RecordType::MX,
                    vec!["10 mail.example.net".to_string()],
                )
                .with_ttl(3600),
                Endpoint::new(
                    "_sip._tcp.example.net",
                    RecordType::SRV,
                    vec!["10 5 5060 sip.example.net".to_string()],
                )
                .with_ttl(60),
                Endpoint::new(
                    "api.example.net",
                    RecordType::CNAME,
                    vec!["www.example.net".to_string()],
                )
                .with_ttl(300),
                Endpoint::new("example.net", RecordType::TXT, vec!["v=spf1 -all".to_string()])
                    .with_ttl(300),
            ]
        );
    }

    #[test]
    fn test_endpoint_to_record_set() {
        let endpoint = Endpoint::new(
            "www.example.net",
            RecordType::A,
            vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        );
        let record_set = endpoint_to_record_set(&endpoint, 300).unwrap();
        assert_eq!(record_set.name(), &Name::from_str("www.example.net.").unwrap());
        assert_eq!(record_set.ttl(), 300);
        let data: Vec<RData> = record_set
            .records_without_rrsigs()
            .filter_map(|r| r.data().cloned())
            .collect();
        assert_eq!(
            data,
            vec![
                RData::A(Ipv4Addr::new(10, 0, 0, 1).into()),
                RData::A(Ipv4Addr::new(10, 0, 0, 2).into()),
            ]
        );
    }

    #[test]
    fn test_endpoint_to_record_set_hostnames_are_qualified() {
        let mx = Endpoint::new("example.net", RecordType::MX, vec!["10 mail.example.net".to_string()])
            .with_ttl(3600);
        let record_set = endpoint_to_record_set(&mx, 300).unwrap();
        assert_eq!(record_set.ttl(), 3600);
        let data: Vec<RData> = record_set
            .records_without_rrsigs()
            .filter_map(|r| r.data().cloned())
            .collect();
        assert_eq!(
            data,
            vec![RData::MX(rdata::MX::new(
                10,
                Name::from_str("mail.example.net.").unwrap()
            ))]
        );
    }

    #[test]
    fn test_endpoint_to_record_set_rejects_malformed_targets() {
        let bad_a = Endpoint::new("www.example.net", RecordType::A, vec!["not-an-ip".to_string()]);
        assert!(endpoint_to_record_set(&bad_a, 300).is_err());

        let bad_srv = Endpoint::new("_sip._tcp.example.net", RecordType::SRV, vec!["10 5".to_string()]);
        assert!(endpoint_to_record_set(&bad_srv, 300).is_err());

        let caa = Endpoint::new("example.net", RecordType::CAA, vec!["0 issue ca".to_string()]);
        assert!(endpoint_to_record_set(&caa, 300).is_err());
    }

    #[test]
    fn test_adjust_endpoints_merges_members_into_record_sets() {
        let eu = Endpoint::new("lb.example.net", RecordType::A, vec!["10.0.0.1".to_string()])
            .with_set_identifier("eu")
            .with_provider_specific("routingpolicy", "geo")
            .with_provider_specific("geo-code", "europe-west1");
        let us = Endpoint::new("LB.example.net", RecordType::A, vec!["10.0.0.2".to_string()])
            .with_set_identifier("us")
            .with_ttl(60);
        let www = Endpoint::new("www.example.net", RecordType::A, vec!["10.0.0.3".to_string()]);

        let adjusted = provider().adjust_endpoints(vec![eu, us, www.clone()]);
        assert_eq!(
            adjusted,
            vec![
                Endpoint::new(
                    "lb.example.net",
                    RecordType::A,
                    vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
                )
                .with_ttl(60),
                www,
            ]
        );

        // the adjusted endpoints have the keys the nameserver will report back
        let keys = |endpoints: &[Endpoint]| -> Vec<_> {
            endpoints.iter().map(Endpoint::key).collect()
        };
        assert_eq!(keys(&adjusted), keys(&written(&adjusted)));
        for (desired, read_back) in adjusted.iter().zip(written(&adjusted)) {
            assert!(read_back.satisfies(desired));
        }
    }

    #[test]
    fn test_long_txt_is_split_into_character_strings() {
        let payload = OwnershipRecord {
            owner: "team-a".to_string(),
            targets: (1..=12)
                .map(|i| format!("backend-{i}.europe-west1.example.net"))
                .collect(),
        }
        .to_txt();
        assert!(payload.len() > 255);
        let endpoint = Endpoint::new(
            "team-a-a.lb.example.net",
            RecordType::TXT,
            vec![payload.clone()],
        );

        let record_set = endpoint_to_record_set(&endpoint, 300).unwrap();
        let chunks: Vec<usize> = record_set
            .records_without_rrsigs()
            .filter_map(|r| match r.data() {
                Some(RData::TXT(txt)) => Some(txt.txt_data().iter().map(|c| c.len()).collect::<Vec<_>>()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(chunks.len(), payload.len().div_ceil(255));
        assert!(chunks.iter().all(|len| *len <= 255));

        let read_back = written(&[endpoint]);
        assert_eq!(read_back[0].targets, vec![payload]);
        assert_eq!(
            OwnershipRecord::parse(&read_back[0].targets[0]).unwrap().targets.len(),
            12
        );
    }

    /// Requires a nameserver on 127.0.0.1:53 accepting AXFR and updates for `example.net`.
    #[tokio::test]
    #[ignore = "requires a live nameserver"]
    async fn test_live_round_trip() {
        use crate::plan::Changes;

        let provider = Rfc2136Provider::from_credentials(
            &credentials(&[("RFC2136_HOST", "127.0.0.1"), ("RFC2136_ZONES", "example.net")]),
            ProviderConfig::default(),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let endpoint = Endpoint::new(
            "zonemux-live.example.net",
            RecordType::A,
            vec!["192.0.2.10".to_string()],
        )
        .with_ttl(60);

        provider
            .apply_changes(
                Changes {
                    create: vec![endpoint.clone()],
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap();
        let records = provider.records(&cancel).await.unwrap();
        assert!(records.contains(&endpoint));

        provider
            .apply_changes(
                Changes {
                    delete: vec![endpoint.clone()],
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap();
    }
}
