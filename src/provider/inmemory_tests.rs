// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the in-memory provider.

#[cfg(test)]
mod tests {
    use crate::endpoint::{Endpoint, RecordType};
    use crate::errors::ProviderError;
    use crate::plan::Changes;
    use crate::provider::inmemory::*;
    use crate::provider::{Credentials, Provider, ProviderConfig};
    use crate::zone::DomainFilter;
    use std::collections::BTreeMap;
    use tokio_util::sync::CancellationToken;

    fn a(name: &str, target: &str) -> Endpoint {
        Endpoint::new(name, RecordType::A, vec![target.to_string()])
    }

    fn provider() -> InMemoryProvider {
        InMemoryProvider::new(
            &["example.net".to_string(), "example.org.".to_string()],
            ProviderConfig {
                batch_change_interval: 0,
                ..Default::default()
            },
        )
    }

    fn create(endpoints: Vec<Endpoint>) -> Changes {
        Changes {
            create: endpoints,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_zones_from_credentials() {
        let credentials = Credentials::from_string_map(BTreeMap::from([(
            "INMEMORY_ZONES".to_string(),
            "example.net, example.org".to_string(),
        )]));
        let provider =
            InMemoryProvider::from_credentials(&credentials, ProviderConfig::default()).unwrap();

        let zones = provider.zones(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            zones.keys().cloned().collect::<Vec<_>>(),
            vec!["example.net", "example.org"]
        );
    }

    #[tokio::test]
    async fn test_zones_honour_domain_filter() {
        let provider = InMemoryProvider::new(
            &["example.net".to_string(), "example.org".to_string()],
            ProviderConfig {
                domain_filter: DomainFilter::new(vec!["example.org".to_string()]),
                ..Default::default()
            },
        );
        let zones = provider.zones(&CancellationToken::new()).await.unwrap();
        assert_eq!(zones.keys().cloned().collect::<Vec<_>>(), vec!["example.org"]);
    }

    #[tokio::test]
    async fn test_apply_and_list_records() {
        let provider = provider();
        let cancel = CancellationToken::new();
        provider
            .apply_changes(
                create(vec![a("www.example.net", "10.0.0.1"), a("www.example.org", "10.0.0.2")]),
                &cancel,
            )
            .await
            .unwrap();

        let records = provider.records(&cancel).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            provider.zone_records("example.net").await,
            vec![a("www.example.net", "10.0.0.1")]
        );
    }

    #[tokio::test]
    async fn test_labels_are_not_stored() {
        let provider = provider();
        provider
            .apply_changes(
                create(vec![a("www.example.net", "10.0.0.1").with_label("owner", "a")]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(provider.zone_records("example.net").await[0].labels.is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let provider = provider();
        let cancel = CancellationToken::new();
        provider
            .apply_changes(create(vec![a("www.example.net", "10.0.0.1")]), &cancel)
            .await
            .unwrap();

        provider
            .apply_changes(
                Changes {
                    update_old: vec![a("www.example.net", "10.0.0.1")],
                    update_new: vec![a("www.example.net", "10.0.0.2")],
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(
            provider.zone_records("example.net").await,
            vec![a("www.example.net", "10.0.0.2")]
        );
    }

    #[tokio::test]
    async fn test_create_existing_record_is_rejected_atomically() {
        let provider = provider();
        let cancel = CancellationToken::new();
        provider
            .apply_changes(create(vec![a("www.example.net", "10.0.0.1")]), &cancel)
            .await
            .unwrap();

        let result = provider
            .apply_changes(
                create(vec![a("api.example.net", "10.0.0.3"), a("www.example.net", "10.0.0.2")]),
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(ProviderError::InvalidChange { .. })));
        assert_eq!(
            provider.zone_records("example.net").await,
            vec![a("www.example.net", "10.0.0.1")]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_record_is_rejected() {
        let provider = provider();
        let result = provider
            .apply_changes(
                Changes {
                    delete: vec![a("gone.example.net", "10.0.0.1")],
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ProviderError::InvalidChange { zone, .. }) if zone == "example.net"));
    }

    #[tokio::test]
    async fn test_empty_change_is_noop() {
        let provider = provider();
        let cancel = CancellationToken::new();
        cancel.cancel();
        // An empty change returns before any zone listing, even when cancelled.
        provider
            .apply_changes(Changes::default(), &cancel)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_listing() {
        let provider = provider();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = provider.records(&cancel).await;
        assert!(matches!(result, Err(e) if e.is_cancelled()));
    }
}
