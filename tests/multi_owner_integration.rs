// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Full reconcile passes of several owners sharing one in-memory zone.

mod common;

use common::{a, backend, owner, pass, stored, ZONE};
use tokio_util::sync::CancellationToken;
use zonemux::endpoint::RecordType;
use zonemux::plan::{ChangeSummary, Changes, Policy};
use zonemux::provider::Provider;
use zonemux::reconciler::ReconcilerConfig;

#[tokio::test]
async fn test_owners_share_a_hostname() {
    let backend = backend();
    let team_a = owner(&backend, "team-a", ReconcilerConfig::default());
    let team_b = owner(&backend, "team-b", ReconcilerConfig::default());

    pass(&team_a, vec![a("lb.example.net", &["10.0.0.1"])]).await;
    pass(&team_b, vec![a("lb.example.net", &["10.0.0.2"])]).await;

    let lb = stored(&backend, "lb.example.net", RecordType::A).await;
    assert_eq!(lb[0].targets, vec!["10.0.0.1", "10.0.0.2"]);

    // team-a leaves: its target and TXT record go, team-b's stay
    pass(&team_a, vec![]).await;

    let lb = stored(&backend, "lb.example.net", RecordType::A).await;
    assert_eq!(lb[0].targets, vec!["10.0.0.2"]);
    assert!(stored(&backend, "team-a-a.lb.example.net", RecordType::TXT)
        .await
        .is_empty());
    assert_eq!(
        stored(&backend, "team-b-a.lb.example.net", RecordType::TXT)
            .await
            .len(),
        1
    );

    // team-b leaves too: nothing is left
    pass(&team_b, vec![]).await;
    assert!(backend.zone_records(ZONE).await.is_empty());
}

#[tokio::test]
async fn test_owner_cannot_remove_foreign_targets() {
    let backend = backend();
    let team_a = owner(&backend, "team-a", ReconcilerConfig::default());
    let team_b = owner(&backend, "team-b", ReconcilerConfig::default());

    pass(&team_a, vec![a("lb.example.net", &["10.0.0.1"])]).await;
    pass(&team_b, vec![a("lb.example.net", &["10.0.0.1", "10.0.0.2"])]).await;

    // team-b drops 10.0.0.1, which team-a still contributes
    pass(&team_b, vec![a("lb.example.net", &["10.0.0.2"])]).await;

    let lb = stored(&backend, "lb.example.net", RecordType::A).await;
    assert_eq!(lb[0].targets, vec!["10.0.0.1", "10.0.0.2"]);
}

#[tokio::test]
async fn test_geo_endpoints_with_set_identifiers() {
    let backend = backend();
    let team_a = owner(&backend, "team-a", ReconcilerConfig::default());
    let eu = a("lb.example.net", &["10.0.0.1"])
        .with_set_identifier("eu")
        .with_provider_specific("routingpolicy", "geo")
        .with_provider_specific("geo-code", "europe-west1");
    let us = a("lb.example.net", &["10.0.0.2"])
        .with_set_identifier("us")
        .with_provider_specific("routingpolicy", "geo")
        .with_provider_specific("geo-code", "us-east1");

    let outcome = pass(&team_a, vec![eu.clone(), us]).await;
    assert_eq!(outcome.changes.created, 2);

    let txt = stored(&backend, "team-a-a.lb.example.net", RecordType::TXT).await;
    let mut identifiers: Vec<&str> = txt.iter().map(|t| t.set_identifier.as_str()).collect();
    identifiers.sort_unstable();
    assert_eq!(identifiers, vec!["eu", "us"]);

    pass(&team_a, vec![eu]).await;

    let lb = stored(&backend, "lb.example.net", RecordType::A).await;
    assert_eq!(lb.len(), 1);
    assert_eq!(lb[0].set_identifier, "eu");
    let txt = stored(&backend, "team-a-a.lb.example.net", RecordType::TXT).await;
    assert_eq!(txt.len(), 1);
    assert_eq!(txt[0].set_identifier, "eu");
}

#[tokio::test]
async fn test_unowned_records_are_never_touched() {
    let backend = backend();
    backend
        .apply_changes(
            Changes {
                create: vec![a("legacy.example.net", &["192.0.2.1"])],
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    let team_a = owner(&backend, "team-a", ReconcilerConfig::default());

    let outcome = pass(&team_a, vec![a("legacy.example.net", &["10.0.0.1"])]).await;
    assert_eq!(outcome.changes, ChangeSummary::default());

    pass(&team_a, vec![]).await;
    assert_eq!(
        backend.zone_records(ZONE).await,
        vec![a("legacy.example.net", &["192.0.2.1"])]
    );
}

#[tokio::test]
async fn test_repeated_pass_plans_nothing() {
    let backend = backend();
    let team_a = owner(&backend, "team-a", ReconcilerConfig::default());
    let desired = vec![
        a("www.example.net", &["10.0.0.1"]),
        a("api.example.net", &["10.0.0.2", "10.0.0.3"]),
    ];

    let first = pass(&team_a, desired.clone()).await;
    let second = pass(&team_a, desired).await;

    assert_eq!(first.changes.created, 2);
    assert_eq!(second.changes, ChangeSummary::default());
    assert_eq!(first.endpoints_hash, second.endpoints_hash);
}

#[tokio::test]
async fn test_upsert_only_keeps_records() {
    let backend = backend();
    let team_a = owner(
        &backend,
        "team-a",
        ReconcilerConfig {
            policy: Policy::UpsertOnly,
        },
    );

    pass(&team_a, vec![a("www.example.net", &["10.0.0.1"])]).await;
    let outcome = pass(&team_a, vec![]).await;

    assert_eq!(outcome.changes.deleted, 0);
    assert_eq!(
        stored(&backend, "www.example.net", RecordType::A).await.len(),
        1
    );
}
