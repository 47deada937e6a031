// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for zone partitioning and batching.

#[cfg(test)]
mod tests {
    use crate::endpoint::{Endpoint, RecordType};
    use crate::errors::ProviderError;
    use crate::plan::batch::*;
    use crate::zone::Zone;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn a(name: &str, target: &str) -> Endpoint {
        Endpoint::new(name, RecordType::A, vec![target.to_string()])
    }

    fn zones() -> BTreeMap<String, Zone> {
        let mut zones = BTreeMap::new();
        zones.insert("net".to_string(), Zone::new("net", "example-net", "example.net"));
        zones.insert("org".to_string(), Zone::new("org", "example-org", "example.org"));
        zones
    }

    /// `count` changes for `name`, alternating additions and deletions.
    fn changes_for(name: &str, count: usize) -> ZoneChange {
        let mut change = ZoneChange::default();
        for i in 0..count {
            let endpoint = a(name, &format!("10.0.0.{i}"));
            if i % 2 == 0 {
                change.additions.push(endpoint);
            } else {
                change.deletions.push(endpoint);
            }
        }
        change
    }

    fn merge(mut left: ZoneChange, right: ZoneChange) -> ZoneChange {
        left.additions.extend(right.additions);
        left.deletions.extend(right.deletions);
        left
    }

    fn names(change: &ZoneChange) -> BTreeSet<String> {
        change
            .additions
            .iter()
            .chain(change.deletions.iter())
            .map(|e| e.dns_name.clone())
            .collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<(String, ZoneChange)>>,
        fail_zone: Option<String>,
    }

    #[async_trait]
    impl ChangeSink for RecordingSink {
        async fn submit(&self, zone: &Zone, batch: &ZoneChange) -> Result<(), ProviderError> {
            if self.fail_zone.as_deref() == Some(zone.id.as_str()) {
                return Err(ProviderError::Api {
                    status: 429,
                    url: "http://dns.test/changes".to_string(),
                    body: "rate limited".to_string(),
                });
            }
            self.submitted
                .lock()
                .unwrap()
                .push((zone.id.clone(), batch.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_batching_never_splits_a_name() {
        let change = merge(
            changes_for("name1.example.net", 3),
            changes_for("name2.example.net", 4),
        );

        let batches = batch_change(change, 5);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(names(&batches[0]), BTreeSet::from(["name1.example.net".to_string()]));
        assert_eq!(batches[1].len(), 4);
        assert_eq!(names(&batches[1]), BTreeSet::from(["name2.example.net".to_string()]));
    }

    #[test]
    fn test_batching_packs_small_groups_together() {
        let change = merge(
            merge(
                changes_for("a.example.net", 2),
                changes_for("b.example.net", 2),
            ),
            changes_for("c.example.net", 2),
        );

        let batches = batch_change(change, 4);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 4);
        assert_eq!(batches[1].len(), 2);
        assert!(batches.iter().all(|b| b.len() <= 4));
    }

    #[test]
    fn test_oversized_name_group_is_skipped() {
        let change = merge(
            changes_for("big.example.net", 6),
            changes_for("small.example.net", 2),
        );

        let batches = batch_change(change, 5);
        assert_eq!(batches.len(), 1);
        assert_eq!(names(&batches[0]), BTreeSet::from(["small.example.net".to_string()]));
    }

    #[test]
    fn test_zero_batch_size_disables_batching() {
        let change = merge(
            changes_for("a.example.net", 3),
            changes_for("b.example.net", 4),
        );
        let batches = batch_change(change.clone(), 0);
        assert_eq!(batches, vec![change]);
    }

    #[test]
    fn test_empty_change_yields_no_batches() {
        assert!(batch_change(ZoneChange::default(), 10).is_empty());
    }

    #[test]
    fn test_partition_drops_unmatched_records() {
        let change = ZoneChange {
            additions: vec![a("www.example.net", "10.0.0.1"), a("www.other.com", "10.0.0.2")],
            deletions: vec![a("old.example.org", "10.0.0.3")],
        };

        let partitioned = partition_by_zone(change, &zones());
        assert_eq!(partitioned.len(), 2);
        assert_eq!(partitioned["net"].additions.len(), 1);
        assert!(partitioned["net"].deletions.is_empty());
        assert_eq!(partitioned["org"].deletions.len(), 1);
    }

    #[test]
    fn test_partition_omits_zones_without_changes() {
        let change = ZoneChange {
            additions: vec![a("www.example.net", "10.0.0.1")],
            deletions: vec![],
        };
        let partitioned = partition_by_zone(change, &zones());
        assert!(!partitioned.contains_key("org"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submitter_paces_batches() {
        let sink = RecordingSink::default();
        let submitter = ChangeSubmitter {
            provider: "test",
            batch_size: 2,
            interval: Duration::from_secs(1),
            dry_run: false,
        };
        let change = merge(
            merge(
                changes_for("a.example.net", 2),
                changes_for("b.example.net", 2),
            ),
            changes_for("c.example.net", 2),
        );

        let start = tokio::time::Instant::now();
        submitter
            .submit(&sink, &zones(), change, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sink.submitted.lock().unwrap().len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let sink = RecordingSink::default();
        let submitter = ChangeSubmitter {
            provider: "test",
            batch_size: 1000,
            interval: Duration::from_secs(1),
            dry_run: true,
        };

        submitter
            .submit(
                &sink,
                &zones(),
                changes_for("a.example.net", 2),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(sink.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_zone_does_not_block_other_zones() {
        let sink = RecordingSink {
            fail_zone: Some("net".to_string()),
            ..Default::default()
        };
        let submitter = ChangeSubmitter {
            provider: "test",
            batch_size: 1000,
            interval: Duration::from_millis(10),
            dry_run: false,
        };
        let change = ZoneChange {
            additions: vec![a("www.example.net", "10.0.0.1"), a("www.example.org", "10.0.0.2")],
            deletions: vec![],
        };

        let result = submitter
            .submit(&sink, &zones(), change, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ProviderError::Api { status: 429, .. })));
        let submitted = sink.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, "org");
    }

    #[tokio::test]
    async fn test_cancelled_submission_returns_cancelled() {
        let sink = RecordingSink::default();
        let submitter = ChangeSubmitter {
            provider: "test",
            batch_size: 1000,
            interval: Duration::from_secs(1),
            dry_run: false,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = submitter
            .submit(&sink, &zones(), changes_for("a.example.net", 1), &cancel)
            .await;
        assert!(matches!(result, Err(e) if e.is_cancelled()));
        assert!(sink.submitted.lock().unwrap().is_empty());
    }
}
