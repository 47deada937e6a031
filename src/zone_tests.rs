// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for zones and zone filters.

#[cfg(test)]
mod tests {
    use crate::zone::*;
    use std::collections::BTreeMap;

    fn zones() -> BTreeMap<String, Zone> {
        let mut zones = BTreeMap::new();
        zones.insert("1".to_string(), Zone::new("1", "example-net", "example.net."));
        zones.insert(
            "2".to_string(),
            Zone::new("2", "sub-example-net", "sub.example.net"),
        );
        zones.insert(
            "3".to_string(),
            Zone::new("3", "example-org", "example.org").with_visibility(Visibility::Private),
        );
        zones
    }

    #[test]
    fn test_find_zone_uses_longest_suffix() {
        let zones = zones();
        assert_eq!(find_zone(&zones, "www.sub.example.net."), Some("2"));
        assert_eq!(find_zone(&zones, "sub.example.net"), Some("2"));
        assert_eq!(find_zone(&zones, "www.example.net"), Some("1"));
        assert_eq!(find_zone(&zones, "www.other.com"), None);
        assert_eq!(find_zone(&zones, "notexample.net"), None);
    }

    #[test]
    fn test_domain_filter_matches_records() {
        let filter = DomainFilter::new(vec!["example.net".to_string()]);
        assert!(filter.matches("www.example.net"));
        assert!(filter.matches("example.net."));
        assert!(!filter.matches("example.org"));
        assert!(DomainFilter::default().matches("anything.org"));
    }

    #[test]
    fn test_domain_filter_exclusions() {
        let filter = DomainFilter {
            filters: vec!["example.net".to_string()],
            exclude: vec!["internal.example.net".to_string()],
        };
        assert!(filter.matches("www.example.net"));
        assert!(!filter.matches("db.internal.example.net"));
    }

    #[test]
    fn test_domain_filter_accepts_parent_zones() {
        let filter = DomainFilter::new(vec!["app.example.net".to_string()]);
        assert!(filter.matches_zone("example.net"));
        assert!(filter.matches_zone("app.example.net"));
        assert!(!filter.matches_zone("example.org"));
        assert!(!filter.matches("www.example.net"));
    }

    #[test]
    fn test_zone_id_filter_matches_id_or_name() {
        let zone = Zone::new("123", "example-net", "example.net");
        assert!(ZoneIdFilter::default().matches(&zone));
        assert!(ZoneIdFilter(vec!["123".to_string()]).matches(&zone));
        assert!(ZoneIdFilter(vec!["example-net".to_string()]).matches(&zone));
        assert!(!ZoneIdFilter(vec!["456".to_string()]).matches(&zone));
    }

    #[test]
    fn test_zone_filter_visibility() {
        let zones = zones();
        let filter = ZoneFilter {
            visibility: Some(Visibility::Private),
            ..Default::default()
        };
        let matching: Vec<&str> = zones
            .values()
            .filter(|z| filter.matches(z))
            .map(|z| z.id.as_str())
            .collect();
        assert_eq!(matching, vec!["3"]);
    }

    #[test]
    fn test_visibility_from_provider() {
        assert_eq!(Visibility::from_provider(Some("private")), Visibility::Private);
        assert_eq!(Visibility::from_provider(Some("public")), Visibility::Public);
        assert_eq!(Visibility::from_provider(None), Visibility::Public);
    }
}
