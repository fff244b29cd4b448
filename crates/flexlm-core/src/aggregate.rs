//! Rolls a parsed [`Snapshot`] and resolved user locations into a [`MetricSet`].

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::model::{DaemonStatus, LocationInfo, Snapshot};

/// Header counts of one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCounts {
    pub name: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
}

/// One checkout line enriched with the user's location. Always worth one license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLicense {
    pub feature: String,
    pub username: String,
    pub hostname: String,
    pub display: String,
    pub location: String,
    pub department: String,
}

/// Everything published for one poll cycle.
///
/// Rollups are keyed by tuples so that label values containing separators
/// cannot collide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricSet {
    pub server_up: bool,
    pub daemons: Vec<DaemonStatus>,
    pub features: Vec<FeatureCounts>,
    pub user_licenses: Vec<UserLicense>,
    /// Checkouts per `(feature, location)`.
    pub feature_locations: BTreeMap<(String, String), u64>,
    /// Checkouts per `(hostname, location)`.
    pub host_locations: BTreeMap<(String, String), u64>,
    /// Distinct usernames per location, across all features.
    pub location_users: BTreeMap<String, u64>,
}

impl MetricSet {
    pub fn feature_location_count(&self, feature: &str, location: &str) -> u64 {
        self.feature_locations
            .get(&(feature.to_string(), location.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn host_count(&self, hostname: &str, location: &str) -> u64 {
        self.host_locations
            .get(&(hostname.to_string(), location.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn location_user_count(&self, location: &str) -> u64 {
        self.location_users.get(location).copied().unwrap_or(0)
    }
}

/// Aggregates a snapshot.
///
/// `resolve` is called at most once per distinct username. It cannot fail:
/// lookup errors must already be folded into [`LocationInfo::unknown`].
pub fn aggregate<F>(snapshot: &Snapshot, mut resolve: F) -> MetricSet
where
    F: FnMut(&str) -> LocationInfo,
{
    let mut resolved: HashMap<&str, LocationInfo> = HashMap::new();
    let mut users_by_location: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();

    let mut set = MetricSet {
        server_up: snapshot.server_up,
        daemons: snapshot.daemons.clone(),
        features: snapshot
            .features
            .iter()
            .map(|f| FeatureCounts {
                name: f.name.clone(),
                total: f.total_licenses,
                used: f.used_licenses,
                available: f.available_licenses(),
            })
            .collect(),
        ..MetricSet::default()
    };

    for feature in &snapshot.features {
        for record in &feature.users {
            let info = resolved
                .entry(record.username.as_str())
                .or_insert_with(|| resolve(&record.username));

            set.user_licenses.push(UserLicense {
                feature: feature.name.clone(),
                username: record.username.clone(),
                hostname: record.hostname.clone(),
                display: record.display.clone(),
                location: info.location.clone(),
                department: info.department.clone(),
            });

            *set.feature_locations
                .entry((feature.name.clone(), info.location.clone()))
                .or_default() += 1;
            *set.host_locations
                .entry((record.hostname.clone(), info.location.clone()))
                .or_default() += 1;
            users_by_location
                .entry(info.location.clone())
                .or_default()
                .insert(record.username.as_str());
        }
    }

    set.location_users = users_by_location
        .into_iter()
        .map(|(location, users)| (location, users.len() as u64))
        .collect();
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::scenarios;
    use crate::collector::parse_lmstat;
    use crate::model::{Feature, UsageRecord};

    fn record(user: &str, host: &str, feature: &str) -> UsageRecord {
        UsageRecord {
            username: user.to_string(),
            hostname: host.to_string(),
            display: host.to_string(),
            feature: feature.to_string(),
        }
    }

    fn snapshot_with(features: Vec<Feature>) -> Snapshot {
        let users = features.iter().flat_map(|f| f.users.clone()).collect();
        Snapshot {
            server_up: true,
            daemons: Vec::new(),
            features,
            users,
        }
    }

    fn by_city(user: &str) -> LocationInfo {
        match user {
            "a" | "b" => LocationInfo::new("Berlin", "Eng"),
            "c" => LocationInfo::new("Munich", "Sales"),
            _ => LocationInfo::unknown(),
        }
    }

    #[test]
    fn test_location_rollups() {
        let mut bar = Feature::new("BAR", 10, 3);
        bar.users = vec![
            record("a", "h1", "BAR"),
            record("b", "h2", "BAR"),
            record("c", "h3", "BAR"),
        ];
        let set = aggregate(&snapshot_with(vec![bar]), by_city);

        assert_eq!(set.feature_location_count("BAR", "Berlin"), 2);
        assert_eq!(set.feature_location_count("BAR", "Munich"), 1);
        assert_eq!(set.location_user_count("Berlin"), 2);
        assert_eq!(set.location_user_count("Munich"), 1);
        assert_eq!(set.user_licenses.len(), 3);
        assert_eq!(set.user_licenses[2].department, "Sales");
    }

    #[test]
    fn test_user_facts_are_not_deduplicated() {
        let mut f1 = Feature::new("F1", 5, 2);
        f1.users = vec![record("a", "h1", "F1"), record("a", "h1", "F1")];
        let mut f2 = Feature::new("F2", 5, 1);
        f2.users = vec![record("a", "h1", "F2")];
        let set = aggregate(&snapshot_with(vec![f1, f2]), by_city);

        assert_eq!(set.user_licenses.len(), 3);
        assert_eq!(set.feature_location_count("F1", "Berlin"), 2);
        assert_eq!(set.host_count("h1", "Berlin"), 3);
        // Distinct users per location span all features.
        assert_eq!(set.location_user_count("Berlin"), 1);
    }

    #[test]
    fn test_same_host_different_locations_stay_separate() {
        let mut f = Feature::new("F", 5, 2);
        f.users = vec![record("a", "shared", "F"), record("c", "shared", "F")];
        let set = aggregate(&snapshot_with(vec![f]), by_city);

        assert_eq!(set.host_count("shared", "Berlin"), 1);
        assert_eq!(set.host_count("shared", "Munich"), 1);
        assert_eq!(set.host_locations.len(), 2);
    }

    #[test]
    fn test_underscores_do_not_collide() {
        let mut f = Feature::new("F", 5, 2);
        f.users = vec![record("x", "ws_a", "F"), record("y", "ws", "F")];
        let set = aggregate(&snapshot_with(vec![f]), |u| match u {
            "x" => LocationInfo::new("b", "d"),
            _ => LocationInfo::new("a_b", "d"),
        });
        assert_eq!(set.host_count("ws_a", "b"), 1);
        assert_eq!(set.host_count("ws", "a_b"), 1);
    }

    #[test]
    fn test_resolver_called_once_per_user() {
        let snapshot = parse_lmstat(scenarios::LARGE_REPORT);
        let mut calls = Vec::new();
        let set = aggregate(&snapshot, |u| {
            calls.push(u.to_string());
            LocationInfo::unknown()
        });

        calls.sort();
        assert_eq!(calls, vec!["jdoe", "kpark", "lnguyen", "mroe"]);
        assert_eq!(set.user_licenses.len(), 7);
        assert_eq!(set.location_user_count("Unknown"), 4);
        assert_eq!(set.feature_location_count("solidworks", "Unknown"), 5);
    }

    #[test]
    fn test_feature_counts_and_status_carried() {
        let snapshot = parse_lmstat(scenarios::TYPICAL_REPORT);
        let set = aggregate(&snapshot, |_| LocationInfo::unknown());

        assert!(set.server_up);
        assert_eq!(set.daemons.len(), 2);
        assert_eq!(
            set.features[0],
            FeatureCounts {
                name: "SOLIDWORKS".to_string(),
                total: 10,
                used: 3,
                available: 7,
            }
        );
        assert_eq!(set.features[1].available, 4);
    }

    #[test]
    fn test_empty_snapshot() {
        let set = aggregate(&Snapshot::default(), |_| unreachable!());
        assert_eq!(set, MetricSet::default());
    }
}
