//! Data model for parsed `lmstat` reports.
//!
//! A [`Snapshot`] is built fresh by every parse call and lives for a single
//! poll cycle. Nothing in here is shared between cycles.

use serde::{Deserialize, Serialize};

/// Sentinel used when a lookup ran but produced nothing usable.
pub const UNKNOWN: &str = "Unknown";

/// Everything recovered from a single `lmstat -a` report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Whether the report says the license server is up.
    pub server_up: bool,
    /// Vendor daemons in order of first appearance.
    pub daemons: Vec<DaemonStatus>,
    /// Features in order of first appearance.
    pub features: Vec<Feature>,
    /// Every checkout line of the report, in document order.
    pub users: Vec<UsageRecord>,
}

impl Snapshot {
    /// Looks up a feature by name.
    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// Status line of a vendor daemon (`SOLIDWORKS: UP v11.18.1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub name: String,
    pub version: String,
    pub up: bool,
}

/// A licensed feature and its pool.
///
/// `used_licenses` comes from the section header while `users` comes from the
/// checkout lines below it. The two may disagree and are kept as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub total_licenses: u64,
    pub used_licenses: u64,
    pub users: Vec<UsageRecord>,
}

impl Feature {
    /// Creates a feature with no checkout lines yet.
    pub fn new(name: impl Into<String>, total_licenses: u64, used_licenses: u64) -> Self {
        Self {
            name: name.into(),
            total_licenses,
            used_licenses,
            users: Vec::new(),
        }
    }

    /// Licenses still free in the pool.
    ///
    /// Saturates at zero: overdrafts (borrowed or overdraft licenses) can make
    /// `used` exceed `total` in real reports.
    pub fn available_licenses(&self) -> u64 {
        self.total_licenses.saturating_sub(self.used_licenses)
    }
}

/// One user's checkout of one feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsageRecord {
    pub username: String,
    pub hostname: String,
    pub display: String,
    pub feature: String,
}

/// Where a user sits, as far as the directory knows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationInfo {
    pub location: String,
    pub department: String,
}

impl LocationInfo {
    pub fn new(location: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            department: department.into(),
        }
    }

    /// The `Unknown`/`Unknown` sentinel.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.location == UNKNOWN && self.department == UNKNOWN
    }
}

impl Default for LocationInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_is_derived() {
        let mut f = Feature::new("SOLIDWORKS", 10, 3);
        assert_eq!(f.available_licenses(), 7);
        f.used_licenses = 10;
        assert_eq!(f.available_licenses(), 0);
    }

    #[test]
    fn test_available_saturates_on_overdraft() {
        let f = Feature::new("SOLIDWORKS", 2, 5);
        assert_eq!(f.available_licenses(), 0);
    }

    #[test]
    fn test_location_unknown_sentinel() {
        assert!(LocationInfo::unknown().is_unknown());
        assert!(LocationInfo::default().is_unknown());
        assert!(!LocationInfo::new("Berlin", UNKNOWN).is_unknown());
    }
}
