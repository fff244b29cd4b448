//! Directory record and its text form.

use serde::{Deserialize, Serialize};

use crate::model::{LocationInfo, UNKNOWN};

/// What a directory knows about one user.
///
/// Empty strings mean "attribute not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub full_name: String,
    /// Explicit location. When empty it is derived from the address fields.
    pub location: String,
    pub department: String,
    pub office: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

impl DirectoryEntry {
    /// Location label for metrics.
    ///
    /// Precedence: explicit location, then `office - city - state` (non-empty
    /// parts only), then country, then `Unknown`.
    pub fn location(&self) -> String {
        if !self.location.is_empty() {
            return self.location.clone();
        }
        let parts: Vec<&str> = [&self.office, &self.city, &self.state]
            .into_iter()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
            .collect();
        if !parts.is_empty() {
            parts.join(" - ")
        } else if !self.country.is_empty() {
            self.country.clone()
        } else {
            UNKNOWN.to_string()
        }
    }

    pub fn location_info(&self) -> LocationInfo {
        let department = if self.department.is_empty() {
            UNKNOWN
        } else {
            self.department.as_str()
        };
        LocationInfo::new(self.location(), department)
    }
}

/// Parses `key: value` lines printed by a directory helper.
///
/// Both friendly keys and the usual LDAP attribute names are accepted
/// (`city`/`l`, `office`/`physicalDeliveryOfficeName`, ...). Keys are
/// case-insensitive; unknown keys are ignored. Returns `None` if no known
/// attribute was present.
pub fn parse_directory_output(text: &str) -> Option<DirectoryEntry> {
    let mut entry = DirectoryEntry::default();
    let mut found = false;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let slot = match key.trim().to_ascii_lowercase().as_str() {
            "full_name" | "fullname" | "displayname" | "cn" => &mut entry.full_name,
            "location" => &mut entry.location,
            "department" => &mut entry.department,
            "office" | "physicaldeliveryofficename" => &mut entry.office,
            "city" | "l" => &mut entry.city,
            "state" | "st" => &mut entry.state,
            // `co` is the country name, `c` the ISO code; prefer the name.
            "country" | "co" => &mut entry.country,
            "c" if entry.country.is_empty() => &mut entry.country,
            _ => continue,
        };
        *slot = value.to_string();
        found = true;
    }

    found.then_some(entry)
}
