//! Parser for `lmutil lmstat -a` output.
//!
//! The report is semi-structured text meant for humans. This is a best-effort
//! scraper: lines that match nothing are skipped, and the parser always returns
//! a (possibly empty) [`Snapshot`].
//!
//! ```text
//! localhost: license server UP (MASTER) v11.18.1          <- server status
//! SOLIDWORKS: UP v11.18.1                                 <- daemon status
//! Users of SOLIDWORKS:  (Total of 10 licenses issued;  Total of 3 licenses in use)
//!   "SOLIDWORKS" v2023.0400, vendor: SOLIDWORKS           <- ignored
//!     user1 WS-01 WS-01 (v2023.0400) (localhost/27000 1234), start Wed 8/4 14:25
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{DaemonStatus, Feature, Snapshot, UsageRecord};

const SERVER_UP: &str = "license server UP";
const SERVER_DOWN: &str = "Cannot connect to license server";
const SECTION_PREFIX: &str = "Users of ";

static DAEMON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w+): UP v([0-9.]+)").expect("valid daemon regex"));

static FEATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Users of (\w+):\s+\(Total of (\d+) licenses? issued;\s+Total of (\d+) licenses? in use\)",
    )
    .expect("valid feature regex")
});

// Checkout lines are indented; match against the untrimmed line.
static USER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+(\S+)\s+(\S+)\s+(\S+)\s+\([^)]+\)\s+\([^)]+\s+\d+\)")
        .expect("valid user regex")
});

/// Section state carried across lines.
#[derive(Default)]
struct ParseState {
    snapshot: Snapshot,
    /// Index into `snapshot.features` of the open section.
    current_feature: Option<usize>,
    in_users_section: bool,
}

impl ParseState {
    fn open_feature(&mut self, feature: Feature) {
        self.snapshot.features.push(feature);
        self.current_feature = Some(self.snapshot.features.len() - 1);
        self.in_users_section = true;
    }

    fn close_feature(&mut self) {
        self.current_feature = None;
        self.in_users_section = false;
    }

    fn push_user(&mut self, idx: usize, username: &str, hostname: &str, display: &str) {
        let feature = &mut self.snapshot.features[idx];
        let record = UsageRecord {
            username: username.to_string(),
            hostname: hostname.to_string(),
            display: display.to_string(),
            feature: feature.name.clone(),
        };
        feature.users.push(record.clone());
        self.snapshot.users.push(record);
    }
}

/// Parses the full output of `lmutil lmstat -a`.
///
/// Never fails. A report without a recognizable server status phrase yields
/// `server_up = false`.
pub fn parse_lmstat(text: &str) -> Snapshot {
    let mut state = ParseState::default();

    for raw_line in text.lines() {
        let line = raw_line.trim();

        if line.contains(SERVER_UP) {
            state.snapshot.server_up = true;
        } else if line.contains(SERVER_DOWN) {
            state.snapshot.server_up = false;
        }

        // Daemon lines may be interleaved with anything, including user sections.
        if let Some(daemon) = parse_daemon_line(line) {
            state.snapshot.daemons.push(daemon);
        }

        if let Some(feature) = parse_feature_header(line) {
            state.open_feature(feature);
            continue;
        }

        if line.starts_with(SECTION_PREFIX) && state.current_feature.is_some() {
            state.close_feature();
        }

        if !state.in_users_section {
            continue;
        }
        let Some(idx) = state.current_feature else {
            continue;
        };
        if let Some((username, hostname, display)) = parse_user_line(raw_line) {
            state.push_user(idx, username, hostname, display);
        }
    }

    state.snapshot
}

/// Parses a vendor daemon status line such as `SOLIDWORKS: UP v11.18.1`.
pub fn parse_daemon_line(line: &str) -> Option<DaemonStatus> {
    let caps = DAEMON_RE.captures(line)?;
    Some(DaemonStatus {
        name: caps[1].to_string(),
        version: caps[2].to_string(),
        up: true,
    })
}

/// Parses a `Users of <FEATURE>: (Total of N licenses issued; Total of M licenses in use)` header.
///
/// Counts that do not fit into `u64` make the line a non-header.
pub fn parse_feature_header(line: &str) -> Option<Feature> {
    let caps = FEATURE_RE.captures(line)?;
    let total = caps[2].parse().ok()?;
    let used = caps[3].parse().ok()?;
    Some(Feature::new(&caps[1], total, used))
}

/// Parses an indented checkout line into `(username, hostname, display)`.
pub fn parse_user_line(line: &str) -> Option<(&str, &str, &str)> {
    let caps = USER_RE.captures(line)?;
    Some((
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3)?.as_str(),
    ))
}
