//! Prometheus metrics for license usage.
//!
//! [`LicenseMetrics`] owns its own [`Registry`]; it is created once at startup
//! and shared with the poll loop and the HTTP handler. Scrapes read the text
//! rendered at the end of the last poll cycle and never wait on a running poll.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use prometheus::{Gauge, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::aggregate::MetricSet;

/// Error type for metric registration and encoding.
#[derive(Debug)]
pub enum MetricsError {
    Prometheus(prometheus::Error),
}

impl std::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricsError::Prometheus(e) => write!(f, "metrics error: {}", e),
        }
    }
}

impl std::error::Error for MetricsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetricsError::Prometheus(e) => Some(e),
        }
    }
}

impl From<prometheus::Error> for MetricsError {
    fn from(e: prometheus::Error) -> Self {
        MetricsError::Prometheus(e)
    }
}

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// All exporter metrics for one license server.
pub struct LicenseMetrics {
    registry: Registry,
    /// `host:port` label value.
    server: String,
    vendor: String,

    server_up: IntGaugeVec,
    daemon_up: IntGaugeVec,
    feature_total: IntGaugeVec,
    feature_used: IntGaugeVec,
    feature_available: IntGaugeVec,
    user_licenses: IntGaugeVec,
    feature_location: IntGaugeVec,
    host_licenses: IntGaugeVec,
    location_users: IntGaugeVec,
    cache_entries: IntGauge,
    scrape_duration: Gauge,
    scrape_errors: IntCounter,

    exposition: RwLock<Arc<String>>,
}

impl LicenseMetrics {
    /// Builds and registers every metric.
    pub fn new(
        server: impl Into<String>,
        vendor: impl Into<String>,
    ) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let gauge_vec =
            |name: &str, help: &str, labels: &[&str]| -> Result<IntGaugeVec, MetricsError> {
                let vec = IntGaugeVec::new(Opts::new(name, help), labels)?;
                registry.register(Box::new(vec.clone()))?;
                Ok(vec)
            };

        let server_up = gauge_vec(
            "flexlm_server_up",
            "License server reachable (1 = up, 0 = down)",
            &["server"],
        )?;
        let daemon_up = gauge_vec(
            "flexlm_daemon_up",
            "Vendor daemon status (1 = up, 0 = down)",
            &["server", "daemon", "version"],
        )?;
        let feature_labels = ["server", "vendor", "feature"];
        let feature_total = gauge_vec(
            "flexlm_feature_total_licenses",
            "Licenses issued per feature",
            &feature_labels,
        )?;
        let feature_used = gauge_vec(
            "flexlm_feature_used_licenses",
            "Licenses in use per feature",
            &feature_labels,
        )?;
        let feature_available = gauge_vec(
            "flexlm_feature_available_licenses",
            "Licenses available per feature",
            &feature_labels,
        )?;
        let user_licenses = gauge_vec(
            "flexlm_user_licenses",
            "Licenses checked out by a user",
            &[
                "server",
                "vendor",
                "feature",
                "user",
                "hostname",
                "display",
                "location",
                "department",
            ],
        )?;
        let feature_location = gauge_vec(
            "flexlm_feature_location_licenses",
            "Licenses in use per feature and user location",
            &["server", "vendor", "feature", "location"],
        )?;
        let host_licenses = gauge_vec(
            "flexlm_host_licenses_total",
            "Licenses in use per host",
            &["server", "hostname", "location"],
        )?;
        let location_users = gauge_vec(
            "flexlm_location_users",
            "Distinct users holding licenses per location",
            &["server", "location"],
        )?;

        let cache_entries = IntGauge::new(
            "flexlm_directory_cache_entries",
            "Entries in the user location cache",
        )?;
        registry.register(Box::new(cache_entries.clone()))?;
        let scrape_duration = Gauge::new(
            "flexlm_scrape_duration_seconds",
            "Duration of the last license server poll",
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;
        let scrape_errors = IntCounter::new(
            "flexlm_scrape_errors_total",
            "Failed license server polls",
        )?;
        registry.register(Box::new(scrape_errors.clone()))?;

        let metrics = Self {
            registry,
            server: server.into(),
            vendor: vendor.into(),
            server_up,
            daemon_up,
            feature_total,
            feature_used,
            feature_available,
            user_licenses,
            feature_location,
            host_licenses,
            location_users,
            cache_entries,
            scrape_duration,
            scrape_errors,
            exposition: RwLock::new(Arc::new(String::new())),
        };
        metrics.refresh_exposition()?;
        Ok(metrics)
    }

    /// Replaces all per-cycle series with the values of `set`.
    ///
    /// Series absent from `set` (users who logged off, renamed features) are
    /// dropped rather than left at their last value.
    pub fn publish(&self, set: &MetricSet) {
        let server = self.server.as_str();
        let vendor = self.vendor.as_str();

        for vec in [
            &self.daemon_up,
            &self.feature_total,
            &self.feature_used,
            &self.feature_available,
            &self.user_licenses,
            &self.feature_location,
            &self.host_licenses,
            &self.location_users,
        ] {
            vec.reset();
        }

        self.server_up
            .with_label_values(&[server])
            .set(i64::from(set.server_up));

        for daemon in &set.daemons {
            self.daemon_up
                .with_label_values(&[server, daemon.name.as_str(), daemon.version.as_str()])
                .set(i64::from(daemon.up));
        }

        for feature in &set.features {
            let labels = [server, vendor, feature.name.as_str()];
            self.feature_total
                .with_label_values(&labels)
                .set(clamp(feature.total));
            self.feature_used
                .with_label_values(&labels)
                .set(clamp(feature.used));
            self.feature_available
                .with_label_values(&labels)
                .set(clamp(feature.available));
        }

        // Same user, host and feature twice adds up instead of overwriting.
        for user in &set.user_licenses {
            self.user_licenses
                .with_label_values(&[
                    server,
                    vendor,
                    user.feature.as_str(),
                    user.username.as_str(),
                    user.hostname.as_str(),
                    user.display.as_str(),
                    user.location.as_str(),
                    user.department.as_str(),
                ])
                .inc();
        }

        for ((feature, location), count) in &set.feature_locations {
            self.feature_location
                .with_label_values(&[server, vendor, feature.as_str(), location.as_str()])
                .set(clamp(*count));
        }
        for ((hostname, location), count) in &set.host_locations {
            self.host_licenses
                .with_label_values(&[server, hostname.as_str(), location.as_str()])
                .set(clamp(*count));
        }
        for (location, count) in &set.location_users {
            self.location_users
                .with_label_values(&[server, location.as_str()])
                .set(clamp(*count));
        }
    }

    /// Marks the server unreachable and counts the failed poll.
    ///
    /// Every other series keeps its last published value.
    pub fn record_failure(&self) {
        self.server_up.with_label_values(&[self.server.as_str()]).set(0);
        self.scrape_errors.inc();
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.scrape_duration.set(elapsed.as_secs_f64());
    }

    pub fn set_cache_entries(&self, entries: usize) {
        self.cache_entries
            .set(i64::try_from(entries).unwrap_or(i64::MAX));
    }

    pub fn scrape_errors(&self) -> u64 {
        self.scrape_errors.get()
    }

    /// Encodes the registry in the text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = String::new();
        encoder.encode_utf8(&families, &mut buffer)?;
        Ok(buffer)
    }

    /// Renders the registry and makes the result the served exposition.
    pub fn refresh_exposition(&self) -> Result<(), MetricsError> {
        let text = Arc::new(self.render()?);
        *self
            .exposition
            .write()
            .unwrap_or_else(PoisonError::into_inner) = text;
        Ok(())
    }

    /// Text rendered at the end of the last poll cycle.
    pub fn exposition(&self) -> Arc<String> {
        self.exposition
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::collector::mock::scenarios;
    use crate::collector::parse_lmstat;
    use crate::model::LocationInfo;

    fn metrics() -> LicenseMetrics {
        LicenseMetrics::new("localhost:27000", "solidworks").unwrap()
    }

    fn typical_set() -> MetricSet {
        aggregate(&parse_lmstat(scenarios::TYPICAL_REPORT), |u| match u {
            "admin" => LocationInfo::new("HQ - Berlin", "IT"),
            _ => LocationInfo::unknown(),
        })
    }

    #[test]
    fn test_publish_renders_expected_series() {
        let m = metrics();
        m.publish(&typical_set());
        let text = m.render().unwrap();

        assert!(text.contains(r#"flexlm_server_up{server="localhost:27000"} 1"#));
        assert!(text.contains(
            r#"flexlm_daemon_up{daemon="SOLIDWORKS",server="localhost:27000",version="11.18.1"} 1"#
        ));
        assert!(text.contains(
            r#"flexlm_feature_total_licenses{feature="SOLIDWORKS",server="localhost:27000",vendor="solidworks"} 10"#
        ));
        assert!(text.contains(
            r#"flexlm_feature_available_licenses{feature="SOLIDWORKS",server="localhost:27000",vendor="solidworks"} 7"#
        ));
        assert!(text.contains(
            r#"flexlm_user_licenses{department="IT",display="PC-ADMIN",feature="SOLIDWORKS",hostname="PC-ADMIN",location="HQ - Berlin",server="localhost:27000",user="admin",vendor="solidworks"} 1"#
        ));
        assert!(text.contains(
            r#"flexlm_host_licenses_total{hostname="WORKSTATION-01",location="Unknown",server="localhost:27000"} 2"#
        ));
        assert!(text.contains(
            r#"flexlm_feature_location_licenses{feature="SOLIDWORKS",location="Unknown",server="localhost:27000",vendor="solidworks"} 2"#
        ));
        assert!(text.contains(
            r#"flexlm_location_users{location="Unknown",server="localhost:27000"} 2"#
        ));
        assert!(text.contains(
            r#"flexlm_location_users{location="HQ - Berlin",server="localhost:27000"} 1"#
        ));
    }

    #[test]
    fn test_publish_drops_stale_series() {
        let m = metrics();
        m.publish(&typical_set());
        m.publish(&aggregate(&parse_lmstat(scenarios::SERVER_DOWN_REPORT), |_| {
            LocationInfo::unknown()
        }));
        let text = m.render().unwrap();

        assert!(text.contains(r#"flexlm_server_up{server="localhost:27000"} 0"#));
        assert!(!text.contains("user=\"admin\""));
        assert!(!text.contains("flexlm_feature_total_licenses{"));
    }

    #[test]
    fn test_failure_keeps_previous_values() {
        let m = metrics();
        m.publish(&typical_set());
        m.record_failure();
        m.record_failure();
        let text = m.render().unwrap();

        assert_eq!(m.scrape_errors(), 2);
        assert!(text.contains(r#"flexlm_server_up{server="localhost:27000"} 0"#));
        assert!(text.contains("flexlm_scrape_errors_total 2"));
        assert!(text.contains("user=\"admin\""));
    }

    #[test]
    fn test_exposition_updates_only_on_refresh() {
        let m = metrics();
        let before = m.exposition();
        assert!(!before.contains("flexlm_server_up{"));

        m.publish(&typical_set());
        assert_eq!(m.exposition(), before);

        m.observe_duration(Duration::from_millis(250));
        m.set_cache_entries(3);
        m.refresh_exposition().unwrap();
        let after = m.exposition();
        assert!(after.contains("flexlm_server_up{"));
        assert!(after.contains("flexlm_scrape_duration_seconds 0.25"));
        assert!(after.contains("flexlm_directory_cache_entries 3"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = metrics();
        let b = metrics();
        a.record_failure();
        assert_eq!(a.scrape_errors(), 1);
        assert_eq!(b.scrape_errors(), 0);
    }
}
