//! flexlm-core: license usage collection for FlexLM servers.
//!
//! Provides:
//! - `collector`: `lmutil` invocation and `lmstat -a` report parsing
//! - `model`: parsed report data (daemons, features, checkouts)
//! - `directory`: user location lookup (directory backends, resolvers)
//! - `cache`: TTL cache in front of directory lookups
//! - `aggregate`: per-cycle rollups by feature, host and location
//! - `metrics`: Prometheus registry and text exposition
//! - `poller`: one complete poll cycle tying the above together

pub mod aggregate;
pub mod cache;
pub mod collector;
pub mod directory;
pub mod metrics;
pub mod model;
pub mod poller;

pub use aggregate::{MetricSet, aggregate};
pub use cache::LookupCache;
pub use metrics::{LicenseMetrics, MetricsError};
pub use model::{LocationInfo, Snapshot};
pub use poller::{PollError, PollSummary, Poller, PollerConfig};
