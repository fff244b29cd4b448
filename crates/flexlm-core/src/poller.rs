//! One poll cycle: run `lmstat`, parse, resolve locations, publish.
//!
//! The periodic schedule lives with the caller; [`Poller::poll_once`] is a
//! single self-contained cycle so it can be driven by a tick loop, by a
//! one-shot CLI mode, or directly from tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, warn};

use crate::aggregate::aggregate;
use crate::cache::LookupCache;
use crate::collector::{CommandError, LmutilRunner, lmstat_args, parse_lmstat};
use crate::directory::{DirectoryError, LocationResolver};
use crate::metrics::LicenseMetrics;
use crate::model::{LocationInfo, Snapshot};

/// Default upper bound for one directory lookup.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of directory lookups in flight at once.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 8;

/// Default upper bound for all directory lookups of one cycle.
pub const DEFAULT_RESOLVE_BUDGET: Duration = Duration::from_secs(20);

/// Error type for a failed poll cycle.
#[derive(Debug)]
pub enum PollError {
    /// `lmutil` could not be run or timed out.
    Command(CommandError),
    /// `lmutil` ran and exited non-zero.
    ExitStatus { code: i32, stderr: String },
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::Command(e) => write!(f, "{}", e),
            PollError::ExitStatus { code, stderr } => {
                write!(f, "lmutil exited with code {}", code)?;
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Command(e) => Some(e),
            PollError::ExitStatus { .. } => None,
        }
    }
}

impl From<CommandError> for PollError {
    fn from(e: CommandError) -> Self {
        PollError::Command(e)
    }
}

/// What a successful cycle published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub server_up: bool,
    pub features: usize,
    pub checkouts: usize,
    pub users: usize,
}

/// Connection and lookup settings for a [`Poller`].
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub host: String,
    pub port: u16,
    pub resolve_timeout: Duration,
    pub resolve_concurrency: usize,
    /// Wall-clock ceiling for the lookups of one cycle. Users still pending
    /// when it runs out are published as `Unknown`.
    pub resolve_budget: Duration,
}

impl PollerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            resolve_concurrency: DEFAULT_RESOLVE_CONCURRENCY,
            resolve_budget: DEFAULT_RESOLVE_BUDGET,
        }
    }

    /// `host:port`, the `server` label value.
    pub fn server_label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct Poller {
    runner: Arc<dyn LmutilRunner>,
    resolver: Arc<dyn LocationResolver>,
    cache: Arc<LookupCache<LocationInfo>>,
    metrics: Arc<LicenseMetrics>,
    args: Vec<String>,
    resolve_timeout: Duration,
    resolve_concurrency: usize,
    resolve_budget: Duration,
    /// Cleared for good once the directory reports itself unavailable.
    directory_available: Arc<AtomicBool>,
}

type Lookup = BoxFuture<'static, (String, LocationInfo)>;

impl Poller {
    pub fn new(
        config: &PollerConfig,
        runner: Arc<dyn LmutilRunner>,
        resolver: Arc<dyn LocationResolver>,
        cache: Arc<LookupCache<LocationInfo>>,
        metrics: Arc<LicenseMetrics>,
    ) -> Self {
        Self {
            runner,
            resolver,
            cache,
            metrics,
            args: lmstat_args(&config.host, config.port),
            resolve_timeout: config.resolve_timeout,
            resolve_concurrency: config.resolve_concurrency.max(1),
            resolve_budget: config.resolve_budget,
            directory_available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn metrics(&self) -> &Arc<LicenseMetrics> {
        &self.metrics
    }

    /// Runs one cycle and refreshes the served exposition.
    ///
    /// On failure the server is marked down and the error counter increases;
    /// all other series keep the values of the last good cycle.
    pub async fn poll_once(&self) -> Result<PollSummary, PollError> {
        let started = Instant::now();
        let result = self.collect().await;

        if let Err(ref e) = result {
            error!(error = %e, "license server poll failed");
            self.metrics.record_failure();
        }
        self.metrics.observe_duration(started.elapsed());
        self.metrics.set_cache_entries(self.cache.len());
        if let Err(e) = self.metrics.refresh_exposition() {
            error!(error = %e, "failed to render metrics");
        }
        result
    }

    /// Runs `lmstat` and parses its output without publishing anything.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, PollError> {
        let output = self.runner.run(&self.args).await?;
        if !output.success() {
            return Err(PollError::ExitStatus {
                code: output.exit_code,
                stderr: output.stderr,
            });
        }
        if !output.stderr.trim().is_empty() {
            debug!(stderr = %output.stderr.trim(), "lmutil wrote to stderr");
        }
        Ok(parse_lmstat(&output.stdout))
    }

    async fn collect(&self) -> Result<PollSummary, PollError> {
        let snapshot = self.fetch_snapshot().await?;
        if !snapshot.server_up {
            warn!("license server reported down");
        }

        let locations = self.resolve_users(&snapshot).await;
        let set = aggregate(&snapshot, |username| {
            locations.get(username).cloned().unwrap_or_default()
        });
        self.metrics.publish(&set);

        let purged = self.cache.purge_expired();
        if purged > 0 {
            debug!(purged, "expired location cache entries");
        }

        Ok(PollSummary {
            server_up: set.server_up,
            features: set.features.len(),
            checkouts: set.user_licenses.len(),
            users: set.location_users.values().sum::<u64>() as usize,
        })
    }

    /// Whether this cycle should ask the directory at all.
    pub fn lookups_enabled(&self) -> bool {
        self.resolver.is_enabled() && self.directory_available.load(Ordering::SeqCst)
    }

    /// Looks up every distinct username through the cache.
    ///
    /// Each lookup is bounded by the resolve timeout and the whole batch by
    /// the resolve budget. A slow or failing directory yields
    /// [`LocationInfo::unknown`] for the affected users.
    async fn resolve_users(&self, snapshot: &Snapshot) -> HashMap<String, LocationInfo> {
        let usernames: BTreeSet<String> = snapshot
            .features
            .iter()
            .flat_map(|f| f.users.iter())
            .map(|u| u.username.clone())
            .collect();

        if !self.lookups_enabled() {
            return usernames
                .into_iter()
                .map(|u| (u, LocationInfo::unknown()))
                .collect();
        }

        let total = usernames.len();
        let lookups: Vec<Lookup> = usernames
            .into_iter()
            .map(|username| self.lookup(username))
            .collect();
        let mut pending = stream::iter(lookups).buffer_unordered(self.resolve_concurrency);

        let mut resolved = HashMap::with_capacity(total);
        let deadline = tokio::time::sleep(self.resolve_budget);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((username, info)) => {
                        resolved.insert(username, info);
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(
                        resolved = resolved.len(),
                        unresolved = total - resolved.len(),
                        budget_ms = self.resolve_budget.as_millis() as u64,
                        "location lookups ran out of time, rest published as Unknown"
                    );
                    break;
                }
            }
        }
        resolved
    }

    /// One cached, time-bounded lookup that owns everything it touches.
    fn lookup(&self, username: String) -> Lookup {
        let cache = Arc::clone(&self.cache);
        let resolver = Arc::clone(&self.resolver);
        let available = Arc::clone(&self.directory_available);
        let timeout = self.resolve_timeout;

        async move {
            let info = cache
                .get_async(&username, move |name| async move {
                    if !available.load(Ordering::SeqCst) {
                        return Err(DirectoryError::Unavailable("disabled earlier".to_string()));
                    }
                    let result = tokio::time::timeout(timeout, resolver.resolve(&name))
                        .await
                        .unwrap_or_else(|_| Err(DirectoryError::Timeout(timeout)));
                    if let Err(DirectoryError::Unavailable(ref reason)) = result {
                        if available.swap(false, Ordering::SeqCst) {
                            warn!(%reason, "directory unavailable, disabling location lookups");
                        }
                    }
                    result
                })
                .await;
            (username, info)
        }
        .boxed()
    }
}
