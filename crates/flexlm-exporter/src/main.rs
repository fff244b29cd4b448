mod background;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

use flexlm_core::cache::DEFAULT_TTL;
use flexlm_core::collector::{DEFAULT_COMMAND_TIMEOUT, ProcessRunner, parse_lmstat};
use flexlm_core::directory::{
    CommandDirectory, DirectoryResolver, LocationResolver, NoopResolver, detect_domain_from_env,
};
use flexlm_core::poller::{
    DEFAULT_RESOLVE_BUDGET, DEFAULT_RESOLVE_CONCURRENCY, DEFAULT_RESOLVE_TIMEOUT,
};
use flexlm_core::{LicenseMetrics, LocationInfo, LookupCache, Poller, PollerConfig};

use state::AppState;

// ============================================================
// CLI
// ============================================================

#[derive(Parser, Debug)]
#[command(
    name = "flexlm-exporter",
    about = "Prometheus exporter for FlexLM license usage",
    version
)]
struct Args {
    /// License server host name.
    #[arg(long, default_value = "localhost", env = "FLEXLM_SERVER")]
    license_server: String,

    /// License server port.
    #[arg(long, default_value_t = 27000, env = "FLEXLM_PORT")]
    license_port: u16,

    /// HTTP listen address for /metrics and /health.
    #[arg(long, default_value = "0.0.0.0:9090", env = "FLEXLM_LISTEN")]
    listen: String,

    /// Path to the lmutil executable.
    #[arg(long, default_value = "lmutil", env = "FLEXLM_LMUTIL_PATH")]
    lmutil_path: String,

    /// Vendor label attached to feature metrics.
    #[arg(long, default_value = "solidworks", env = "FLEXLM_VENDOR")]
    vendor: String,

    /// Poll interval in seconds.
    #[arg(long, default_value_t = 30, env = "FLEXLM_INTERVAL")]
    interval: u64,

    /// Upper bound for one lmutil run, in seconds.
    #[arg(
        long,
        default_value_t = DEFAULT_COMMAND_TIMEOUT.as_secs(),
        env = "FLEXLM_COMMAND_TIMEOUT"
    )]
    command_timeout: u64,

    /// Location cache time-to-live in seconds.
    #[arg(long, default_value_t = DEFAULT_TTL.as_secs(), env = "FLEXLM_CACHE_TTL")]
    cache_ttl: u64,

    /// Upper bound for one directory lookup, in seconds.
    #[arg(
        long,
        default_value_t = DEFAULT_RESOLVE_TIMEOUT.as_secs(),
        env = "FLEXLM_RESOLVE_TIMEOUT"
    )]
    resolve_timeout: u64,

    /// Directory lookups in flight at once.
    #[arg(
        long,
        default_value_t = DEFAULT_RESOLVE_CONCURRENCY,
        env = "FLEXLM_RESOLVE_CONCURRENCY"
    )]
    resolve_concurrency: usize,

    /// Upper bound for all directory lookups of one poll, in seconds.
    #[arg(
        long,
        default_value_t = DEFAULT_RESOLVE_BUDGET.as_secs(),
        env = "FLEXLM_RESOLVE_BUDGET"
    )]
    resolve_budget: u64,

    /// Force directory lookups on.
    #[arg(long, conflicts_with = "disable_ad")]
    enable_ad: bool,

    /// Force directory lookups off.
    #[arg(long)]
    disable_ad: bool,

    /// Helper run as `<program> <username>` that prints `key: value` user attributes.
    #[arg(long, env = "FLEXLM_DIRECTORY_COMMAND")]
    directory_command: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Poll once, print the exposition to stdout and exit.
    #[arg(long, conflicts_with = "parse_file")]
    once: bool,

    /// Parse a saved lmstat report, print it as JSON and exit.
    #[arg(long, value_name = "FILE")]
    parse_file: Option<PathBuf>,
}

/// How directory lookups were requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectoryMode {
    Enabled,
    Disabled,
    Auto,
}

impl DirectoryMode {
    fn from_args(args: &Args) -> Self {
        if args.enable_ad {
            DirectoryMode::Enabled
        } else if args.disable_ad {
            DirectoryMode::Disabled
        } else {
            DirectoryMode::Auto
        }
    }

    /// Whether lookups run, given the result of domain detection.
    fn lookups_enabled(self, in_domain: impl FnOnce() -> bool) -> bool {
        match self {
            DirectoryMode::Enabled => true,
            DirectoryMode::Disabled => false,
            DirectoryMode::Auto => in_domain(),
        }
    }
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Some(ref path) = args.parse_file {
        process::exit(parse_file(path));
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };
    process::exit(runtime.block_on(async_main(args)));
}

/// Initializes the tracing subscriber. Logs go to stderr.
/// Default level is INFO; `-q` keeps errors only.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["flexlm_exporter", "flexlm_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse::<Directive>() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `--parse-file`: dumps the parsed report as JSON.
fn parse_file(path: &Path) -> i32 {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read report");
            return 1;
        }
    };
    let snapshot = parse_lmstat(&text);
    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            error!(error = %e, "failed to serialize snapshot");
            1
        }
    }
}

fn build_resolver(args: &Args, mode: DirectoryMode) -> Arc<dyn LocationResolver> {
    if !mode.lookups_enabled(detect_domain_from_env) {
        info!(?mode, "directory lookups disabled, locations will be Unknown");
        return Arc::new(NoopResolver);
    }
    match args.directory_command {
        Some(ref program) => {
            let directory =
                CommandDirectory::new(program.clone(), Duration::from_secs(args.resolve_timeout));
            if !directory.is_runnable() {
                warn!(
                    program = %directory.program(),
                    "directory helper not found or not executable, locations will be Unknown"
                );
                return Arc::new(NoopResolver);
            }
            info!(program = %directory.program(), "directory lookups enabled");
            Arc::new(DirectoryResolver::new(directory))
        }
        None => {
            warn!("directory lookups requested but --directory-command is not set");
            Arc::new(NoopResolver)
        }
    }
}

async fn async_main(args: Args) -> i32 {
    info!(version = env!("CARGO_PKG_VERSION"), "flexlm-exporter starting");

    let config = PollerConfig {
        resolve_timeout: Duration::from_secs(args.resolve_timeout),
        resolve_concurrency: args.resolve_concurrency,
        resolve_budget: Duration::from_secs(args.resolve_budget),
        ..PollerConfig::new(args.license_server.clone(), args.license_port)
    };

    let metrics = match LicenseMetrics::new(config.server_label(), args.vendor.clone()) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            error!(error = %e, "failed to register metrics");
            return 1;
        }
    };

    let resolver = build_resolver(&args, DirectoryMode::from_args(&args));
    let cache = if resolver.is_enabled() {
        LookupCache::new(Duration::from_secs(args.cache_ttl), LocationInfo::unknown())
    } else {
        LookupCache::disabled(LocationInfo::unknown())
    };

    let runner = ProcessRunner::new(args.lmutil_path.clone())
        .with_timeout(Duration::from_secs(args.command_timeout));
    let poller = Arc::new(Poller::new(
        &config,
        Arc::new(runner),
        resolver,
        Arc::new(cache),
        metrics.clone(),
    ));

    if args.once {
        return match poller.poll_once().await {
            Ok(_) => {
                print!("{}", metrics.exposition());
                0
            }
            Err(_) => 1,
        };
    }

    info!(
        server = %config.server_label(),
        lmutil = %args.lmutil_path,
        interval_s = args.interval,
        "config"
    );

    // Graceful shutdown
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        token.cancel();
    }) {
        warn!(error = %e, "failed to set Ctrl-C handler");
    }

    let interval = Duration::from_secs(args.interval.max(1));
    let poll_task = tokio::spawn(background::tick_loop(poller, interval, shutdown.clone()));

    let addr: SocketAddr = match args.listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(listen = %args.listen, error = %e, "invalid listen address");
            shutdown.cancel();
            return 1;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            shutdown.cancel();
            return 1;
        }
    };
    info!(%addr, "listening");

    let app = handlers::router(AppState::new(metrics));
    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await;

    shutdown.cancel();
    if let Err(e) = poll_task.await {
        error!(error = %e, "poll loop panicked");
    }

    match served {
        Ok(()) => {
            info!("shutdown complete");
            0
        }
        Err(e) => {
            error!(error = %e, "server error");
            1
        }
    }
}
