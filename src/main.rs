use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use turnstile::config::{LoggingConfig, TurnstileConfig};
use turnstile::ratelimit::{AdmissionControl, KeyedLimiter, SystemClock, TokenBucket};
use turnstile::workload::{run_workload, SHARED_KEY};

/// Drive a pool of concurrent workers through a token bucket.
#[derive(Parser, Debug)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "TURNSTILE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(long, env = "TURNSTILE_WORKERS")]
    workers: Option<usize>,

    /// Admission checks per worker
    #[arg(long, env = "TURNSTILE_REQUESTS")]
    requests: Option<usize>,

    /// Pause between a worker's requests in milliseconds
    #[arg(long, env = "TURNSTILE_PAUSE_MS")]
    pause_ms: Option<u64>,

    /// Bucket capacity for the default rule
    #[arg(long, env = "TURNSTILE_CAPACITY")]
    capacity: Option<u64>,

    /// Tokens added per refill interval for the default rule
    #[arg(long, env = "TURNSTILE_REFILL_RATE")]
    refill_rate: Option<u64>,

    /// Refill interval in milliseconds for the default rule
    #[arg(long, env = "TURNSTILE_REFILL_INTERVAL_MS")]
    refill_interval_ms: Option<u64>,

    /// Give each worker its own bucket
    #[arg(long, env = "TURNSTILE_PER_WORKER_KEYS")]
    per_worker_keys: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "TURNSTILE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "TURNSTILE_JSON_LOGS")]
    json_logs: bool,
}

impl Args {
    fn apply(&self, config: &mut TurnstileConfig) {
        let rule = &mut config.rate_limiting.default;
        if let Some(capacity) = self.capacity {
            rule.capacity = capacity;
        }
        if let Some(refill_rate) = self.refill_rate {
            rule.refill_rate = refill_rate;
        }
        if let Some(refill_interval_ms) = self.refill_interval_ms {
            rule.refill_interval_ms = refill_interval_ms;
        }

        let workload = &mut config.workload;
        if let Some(workers) = self.workers {
            workload.workers = workers;
        }
        if let Some(requests) = self.requests {
            workload.requests_per_worker = requests;
        }
        if let Some(pause_ms) = self.pause_ms {
            workload.pause_ms = pause_ms;
        }
        workload.per_worker_keys |= self.per_worker_keys;

        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        config.logging.json |= self.json_logs;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TurnstileConfig::from_file(path)?,
        None => TurnstileConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging);

    info!("Starting turnstile");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        info!(path = %path.display(), "Configuration file read");
    }

    let rule = &config.rate_limiting.default;
    info!(
        capacity = rule.capacity,
        refill_rate = rule.refill_rate,
        refill_interval_ms = rule.refill_interval_ms,
        overrides = config.rate_limiting.keys.len(),
        "Configuration loaded"
    );

    let limiter = build_limiter(&config)?;

    info!(
        workers = config.workload.workers,
        requests_per_worker = config.workload.requests_per_worker,
        pause_ms = config.workload.pause_ms,
        per_worker_keys = config.workload.per_worker_keys,
        "Starting workload"
    );

    tokio::select! {
        report = run_workload(limiter, &config.workload) => {
            info!(
                allowed = report.allowed,
                denied = report.denied,
                total = report.total(),
                "Workload finished"
            );
        }
        _ = shutdown_signal() => {
            warn!("Workload interrupted before completion");
        }
    }

    info!("turnstile stopped");
    Ok(())
}

/// One bucket per worker key, or a single bucket every worker shares.
///
/// The shared bucket uses the `shared` key's override when the rules have one.
fn build_limiter(
    config: &TurnstileConfig,
) -> turnstile::error::Result<Arc<dyn AdmissionControl>> {
    if config.workload.per_worker_keys {
        Ok(Arc::new(KeyedLimiter::new(&config.rate_limiting)?))
    } else {
        let limits = config.rate_limiting.limits_for(SHARED_KEY)?;
        Ok(Arc::new(TokenBucket::from_limits(limits, SystemClock::new())))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
