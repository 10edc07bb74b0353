//! Concurrent worker pool that drives a limiter.
//!
//! Each worker makes a fixed number of admission checks, pausing between them,
//! and counts how many were allowed. Denied requests are logged and dropped;
//! nothing is retried.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::WorkloadConfig;
use crate::ratelimit::AdmissionControl;

/// Key used by every worker when buckets are shared.
pub const SHARED_KEY: &str = "shared";

/// Totals from a workload run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadReport {
    /// Requests that were admitted
    pub allowed: u64,
    /// Requests that were rate limited
    pub denied: u64,
}

impl WorkloadReport {
    /// Total requests made.
    pub fn total(&self) -> u64 {
        self.allowed + self.denied
    }

    fn merge(&mut self, other: WorkloadReport) {
        self.allowed += other.allowed;
        self.denied += other.denied;
    }
}

/// The admission key a worker uses.
pub fn worker_key(config: &WorkloadConfig, worker: usize) -> String {
    if config.per_worker_keys {
        format!("worker-{}", worker)
    } else {
        SHARED_KEY.to_string()
    }
}

/// Run `config.workers` concurrent workers against the limiter.
///
/// Workers are numbered from 1. Dropping the returned future aborts any
/// workers still running.
pub async fn run_workload(
    limiter: Arc<dyn AdmissionControl>,
    config: &WorkloadConfig,
) -> WorkloadReport {
    let mut workers = JoinSet::new();

    for worker in 1..=config.workers {
        let limiter = Arc::clone(&limiter);
        let key = worker_key(config, worker);
        let requests = config.requests_per_worker;
        let pause = config.pause();

        workers.spawn(async move {
            run_worker(worker, &key, limiter.as_ref(), requests, pause).await
        });
    }

    let mut report = WorkloadReport::default();
    while let Some(result) = workers.join_next().await {
        match result {
            Ok(worker_report) => report.merge(worker_report),
            Err(e) => warn!(error = %e, "Worker task failed"),
        }
    }

    report
}

async fn run_worker(
    worker: usize,
    key: &str,
    limiter: &dyn AdmissionControl,
    requests: usize,
    pause: Duration,
) -> WorkloadReport {
    let mut report = WorkloadReport::default();

    for request in 1..=requests {
        if limiter.try_admit(key, 1) {
            report.allowed += 1;
            info!(worker = worker, request = request, key = %key, "Request allowed");
        } else {
            report.denied += 1;
            info!(worker = worker, request = request, key = %key, "Request denied (rate limited)");
        }

        if request < requests && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    report
}
