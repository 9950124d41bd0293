//! # Internal Metrics Module
//!
//! The exporter's own operational metrics, kept apart from the Swift gauges in
//! the [`MetricRegistry`](crate::registry::MetricRegistry).
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: installs the Prometheus recorder (when enabled),
//!   binds the listener and constructs the `MetricsServer`.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) the `axum` server behind
//!   `GET /metrics`.
//!
//! - **`ProcessStats`**: (Defined in `process.rs`) a background task that
//!   samples the exporter's own CPU and memory usage.

use crate::collectors::Outcome;
use crate::internal_metrics::server::MetricsServer;
use crate::registry::MetricRegistry;
use anyhow::{Context, Result};
use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub mod process;
pub mod server;

pub const COLLECTOR_RUNS: &str = "swift_exporter_collector_runs_total";
pub const COLLECTOR_DURATION: &str = "swift_exporter_collector_duration_seconds";
pub const SCRAPES: &str = "swift_exporter_scrapes_total";
pub const PROCESS_CPU: &str = "swift_exporter_process_cpu_usage_percent";
pub const PROCESS_MEMORY: &str = "swift_exporter_process_memory_usage_bytes";

const DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// The global recorder can only be installed once per process; every later
/// build reuses the first handle.
static RECORDER: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

fn describe() {
    metrics::describe_counter!(COLLECTOR_RUNS, Unit::Count, "Collector invocations, labeled by outcome.");
    metrics::describe_histogram!(COLLECTOR_DURATION, Unit::Seconds, "Wall time of each collector invocation.");
    metrics::describe_counter!(SCRAPES, Unit::Count, "Requests served on /metrics.");
    metrics::describe_gauge!(PROCESS_CPU, Unit::Percent, "CPU usage of the exporter process.");
    metrics::describe_gauge!(PROCESS_MEMORY, Unit::Bytes, "Resident memory of the exporter process.");
}

/// Installs the Prometheus recorder. Failures are logged and self-metrics are
/// simply left out of the scrape.
pub fn install_recorder() -> Option<PrometheusHandle> {
    RECORDER
        .get_or_init(|| {
            let builder = match PrometheusBuilder::new()
                .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), DURATION_BUCKETS)
            {
                Ok(builder) => builder,
                Err(e) => {
                    warn!(error = %e, "Invalid self-metrics buckets, self-metrics disabled");
                    return None;
                }
            };
            let recorder = builder.build_recorder();
            let handle = recorder.handle();
            if let Err(e) = metrics::set_global_recorder(recorder) {
                warn!(error = %e, "Failed to install Prometheus recorder, self-metrics disabled");
                return None;
            }
            describe();
            Some(handle)
        })
        .clone()
}

pub fn record_collector_run(collector: &'static str, outcome: Outcome, elapsed: Duration) {
    metrics::counter!(COLLECTOR_RUNS, "collector" => collector, "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!(COLLECTOR_DURATION, "collector" => collector).record(elapsed.as_secs_f64());
}

pub fn record_scrape() {
    metrics::counter!(SCRAPES).increment(1);
}

/// Builder for the `/metrics` endpoint.
pub struct MetricsBuilder {
    listen_address: SocketAddr,
    self_metrics: bool,
}

impl MetricsBuilder {
    pub fn new(listen_address: SocketAddr, self_metrics: bool) -> Self {
        Self {
            listen_address,
            self_metrics,
        }
    }

    /// Binds the listener and returns the server with the address it actually
    /// bound (useful when the configured port is 0). Also returns whether
    /// self-metrics are being recorded.
    pub fn build(
        self,
        registry: Arc<MetricRegistry>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(MetricsServer, SocketAddr, bool)> {
        let listener = std::net::TcpListener::bind(self.listen_address)
            .with_context(|| format!("failed to bind metrics server to {}", self.listen_address))?;
        let addr = listener
            .local_addr()
            .context("failed to get local address for metrics server")?;
        listener
            .set_nonblocking(true)
            .context("failed to make metrics listener non-blocking")?;
        let listener = TcpListener::from_std(listener).context("failed to register metrics listener")?;

        let handle = if self.self_metrics {
            install_recorder()
        } else {
            None
        };
        let recording = handle.is_some();
        info!(%addr, self_metrics = recording, "Metrics endpoint bound");

        Ok((MetricsServer::new(listener, registry, handle, shutdown_rx), addr, recording))
    }
}
