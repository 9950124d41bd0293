//! # Metrics Server
//!
//! Serves `GET /metrics`: the registry snapshot in text exposition format,
//! followed by the exporter's own metrics when they are recorded. Every other
//! path is a 404. Collection errors never surface here; a scrape always
//! returns whatever is currently stored.

use crate::internal_metrics::record_scrape;
use crate::registry::{MetricRegistry, CONTENT_TYPE};
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, trace};

#[derive(Clone)]
struct ServerState {
    registry: Arc<MetricRegistry>,
    self_metrics: Option<PrometheusHandle>,
}

async fn render_metrics(State(state): State<ServerState>) -> impl IntoResponse {
    record_scrape();
    let mut body = state.registry.render();
    if let Some(handle) = &state.self_metrics {
        body.push_str(&handle.render());
    }
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body)
}

pub fn router(registry: Arc<MetricRegistry>, self_metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(ServerState { registry, self_metrics })
}

/// The `/metrics` server, bound but not yet running.
pub struct MetricsServer {
    listener: TcpListener,
    app: Router,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    pub fn new(
        listener: TcpListener,
        registry: Arc<MetricRegistry>,
        self_metrics: Option<PrometheusHandle>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            app: router(registry, self_metrics),
            shutdown_rx,
        }
    }

    /// Returns a future that runs the server until a shutdown signal is received.
    pub fn run(mut self) -> impl Future<Output = ()> {
        async move {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    trace!("Metrics server received shutdown signal via select.");
                }
                result = axum::serve(self.listener, self.app.into_make_service()) => {
                    if let Err(e) = result {
                        error!(error = %e, "Metrics server error");
                    }
                }
            }
            trace!("Metrics server task finished.");
        }
    }
}
