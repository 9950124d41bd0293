#![allow(dead_code)]
//! Test helpers for running the full application instance.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use swift_exporter::{
    app::AppBuilder,
    collectors::Collector,
    config::Config,
    registry::MetricRegistry,
    sources::{fake::FakeProbes, ClusterInfo},
};
use tokio::{sync::watch, task::JoinHandle, time::timeout};

/// A running instance of the application.
pub struct TestApp {
    pub shutdown_tx: watch::Sender<bool>,
    pub app_handle: Option<JoinHandle<Result<()>>>,
    pub registry: Arc<MetricRegistry>,
    pub fakes: FakeProbes,
    metrics_addr: SocketAddr,
}

impl TestApp {
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    pub fn metrics_url(&self) -> String {
        format!("http://{}/metrics", self.metrics_addr)
    }

    pub async fn scrape(&self) -> Result<reqwest::Response> {
        Ok(reqwest::get(self.metrics_url()).await?)
    }

    pub async fn scrape_body(&self) -> Result<String> {
        Ok(self.scrape().await?.error_for_status()?.text().await?)
    }

    /// Polls the registry until the series has a value.
    pub async fn wait_for(&self, family: &str, labels: &[&str], within: Duration) -> Option<f64> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if let Some(value) = self.registry.snapshot().value(family, labels) {
                return Some(value);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Shuts down the application and waits for it to terminate.
    /// Fails if the application does not shut down within the specified timeout.
    pub async fn shutdown(self, timeout_duration: Duration) -> Result<()> {
        self.shutdown_tx.send(true)?;
        if let Some(handle) = self.app_handle {
            match timeout(timeout_duration, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!("App failed to shut down within the timeout")),
            }
        } else {
            Ok(())
        }
    }
}

/// A builder for creating `TestApp` instances over fake collaborators.
pub struct TestAppBuilder {
    pub config: Config,
    pub fakes: FakeProbes,
    collectors: Option<Vec<Arc<dyn Collector>>>,
    cluster: Option<Arc<dyn ClusterInfo>>,
}

impl TestAppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            fakes: FakeProbes::new(),
            collectors: None,
            cluster: None,
        }
    }

    pub fn with_config_modifier(mut self, modifier: impl FnOnce(&mut Config)) -> Self {
        modifier(&mut self.config);
        self
    }

    /// Configures the fakes before the app starts.
    pub fn with_fakes(self, setup: impl FnOnce(&FakeProbes)) -> Self {
        setup(&self.fakes);
        self
    }

    pub fn with_collectors(mut self, collectors: Vec<Arc<dyn Collector>>) -> Self {
        self.collectors = Some(collectors);
        self
    }

    /// Replaces the fake cluster with a real client.
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterInfo>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Builds the application and spawns its run loop.
    pub async fn build(self) -> Result<TestApp> {
        let mut probes = self.fakes.probes();
        if let Some(cluster) = self.cluster {
            probes.cluster = cluster;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut builder = AppBuilder::new(self.config).probes_override(probes);
        if let Some(collectors) = self.collectors {
            builder = builder.collectors_override(collectors);
        }
        let app = builder.build(shutdown_rx).await?;

        let registry = app.registry();
        let metrics_addr = app.metrics_addr();
        let app_handle = tokio::spawn(app.run());

        Ok(TestApp {
            shutdown_tx,
            app_handle: Some(app_handle),
            registry,
            fakes: self.fakes,
            metrics_addr,
        })
    }
}
