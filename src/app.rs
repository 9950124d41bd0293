//! The main application logic, decoupled from the entry point.

use crate::{
    collectors::{self, Collector, CollectorContext},
    config::{Config, Module},
    identity::{NodeConfig, NodeIdentity},
    internal_metrics::{process::ProcessStats, MetricsBuilder},
    registry::MetricRegistry,
    scheduler::Scheduler,
    sources::{
        cluster::{SwiftInfoClient, UnknownCluster},
        commands::SystemCommands,
        system::HostSystem,
        ClusterInfo, Probes,
    },
    swift::StoragePolicies,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Barrier};
use tracing::{debug, info, instrument, warn};

/// Gauge carrying the exporter version as a label.
pub const SCRIPT_VERSION_FAMILY: &str = "ac_script_version";

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    metrics_addr: SocketAddr,
    registry: Arc<MetricRegistry>,
    identity: Arc<NodeIdentity>,
    disabled_modules: Vec<Module>,
    startup_barrier: Option<Arc<Barrier>>,
}

impl App {
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address `/metrics` is actually served on.
    pub fn metrics_addr(&self) -> SocketAddr {
        self.metrics_addr
    }

    pub fn registry(&self) -> Arc<MetricRegistry> {
        self.registry.clone()
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Modules switched off at startup because their input files were missing.
    pub fn disabled_modules(&self) -> &[Module] {
        &self.disabled_modules
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        if let Some(barrier) = &self.startup_barrier {
            barrier.wait().await;
        }

        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        if !*shutdown_rx.borrow_and_update() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        let panicked = self.task_manager.shutdown().await;
        if !panicked.is_empty() {
            anyhow::bail!("tasks panicked during shutdown: {}", panicked.join(", "));
        }
        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Tests use the overrides to swap the host-backed collaborators for fakes
/// and to run a reduced set of collectors.
pub struct AppBuilder {
    config: Config,
    probes_override: Option<Probes>,
    collectors_override: Option<Vec<Arc<dyn Collector>>>,
    startup_barrier: Option<Arc<Barrier>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            probes_override: None,
            collectors_override: None,
            startup_barrier: None,
        }
    }

    /// Overrides every collaborator for testing.
    pub fn probes_override(mut self, probes: Probes) -> Self {
        self.probes_override = Some(probes);
        self
    }

    /// Overrides the collector set for testing.
    pub fn collectors_override(mut self, collectors: Vec<Arc<dyn Collector>>) -> Self {
        self.collectors_override = Some(collectors);
        self
    }

    pub fn startup_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.startup_barrier = Some(barrier);
        self
    }

    /// Builds and starts all application components, returning a runnable `App`.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let mut config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Startup sanity check and metric families
        // =========================================================================
        let disabled_modules = config.disable_missing_prerequisites();
        let config = Arc::new(config);

        let registry = Arc::new(MetricRegistry::new());
        let collectors = self.collectors_override.unwrap_or_else(collectors::all);
        collectors::register_all(&registry, &collectors).context("failed to register metric families")?;
        registry
            .register(
                SCRIPT_VERSION_FAMILY,
                "Version of the exporter, carried in the script_version label.",
                &["script_version"],
            )
            .context("failed to register metric families")?;
        registry.set(SCRIPT_VERSION_FAMILY, &[env!("CARGO_PKG_VERSION")], 0.0)?;

        // =========================================================================
        // 2. Node identity, collaborators and storage policies
        // =========================================================================
        let node = match NodeConfig::load(&config.node_config_file).await {
            Ok(node) => Some(node),
            Err(e) => {
                warn!(path = %config.node_config_file.display(), error = %e, "Node configuration unavailable");
                None
            }
        };
        let probes = match self.probes_override {
            Some(probes) => probes,
            None => host_probes(&config, node.as_ref()),
        };
        let identity = Arc::new(NodeIdentity::resolve(node.as_ref(), probes.hostname.as_ref()).await);
        info!(fqdn = %identity.fqdn, uuid = %identity.uuid, "Node identity resolved");

        let policies = match StoragePolicies::load(&config.swift_config_file).await {
            Ok(policies) => policies,
            Err(e) => {
                debug!(path = %config.swift_config_file.display(), error = %e, "No storage policies loaded");
                StoragePolicies::default()
            }
        };
        info!(policies = policies.len(), "Storage policies loaded");

        // =========================================================================
        // 3. Metrics endpoint
        // =========================================================================
        let (server, metrics_addr, recording) = MetricsBuilder::new(config.listen_address, config.self_metrics)
            .build(registry.clone(), task_manager.get_shutdown_rx())?;
        task_manager.spawn("metrics_server", server.run());
        if recording {
            task_manager.spawn("process_stats", ProcessStats::new().run(task_manager.get_shutdown_rx()));
        }

        // =========================================================================
        // 4. Collection tasks
        // =========================================================================
        let ctx = CollectorContext {
            registry: registry.clone(),
            identity: identity.clone(),
            config: config.clone(),
            probes,
            policies: Arc::new(policies),
        };
        Scheduler::new(ctx, collectors).spawn(&task_manager);

        info!(addr = %metrics_addr, tasks = ?task_manager.task_names(), "Exporter initialized");

        Ok(App {
            task_manager,
            metrics_addr,
            registry,
            identity,
            disabled_modules,
            startup_barrier: self.startup_barrier,
        })
    }
}

/// Collaborators backed by the running host.
fn host_probes(config: &Config, node: Option<&NodeConfig>) -> Probes {
    let commands = Arc::new(SystemCommands::new(config.collector_timeout()));
    let cluster: Arc<dyn ClusterInfo> = match node.and_then(NodeConfig::info_url) {
        Some(url) => match SwiftInfoClient::new(url, config.collector_timeout()) {
            Ok(client) => {
                info!(url = client.url(), "Swift version will be read from the proxy");
                Arc::new(client)
            }
            Err(e) => {
                warn!(error = %e, "Failed to build /info client, Swift version unknown");
                Arc::new(UnknownCluster)
            }
        },
        None => {
            warn!("No proxy address in node configuration, Swift version unknown");
            Arc::new(UnknownCluster)
        }
    };

    Probes {
        system: Arc::new(HostSystem::new()),
        disk_usage: commands.clone(),
        drive_health: commands.clone(),
        services: commands.clone(),
        hostname: commands,
        cluster,
    }
}
