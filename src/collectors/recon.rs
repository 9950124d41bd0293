//! Account, container and object recon snapshots.

use super::{Collector, CollectorContext, CollectorError, FamilySpec};
use crate::config::Module;
use crate::swift::recon::{AccountRecon, ContainerRecon, ObjectRecon, ServerSeries};
use crate::swift::{ReconCapabilities, SwiftVersion};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

const SERVER_LABELS: &[&str] = &["service_name", "metrics_name", "FQDN", "UUID"];

static ACCOUNT_FAMILIES: &[FamilySpec] = &[
    FamilySpec::new("account_server", "Account server statistics from account.recon.", SERVER_LABELS),
    FamilySpec::new(
        "swift_account_replication_estimate",
        "Estimated account replication throughput.",
        &["metrics_type", "FQDN", "UUID"],
    ),
];

static CONTAINER_FAMILIES: &[FamilySpec] = &[
    FamilySpec::new("container_server", "Container server statistics from container.recon.", SERVER_LABELS),
    FamilySpec::new(
        "swift_container_sharding",
        "Container sharding statistics from container.recon.",
        &["metric_name", "parameter", "FQDN", "UUID"],
    ),
    FamilySpec::new(
        "swift_container_replication_estimate",
        "Estimated container replication throughput.",
        &["metrics_type", "FQDN", "UUID"],
    ),
];

static OBJECT_FAMILIES: &[FamilySpec] = &[
    FamilySpec::new("object_server", "Object server statistics from object.recon.", SERVER_LABELS),
    FamilySpec::new(
        "swift_object_replication_per_disk",
        "Object replication statistics per disk from object.recon.",
        &["service_name", "metrics_type", "swift_disk", "FQDN", "UUID"],
    ),
    FamilySpec::new(
        "swift_object_replication_estimate",
        "Estimated object replication throughput and pass duration.",
        &["metrics_type", "FQDN", "UUID"],
    ),
    FamilySpec::new(
        "swift_object_replication_per_disk_estimate",
        "Estimated object replication throughput and pass duration per disk.",
        &["metrics_type", "swift_disk", "FQDN", "UUID"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconRole {
    Account,
    Container,
    Object,
}

/// Publishes one role's recon file.
#[derive(Debug, Clone)]
pub struct ReconCollector {
    role: ReconRole,
}

impl ReconCollector {
    pub fn account() -> Self {
        Self { role: ReconRole::Account }
    }

    pub fn container() -> Self {
        Self { role: ReconRole::Container }
    }

    pub fn object() -> Self {
        Self { role: ReconRole::Object }
    }

    pub fn role(&self) -> ReconRole {
        self.role
    }

    fn path(&self, ctx: &CollectorContext) -> PathBuf {
        match self.role {
            ReconRole::Account => ctx.config.account_recon_file.clone(),
            ReconRole::Container => ctx.config.container_recon_file.clone(),
            ReconRole::Object => ctx.config.object_recon_file.clone(),
        }
    }

    /// Asks the proxy which release is running. Failures leave the version
    /// unknown, which disables every gated series for this cycle.
    async fn capabilities(&self, ctx: &CollectorContext) -> ReconCapabilities {
        let version: Option<SwiftVersion> = match ctx.probes.cluster.swift_version().await {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(collector = self.name(), error = %e, "Swift version unknown, skipping version-gated metrics");
                None
            }
        };
        ReconCapabilities::for_version(version, ctx.config.sharding_min_version)
    }

    fn publish_server(&self, ctx: &CollectorContext, family: &str, series: &[ServerSeries]) -> Result<(), CollectorError> {
        for &(service, metric, value) in series {
            ctx.set_present(family, &[service, metric, ctx.fqdn(), ctx.uuid()], value)?;
        }
        Ok(())
    }

    fn publish_estimate(
        &self,
        ctx: &CollectorContext,
        family: &str,
        metrics_type: &str,
        value: Option<f64>,
    ) -> Result<(), CollectorError> {
        if !ctx.config.is_enabled(Module::GatherReplicationEstimate) {
            return Ok(());
        }
        ctx.set_present(family, &[metrics_type, ctx.fqdn(), ctx.uuid()], value)?;
        Ok(())
    }

    async fn collect_account(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let recon: AccountRecon = ctx.read_json(&self.path(ctx)).await?;
        self.publish_server(ctx, "account_server", &recon.server_series())?;
        self.publish_estimate(
            ctx,
            "swift_account_replication_estimate",
            "parts_per_second",
            recon.parts_per_second(),
        )
    }

    async fn collect_container(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let recon: ContainerRecon = ctx.read_json(&self.path(ctx)).await?;
        self.publish_server(ctx, "container_server", &recon.server_series())?;
        self.publish_estimate(
            ctx,
            "swift_container_replication_estimate",
            "parts_per_second",
            recon.parts_per_second(),
        )?;

        if self.capabilities(ctx).await.sharding_stats {
            for (metric_name, parameter, value) in recon.sharding_series() {
                ctx.set_present(
                    "swift_container_sharding",
                    &[metric_name, parameter, ctx.fqdn(), ctx.uuid()],
                    value,
                )?;
            }
        }
        Ok(())
    }

    async fn collect_object(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let recon: ObjectRecon = ctx.read_json(&self.path(ctx)).await?;
        self.publish_server(ctx, "object_server", &recon.server_series())?;

        let (parts_per_second, time_used) = recon.replication_estimate();
        self.publish_estimate(ctx, "swift_object_replication_estimate", "parts_per_second", parts_per_second)?;
        self.publish_estimate(ctx, "swift_object_replication_estimate", "time_used", time_used)?;

        if !self.capabilities(ctx).await.per_disk_replication {
            return Ok(());
        }
        let estimates = ctx.config.is_enabled(Module::GatherReplicationEstimate);
        for (disk, stats) in &recon.object_replication_per_disk {
            let disk = disk.as_str();
            for (service, metric, value) in stats.series() {
                ctx.set_present(
                    "swift_object_replication_per_disk",
                    &[service, metric, disk, ctx.fqdn(), ctx.uuid()],
                    value,
                )?;
            }
            if estimates {
                let (parts_per_second, time_used) = stats.replication_estimate();
                for (metrics_type, value) in [
                    ("parts_per_second_per_disk", parts_per_second),
                    ("time_used_per_disk", time_used),
                ] {
                    ctx.set_present(
                        "swift_object_replication_per_disk_estimate",
                        &[metrics_type, disk, ctx.fqdn(), ctx.uuid()],
                        value,
                    )?;
                }
            }
        }
        debug!(disks = recon.object_replication_per_disk.len(), "Published per-disk replication");
        Ok(())
    }
}

#[async_trait]
impl Collector for ReconCollector {
    fn name(&self) -> &'static str {
        match self.role {
            ReconRole::Account => "account_recon",
            ReconRole::Container => "container_recon",
            ReconRole::Object => "object_recon",
        }
    }

    fn module(&self) -> Module {
        Module::ReadReconFile
    }

    fn families(&self) -> &'static [FamilySpec] {
        match self.role {
            ReconRole::Account => ACCOUNT_FAMILIES,
            ReconRole::Container => CONTAINER_FAMILIES,
            ReconRole::Object => OBJECT_FAMILIES,
        }
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        match self.role {
            ReconRole::Account => self.collect_account(ctx).await,
            ReconRole::Container => self.collect_container(ctx).await,
            ReconRole::Object => self.collect_object(ctx).await,
        }
    }
}
