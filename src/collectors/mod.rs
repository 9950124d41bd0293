//! Collector functions.
//!
//! A collector owns a fixed, disjoint set of gauge families. On every run it
//! reads its collaborator once, converts what it found into `f64`s and
//! upserts them into the [`MetricRegistry`]. Collectors never retry: a failed
//! run leaves the previous values in place and the next cycle tries again.

pub mod drives;
pub mod host;
pub mod partitions;
pub mod recon;
pub mod services;
pub mod storage;

use crate::config::{Config, Module};
use crate::identity::NodeIdentity;
use crate::registry::{MetricRegistry, RegistryError};
use crate::sources::{Mount, Probes, SourceError};
use crate::swift::StoragePolicies;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Static description of one gauge family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilySpec {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl FamilySpec {
    pub const fn new(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Self {
        Self { name, help, labels }
    }
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything a collector may touch during a run.
#[derive(Debug, Clone)]
pub struct CollectorContext {
    pub registry: Arc<MetricRegistry>,
    pub identity: Arc<NodeIdentity>,
    pub config: Arc<Config>,
    pub probes: Probes,
    pub policies: Arc<StoragePolicies>,
}

impl CollectorContext {
    pub fn fqdn(&self) -> &str {
        &self.identity.fqdn
    }

    pub fn uuid(&self) -> &str {
        &self.identity.uuid
    }

    pub fn set(&self, name: &str, labels: &[&str], value: f64) -> Result<(), RegistryError> {
        self.registry.set(name, labels, value)
    }

    /// Sets the series only if a value was observed this cycle.
    pub fn set_present(&self, name: &str, labels: &[&str], value: Option<f64>) -> Result<(), RegistryError> {
        match value {
            Some(value) => self.registry.set(name, labels, value),
            None => Ok(()),
        }
    }

    /// Mounts that sit directly under the Swift drive root, with their drive
    /// label (`d1`, `sdb`, ...).
    pub async fn swift_mounts(&self) -> Result<Vec<(String, Mount)>, SourceError> {
        let root = &self.config.swift_drive_root;
        let mut mounts: Vec<_> = self
            .probes
            .system
            .mounts()
            .await?
            .into_iter()
            .filter_map(|mount| mount.swift_label(root).map(|label| (label, mount)))
            .collect();
        mounts.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(mounts)
    }

    /// Reads and decodes a JSON state file.
    pub async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &std::path::Path) -> Result<T, CollectorError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| CollectorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| CollectorError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
pub trait Collector: Send + Sync {
    /// Used in logs and self-metrics.
    fn name(&self) -> &'static str;

    /// The configuration switch gating this collector.
    fn module(&self) -> Module;

    fn families(&self) -> &'static [FamilySpec];

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError>;
}

/// What happened when a collector was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Disabled,
    Success,
    Failure,
    Timeout,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Disabled => "disabled",
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
        }
    }
}

/// Runs `collector` unless its module is switched off. A disabled collector
/// performs no I/O and writes nothing.
pub async fn run_once(collector: &dyn Collector, ctx: &CollectorContext) -> Result<Outcome, CollectorError> {
    if !ctx.config.is_enabled(collector.module()) {
        debug!(collector = collector.name(), module = %collector.module(), "Module disabled, skipping");
        return Ok(Outcome::Disabled);
    }
    collector.collect(ctx).await?;
    Ok(Outcome::Success)
}

/// Every collector the exporter ships, in execution order.
pub fn all() -> Vec<Arc<dyn Collector>> {
    vec![
        Arc::new(recon::ReconCollector::account()),
        Arc::new(recon::ReconCollector::container()),
        Arc::new(recon::ReconCollector::object()),
        Arc::new(partitions::PartitionCollector),
        Arc::new(drives::DiskUsageCollector),
        Arc::new(drives::DriveIoCollector),
        Arc::new(host::ObjectServerConnectionCollector),
        Arc::new(host::CpuCollector::default()),
        Arc::new(host::NicCollector),
        Arc::new(host::NicMtuCollector),
        Arc::new(services::ServiceStatusCollector),
        Arc::new(drives::DriveHealthCollector),
        Arc::new(storage::LogSizeCollector),
        Arc::new(storage::FileCountCollector::default()),
        Arc::new(storage::StoragePolicyUsageCollector),
    ]
}

/// Declares every family of every collector.
pub fn register_all(registry: &MetricRegistry, collectors: &[Arc<dyn Collector>]) -> Result<(), RegistryError> {
    for collector in collectors {
        for family in collector.families() {
            registry.register(family.name, family.help, family.labels)?;
        }
    }
    Ok(())
}
