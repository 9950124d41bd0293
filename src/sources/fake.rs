//! In-memory collaborators for tests.
//!
//! Every fake starts out returning plausible empty data and can be
//! reconfigured while a test is running; collectors see the change on their
//! next cycle.

use super::{
    ClusterInfo, CpuSample, DiskIo, DiskUsageProbe, DriveHealthProbe, FsUsage, HostnameProbe, Mount,
    NicCounters, Probes, ServiceProbe, SmartReport, SourceError, SystemProbe,
};
use crate::swift::SwiftVersion;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
pub struct FakeSystem {
    pub mounts: Mutex<Vec<Mount>>,
    pub usage: Mutex<HashMap<PathBuf, FsUsage>>,
    pub disk_io: Mutex<HashMap<String, DiskIo>>,
    pub cpus: Mutex<Vec<CpuSample>>,
    pub nics: Mutex<Vec<NicCounters>>,
    pub mtus: Mutex<Vec<(String, u32)>>,
    pub sockets: Mutex<HashMap<u16, usize>>,
    pub fail: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl FakeSystem {
    pub fn set_mounts(&self, mounts: Vec<Mount>) {
        *lock(&self.mounts) = mounts;
    }

    pub fn set_usage(&self, mount_point: impl Into<PathBuf>, usage: FsUsage) {
        lock(&self.usage).insert(mount_point.into(), usage);
    }

    pub fn set_disk_io(&self, device: &str, io: DiskIo) {
        lock(&self.disk_io).insert(device.to_string(), io);
    }

    pub fn set_cpus(&self, cpus: Vec<CpuSample>) {
        *lock(&self.cpus) = cpus;
    }

    pub fn set_nics(&self, nics: Vec<NicCounters>) {
        *lock(&self.nics) = nics;
    }

    pub fn set_mtus(&self, mtus: Vec<(String, u32)>) {
        *lock(&self.mtus) = mtus;
    }

    pub fn set_sockets(&self, port: u16, count: usize) {
        lock(&self.sockets).insert(port, count);
    }

    /// Makes every subsequent call fail.
    pub fn set_failing(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *lock(&self.fail) {
            return Err(SourceError::Unavailable("fake system failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SystemProbe for FakeSystem {
    async fn mounts(&self) -> Result<Vec<Mount>, SourceError> {
        self.enter()?;
        Ok(lock(&self.mounts).clone())
    }

    async fn filesystem_usage(&self, mount_point: &Path) -> Result<FsUsage, SourceError> {
        self.enter()?;
        lock(&self.usage)
            .get(mount_point)
            .copied()
            .ok_or_else(|| SourceError::Unavailable(format!("no usage for {}", mount_point.display())))
    }

    async fn disk_io(&self) -> Result<HashMap<String, DiskIo>, SourceError> {
        self.enter()?;
        Ok(lock(&self.disk_io).clone())
    }

    async fn cpu_times(&self) -> Result<Vec<CpuSample>, SourceError> {
        self.enter()?;
        Ok(lock(&self.cpus).clone())
    }

    async fn nic_counters(&self) -> Result<Vec<NicCounters>, SourceError> {
        self.enter()?;
        Ok(lock(&self.nics).clone())
    }

    async fn nic_mtus(&self) -> Result<Vec<(String, u32)>, SourceError> {
        self.enter()?;
        Ok(lock(&self.mtus).clone())
    }

    async fn tcp_sockets_on_port(&self, port: u16) -> Result<usize, SourceError> {
        self.enter()?;
        Ok(lock(&self.sockets).get(&port).copied().unwrap_or(0))
    }
}

/// `du`, `smartctl`, `systemctl` and `hostname` in one fake.
#[derive(Debug)]
pub struct FakeCommands {
    pub directory_sizes: Mutex<HashMap<PathBuf, u64>>,
    pub smart_reports: Mutex<HashMap<String, SmartReport>>,
    pub active_units: Mutex<HashMap<String, bool>>,
    pub fqdn: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl Default for FakeCommands {
    fn default() -> Self {
        Self {
            directory_sizes: Mutex::default(),
            smart_reports: Mutex::default(),
            active_units: Mutex::default(),
            fqdn: Mutex::new(Some("storage01.example.com".to_string())),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeCommands {
    pub fn set_directory_size(&self, path: impl Into<PathBuf>, kib: u64) {
        lock(&self.directory_sizes).insert(path.into(), kib);
    }

    pub fn set_smart_report(&self, device: &str, info: &str, attributes: &str) {
        lock(&self.smart_reports).insert(
            device.to_string(),
            SmartReport {
                info: info.to_string(),
                attributes: attributes.to_string(),
            },
        );
    }

    pub fn set_unit_active(&self, unit: &str, active: bool) {
        lock(&self.active_units).insert(unit.to_string(), active);
    }

    pub fn set_fqdn(&self, fqdn: Option<&str>) {
        *lock(&self.fqdn) = fqdn.map(str::to_string);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiskUsageProbe for FakeCommands {
    async fn directory_usage_kib(&self, path: &Path) -> Result<u64, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.directory_sizes)
            .get(path)
            .copied()
            .ok_or_else(|| SourceError::Command {
                command: format!("du -s {}", path.display()),
                reason: "no such directory".into(),
            })
    }
}

#[async_trait]
impl DriveHealthProbe for FakeCommands {
    async fn smart_report(&self, device: &str) -> Result<SmartReport, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.smart_reports)
            .get(device)
            .cloned()
            .ok_or_else(|| SourceError::Command {
                command: format!("smartctl -A {device}"),
                reason: "no such device".into(),
            })
    }
}

#[async_trait]
impl ServiceProbe for FakeCommands {
    async fn is_active(&self, unit: &str) -> Result<bool, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.active_units).get(unit).copied().unwrap_or(false))
    }
}

#[async_trait]
impl HostnameProbe for FakeCommands {
    async fn fqdn(&self) -> Result<String, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.fqdn)
            .clone()
            .ok_or_else(|| SourceError::Unavailable("hostname not set".into()))
    }
}

/// Reports a fixed version, or fails when none is set.
#[derive(Debug, Default)]
pub struct FakeCluster {
    pub version: Mutex<Option<SwiftVersion>>,
    pub calls: AtomicUsize,
}

impl FakeCluster {
    pub fn with_version(version: SwiftVersion) -> Self {
        Self {
            version: Mutex::new(Some(version)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_version(&self, version: Option<SwiftVersion>) {
        *lock(&self.version) = version;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterInfo for FakeCluster {
    async fn swift_version(&self) -> Result<SwiftVersion, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (*lock(&self.version)).ok_or_else(|| SourceError::Unavailable("proxy unreachable".into()))
    }
}

/// Handles to every fake, kept by the test so it can reconfigure them after
/// the [`Probes`] have been handed out.
#[derive(Debug, Clone, Default)]
pub struct FakeProbes {
    pub system: Arc<FakeSystem>,
    pub commands: Arc<FakeCommands>,
    pub cluster: Arc<FakeCluster>,
}

impl FakeProbes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probes(&self) -> Probes {
        Probes {
            system: self.system.clone(),
            disk_usage: self.commands.clone(),
            drive_health: self.commands.clone(),
            services: self.commands.clone(),
            hostname: self.commands.clone(),
            cluster: self.cluster.clone(),
        }
    }

    /// Total calls made to any fake.
    pub fn total_calls(&self) -> usize {
        self.system.call_count() + self.commands.call_count() + self.cluster.call_count()
    }
}
