//! External collaborators the collectors read from.
//!
//! Each concern sits behind a narrow async trait so collectors can be driven
//! by fakes in tests. The production implementations live in [`system`]
//! (kernel and filesystem interfaces), [`commands`] (subprocesses) and
//! [`cluster`] (the proxy's `/info` endpoint).

pub mod cluster;
pub mod commands;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod system;

use crate::derived::CpuTimes;
use crate::swift::SwiftVersion;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by collaborators. All of them are transient from the
/// collector's point of view.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("command `{command}` failed: {reason}")]
    Command { command: String, reason: String },
    #[error("command `{0}` timed out")]
    Timeout(String),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected data from {origin}: {detail}")]
    Parse { origin: String, detail: String },
    #[error("{0}")]
    Unavailable(String),
}

impl SourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(origin: impl Into<String>, detail: impl ToString) -> Self {
        Self::Parse {
            origin: origin.into(),
            detail: detail.to_string(),
        }
    }
}

/// Rotational media or flash, as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveKind {
    Hdd,
    Ssd,
    Unknown,
}

impl DriveKind {
    /// The `drive_type` label value.
    pub fn label(&self) -> &'static str {
        match self {
            DriveKind::Hdd => "HDD",
            DriveKind::Ssd => "SSD",
            DriveKind::Unknown => "unknown",
        }
    }
}

/// A mounted block device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Device path, e.g. `/dev/sdb1`.
    pub device: String,
    pub mount_point: PathBuf,
    pub kind: DriveKind,
}

impl Mount {
    /// Kernel device name without the `/dev/` prefix.
    pub fn device_name(&self) -> &str {
        self.device.strip_prefix("/dev/").unwrap_or(&self.device)
    }

    /// The Swift drive label (`d1`, `sdb`, ...) if this mount sits directly
    /// under the drive root.
    pub fn swift_label(&self, drive_root: &Path) -> Option<String> {
        let relative = self.mount_point.strip_prefix(drive_root).ok()?;
        let mut components = relative.components();
        let first = components.next()?;
        if components.next().is_some() {
            return None;
        }
        Some(first.as_os_str().to_string_lossy().into_owned())
    }
}

/// Space and inode usage of a mounted filesystem, in bytes and inodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub inodes_total: u64,
    pub inodes_used: u64,
    pub inodes_free: u64,
}

/// Cumulative I/O counters of one block device (`/proc/diskstats`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIo {
    pub read_count: u64,
    pub merged_read_count: u64,
    pub write_count: u64,
    pub merged_write_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_time_ms: u64,
    pub write_time_ms: u64,
    pub in_progress: u64,
    pub io_time_ms: u64,
    pub weighted_io_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CpuSample {
    /// `cpu0`, `cpu1`, ...
    pub name: String,
    pub times: CpuTimes,
}

/// Cumulative counters for one network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NicCounters {
    pub name: String,
    pub mac_address: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

/// Raw `smartctl` output for one device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SmartReport {
    /// `smartctl -i` (identity section).
    pub info: String,
    /// `smartctl -A` (vendor attribute table).
    pub attributes: String,
}

/// Host statistics read from kernel interfaces.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    async fn mounts(&self) -> Result<Vec<Mount>, SourceError>;
    async fn filesystem_usage(&self, mount_point: &Path) -> Result<FsUsage, SourceError>;
    /// Keyed by kernel device name (`sdb`, `nvme0n1`).
    async fn disk_io(&self) -> Result<HashMap<String, DiskIo>, SourceError>;
    async fn cpu_times(&self) -> Result<Vec<CpuSample>, SourceError>;
    async fn nic_counters(&self) -> Result<Vec<NicCounters>, SourceError>;
    /// `(interface, mtu)` for every interface except loopback and docker bridges.
    async fn nic_mtus(&self) -> Result<Vec<(String, u32)>, SourceError>;
    /// Number of non-listening TCP sockets whose local port is `port`.
    async fn tcp_sockets_on_port(&self, port: u16) -> Result<usize, SourceError>;
}

/// Size of a directory tree on disk.
#[async_trait]
pub trait DiskUsageProbe: Send + Sync {
    /// Kibibytes, as reported by `du -s`.
    async fn directory_usage_kib(&self, path: &Path) -> Result<u64, SourceError>;
}

#[async_trait]
pub trait DriveHealthProbe: Send + Sync {
    async fn smart_report(&self, device: &str) -> Result<SmartReport, SourceError>;
}

#[async_trait]
pub trait ServiceProbe: Send + Sync {
    /// `Ok(false)` means the unit exists but is not active.
    async fn is_active(&self, unit: &str) -> Result<bool, SourceError>;
}

#[async_trait]
pub trait HostnameProbe: Send + Sync {
    async fn fqdn(&self) -> Result<String, SourceError>;
}

#[async_trait]
pub trait ClusterInfo: Send + Sync {
    async fn swift_version(&self) -> Result<SwiftVersion, SourceError>;
}

/// The full set of collaborators handed to the collectors.
#[derive(Clone)]
pub struct Probes {
    pub system: Arc<dyn SystemProbe>,
    pub disk_usage: Arc<dyn DiskUsageProbe>,
    pub drive_health: Arc<dyn DriveHealthProbe>,
    pub services: Arc<dyn ServiceProbe>,
    pub hostname: Arc<dyn HostnameProbe>,
    pub cluster: Arc<dyn ClusterInfo>,
}

impl std::fmt::Debug for Probes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probes").finish_non_exhaustive()
    }
}
