//! [`SystemProbe`] backed by the running kernel.
//!
//! Mount discovery and drive type come from `sysinfo`; filesystem usage from
//! `statvfs(2)`; CPU, block-device, NIC and socket counters from `/proc` via
//! `procfs`; MAC address and MTU from `/sys/class/net`.

use super::{CpuSample, DiskIo, DriveKind, FsUsage, Mount, NicCounters, SourceError, SystemProbe};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use sysinfo::{DiskKind, Disks};
use tracing::trace;

const SECTOR_SIZE: u64 = 512;

#[derive(Debug, Clone)]
pub struct HostSystem {
    net_class_dir: PathBuf,
}

impl Default for HostSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSystem {
    pub fn new() -> Self {
        Self {
            net_class_dir: PathBuf::from("/sys/class/net"),
        }
    }

    /// Reads interface attributes from `dir` instead of `/sys/class/net`.
    pub fn with_net_class_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.net_class_dir = dir.into();
        self
    }

    async fn read_net_attribute(&self, nic: &str, attribute: &str) -> Result<String, SourceError> {
        let path = self.net_class_dir.join(nic).join(attribute);
        tokio::fs::read_to_string(&path)
            .await
            .map(|raw| raw.trim().to_string())
            .map_err(|e| SourceError::io(path, e))
    }

    async fn interfaces(&self) -> Result<Vec<String>, SourceError> {
        let mut entries = tokio::fs::read_dir(&self.net_class_dir)
            .await
            .map_err(|e| SourceError::io(&self.net_class_dir, e))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::io(&self.net_class_dir, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Loopback and container bridges carry no Swift traffic.
fn is_virtual_interface(name: &str) -> bool {
    name == "lo" || name.starts_with("docker")
}

async fn blocking<T, F>(what: &'static str, f: F) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SourceError::Unavailable(format!("{what} task failed: {e}")))?
}

#[async_trait]
impl SystemProbe for HostSystem {
    async fn mounts(&self) -> Result<Vec<Mount>, SourceError> {
        blocking("mount discovery", || {
            let disks = Disks::new_with_refreshed_list();
            Ok(disks
                .list()
                .iter()
                .map(|disk| Mount {
                    device: disk.name().to_string_lossy().into_owned(),
                    mount_point: disk.mount_point().to_path_buf(),
                    kind: match disk.kind() {
                        DiskKind::HDD => DriveKind::Hdd,
                        DiskKind::SSD => DriveKind::Ssd,
                        DiskKind::Unknown(_) => DriveKind::Unknown,
                    },
                })
                .collect())
        })
        .await
    }

    async fn filesystem_usage(&self, mount_point: &Path) -> Result<FsUsage, SourceError> {
        let path = mount_point.to_path_buf();
        blocking("statvfs", move || {
            let stat = rustix::fs::statvfs(path.as_path()).map_err(|e| SourceError::io(&path, e.into()))?;
            let block_size = if stat.f_frsize > 0 {
                stat.f_frsize as u64
            } else {
                stat.f_bsize as u64
            };
            let total = stat.f_blocks as u64 * block_size;
            let free = stat.f_bavail as u64 * block_size;
            let used = (stat.f_blocks as u64).saturating_sub(stat.f_bfree as u64) * block_size;
            let inodes_total = stat.f_files as u64;
            let inodes_free = stat.f_ffree as u64;
            Ok(FsUsage {
                total,
                used,
                free,
                inodes_total,
                inodes_used: inodes_total.saturating_sub(inodes_free),
                inodes_free,
            })
        })
        .await
    }

    #[cfg(target_os = "linux")]
    async fn disk_io(&self) -> Result<HashMap<String, DiskIo>, SourceError> {
        blocking("diskstats", || {
            let stats = procfs::diskstats().map_err(|e| SourceError::parse("/proc/diskstats", e))?;
            Ok(stats
                .into_iter()
                .map(|stat| {
                    let io = DiskIo {
                        read_count: stat.reads as u64,
                        merged_read_count: stat.merged as u64,
                        write_count: stat.writes as u64,
                        merged_write_count: stat.writes_merged as u64,
                        read_bytes: stat.sectors_read as u64 * SECTOR_SIZE,
                        write_bytes: stat.sectors_written as u64 * SECTOR_SIZE,
                        read_time_ms: stat.time_reading as u64,
                        write_time_ms: stat.time_writing as u64,
                        in_progress: stat.in_progress as u64,
                        io_time_ms: stat.time_in_progress as u64,
                        weighted_io_ms: stat.weighted_time_in_progress as u64,
                    };
                    (stat.name, io)
                })
                .collect())
        })
        .await
    }

    #[cfg(not(target_os = "linux"))]
    async fn disk_io(&self) -> Result<HashMap<String, DiskIo>, SourceError> {
        Err(SourceError::Unavailable("/proc/diskstats is only available on Linux".into()))
    }

    #[cfg(target_os = "linux")]
    async fn cpu_times(&self) -> Result<Vec<CpuSample>, SourceError> {
        use crate::derived::CpuTimes;
        use procfs::CurrentSI;

        blocking("cpu times", || {
            let stats = procfs::KernelStats::current().map_err(|e| SourceError::parse("/proc/stat", e))?;
            Ok(stats
                .cpu_time
                .iter()
                .enumerate()
                .map(|(i, cpu)| CpuSample {
                    name: format!("cpu{i}"),
                    times: CpuTimes {
                        user: cpu.user,
                        nice: cpu.nice,
                        system: cpu.system,
                        idle: cpu.idle,
                        iowait: cpu.iowait.unwrap_or(0),
                        irq: cpu.irq.unwrap_or(0),
                        softirq: cpu.softirq.unwrap_or(0),
                        steal: cpu.steal.unwrap_or(0),
                        guest: cpu.guest.unwrap_or(0),
                        guest_nice: cpu.guest_nice.unwrap_or(0),
                    },
                })
                .collect())
        })
        .await
    }

    #[cfg(not(target_os = "linux"))]
    async fn cpu_times(&self) -> Result<Vec<CpuSample>, SourceError> {
        Err(SourceError::Unavailable("/proc/stat is only available on Linux".into()))
    }

    #[cfg(target_os = "linux")]
    async fn nic_counters(&self) -> Result<Vec<NicCounters>, SourceError> {
        let devices = blocking("net dev", || {
            procfs::net::dev_status().map_err(|e| SourceError::parse("/proc/net/dev", e))
        })
        .await?;

        let mut counters = Vec::with_capacity(devices.len());
        for (name, dev) in devices {
            let mac_address = match self.read_net_attribute(&name, "address").await {
                Ok(mac) => mac,
                Err(e) => {
                    trace!(nic = %name, error = %e, "No MAC address for interface");
                    String::new()
                }
            };
            counters.push(NicCounters {
                name,
                mac_address,
                bytes_sent: dev.sent_bytes,
                bytes_recv: dev.recv_bytes,
                packets_sent: dev.sent_packets,
                packets_recv: dev.recv_packets,
                errors_in: dev.recv_errs,
                errors_out: dev.sent_errs,
            });
        }
        counters.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(counters)
    }

    #[cfg(not(target_os = "linux"))]
    async fn nic_counters(&self) -> Result<Vec<NicCounters>, SourceError> {
        Err(SourceError::Unavailable("/proc/net/dev is only available on Linux".into()))
    }

    async fn nic_mtus(&self) -> Result<Vec<(String, u32)>, SourceError> {
        let mut mtus = Vec::new();
        for nic in self.interfaces().await? {
            if is_virtual_interface(&nic) {
                continue;
            }
            let raw = self.read_net_attribute(&nic, "mtu").await?;
            let mtu = raw
                .parse()
                .map_err(|e| SourceError::parse(format!("{nic}/mtu"), e))?;
            mtus.push((nic, mtu));
        }
        Ok(mtus)
    }

    #[cfg(target_os = "linux")]
    async fn tcp_sockets_on_port(&self, port: u16) -> Result<usize, SourceError> {
        use procfs::net::TcpState;

        blocking("tcp sockets", move || {
            let v4 = procfs::net::tcp().map_err(|e| SourceError::parse("/proc/net/tcp", e))?;
            // Hosts with IPv6 disabled have no tcp6 table.
            let v6 = procfs::net::tcp6().unwrap_or_default();
            Ok(v4
                .iter()
                .chain(v6.iter())
                .filter(|entry| entry.local_address.port() == port && entry.state != TcpState::Listen)
                .count())
        })
        .await
    }

    #[cfg(not(target_os = "linux"))]
    async fn tcp_sockets_on_port(&self, _port: u16) -> Result<usize, SourceError> {
        Err(SourceError::Unavailable("/proc/net/tcp is only available on Linux".into()))
    }
}
