//! On-disk footprint: log size, database and object file counts, and space
//! used per storage policy.

use super::{Collector, CollectorContext, CollectorError, FamilySpec};
use crate::config::Module;
use crate::sources::SourceError;
use crate::swift::policy::policy_index;
use async_trait::async_trait;
use std::path::{Component, Path};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

const IDENTITY: &[&str] = &["FQDN", "UUID"];

static LOG_FAMILIES: &[FamilySpec] = &[FamilySpec::new(
    "swift_log_file_size",
    "Size of the Swift log file in bytes.",
    IDENTITY,
)];

pub struct LogSizeCollector;

#[async_trait]
impl Collector for LogSizeCollector {
    fn name(&self) -> &'static str {
        "log_size"
    }

    fn module(&self) -> Module {
        Module::SwiftLogSize
    }

    fn families(&self) -> &'static [FamilySpec] {
        LOG_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let path = &ctx.config.swift_log_file;
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| CollectorError::Read {
                path: path.clone(),
                source,
            })?;
        ctx.set("swift_log_file_size", &[ctx.fqdn(), ctx.uuid()], metadata.len() as f64)?;
        Ok(())
    }
}

static FILE_COUNT_FAMILIES: &[FamilySpec] = &[
    FamilySpec::new("account_db", "Number of account databases on this node.", IDENTITY),
    FamilySpec::new(
        "account_db_pending",
        "Number of pending account database updates on this node.",
        IDENTITY,
    ),
    FamilySpec::new("container_db", "Number of container databases on this node.", IDENTITY),
    FamilySpec::new(
        "container_db_pending",
        "Number of pending container database updates on this node.",
        IDENTITY,
    ),
    FamilySpec::new("object_file_count", "Number of object data files on this node.", IDENTITY),
];

/// Totals across every drive under the drive root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub account_db: u64,
    pub account_db_pending: u64,
    pub container_db: u64,
    pub container_db_pending: u64,
    pub object_files: u64,
}

impl FileCounts {
    fn record(&mut self, relative: &Path) {
        let dirs: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => name.to_str(),
                _ => None,
            })
            .collect();
        let in_dir = |name: &str| dirs.iter().any(|dir| *dir == name);
        let in_objects = dirs.iter().any(|dir| policy_index(dir).is_some());
        let extension = relative.extension().and_then(|e| e.to_str());

        if in_dir("accounts") {
            match extension {
                Some("db") => self.account_db += 1,
                Some("pending") => self.account_db_pending += 1,
                _ => {}
            }
        } else if in_dir("containers") {
            match extension {
                Some("db") => self.container_db += 1,
                Some("pending") => self.container_db_pending += 1,
                _ => {}
            }
        } else if in_objects && extension == Some("data") {
            self.object_files += 1;
        }
    }

    /// Walks `root` without following symlinks. Unreadable entries are skipped.
    pub fn scan(root: &Path) -> Result<Self, SourceError> {
        if !root.is_dir() {
            return Err(SourceError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "drive root is not a directory"),
            ));
        }
        let mut counts = Self::default();
        for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                counts.record(relative);
            }
        }
        Ok(counts)
    }
}

/// Counts files under the drive root. At most one walk runs at a time: a walk
/// outliving its run keeps the next cycle from starting another.
#[derive(Debug, Default)]
pub struct FileCountCollector {
    scanning: Arc<AtomicBool>,
}

/// Clears the in-flight flag when the walk ends.
struct ScanGuard(Arc<AtomicBool>);

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl Collector for FileCountCollector {
    fn name(&self) -> &'static str {
        "file_counts"
    }

    fn module(&self) -> Module {
        Module::CountFilesPerSwiftDrive
    }

    fn families(&self) -> &'static [FamilySpec] {
        FILE_COUNT_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        if self.scanning.swap(true, Ordering::AcqRel) {
            return Err(SourceError::Unavailable("previous file scan is still running".into()).into());
        }
        let guard = ScanGuard(self.scanning.clone());
        let root = ctx.config.swift_drive_root.clone();
        let counts = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            FileCounts::scan(&root)
        })
            .await
            .map_err(|e| SourceError::Unavailable(format!("file scan task failed: {e}")))??;
        debug!(?counts, "Counted Swift files");

        let labels = [ctx.fqdn(), ctx.uuid()];
        ctx.set("account_db", &labels, counts.account_db as f64)?;
        ctx.set("account_db_pending", &labels, counts.account_db_pending as f64)?;
        ctx.set("container_db", &labels, counts.container_db as f64)?;
        ctx.set("container_db_pending", &labels, counts.container_db_pending as f64)?;
        ctx.set("object_file_count", &labels, counts.object_files as f64)?;
        Ok(())
    }
}

static POLICY_FAMILIES: &[FamilySpec] = &[FamilySpec::new(
    "swift_storage_policy_usage",
    "Disk space used by each storage policy's object directory, in KiB.",
    &[
        "swift_drive_mountpoint",
        "swift_drive_label",
        "storage_policy_name",
        "FQDN",
        "UUID",
    ],
)];

/// Object directories (`objects`, `objects-N`) directly under `mount_point`.
async fn object_dirs(mount_point: &Path) -> Result<Vec<String>, SourceError> {
    let mut entries = tokio::fs::read_dir(mount_point)
        .await
        .map_err(|e| SourceError::io(mount_point, e))?;
    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| SourceError::io(mount_point, e))? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && policy_index(&name).is_some() {
            dirs.push(name);
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub struct StoragePolicyUsageCollector;

#[async_trait]
impl Collector for StoragePolicyUsageCollector {
    fn name(&self) -> &'static str {
        "storage_policy_usage"
    }

    fn module(&self) -> Module {
        Module::GatherStoragePolicyUtilization
    }

    fn families(&self) -> &'static [FamilySpec] {
        POLICY_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        for (label, mount) in ctx.swift_mounts().await? {
            let dirs = match object_dirs(&mount.mount_point).await {
                Ok(dirs) => dirs,
                Err(e) => {
                    warn!(collector = self.name(), drive = %label, error = %e, "Failed to list drive");
                    continue;
                }
            };
            let mount_point = mount.mount_point.to_string_lossy().into_owned();
            for dir in dirs {
                let Some(policy) = ctx.policies.resolve_dir(&dir) else {
                    continue;
                };
                let path = mount.mount_point.join(&dir);
                let kib = match ctx.probes.disk_usage.directory_usage_kib(&path).await {
                    Ok(kib) => kib,
                    Err(e) => {
                        warn!(collector = self.name(), path = %path.display(), error = %e, "du failed");
                        continue;
                    }
                };
                ctx.set(
                    "swift_storage_policy_usage",
                    &[mount_point.as_str(), dir.as_str(), policy, ctx.fqdn(), ctx.uuid()],
                    kib as f64,
                )?;
            }
        }
        Ok(())
    }
}
