//! Primary and handoff partition counts per drive and data directory.

use super::{Collector, CollectorContext, CollectorError, FamilySpec};
use crate::config::Module;
use crate::swift::partitions::{classify_dir, ReplicationProgress};
use async_trait::async_trait;
use tracing::debug;

const PARTITION_LABELS: &[&str] = &[
    "FQDN",
    "UUID",
    "swift_drive_label",
    "storage_policy",
    "swift_role",
    "drive_type",
];

static FAMILIES: &[FamilySpec] = &[
    FamilySpec::new(
        "swift_drive_primary_partitions",
        "Number of primary partitions on a Swift drive.",
        PARTITION_LABELS,
    ),
    FamilySpec::new(
        "swift_drive_handoff_partitions",
        "Number of handoff partitions on a Swift drive.",
        PARTITION_LABELS,
    ),
];

pub struct PartitionCollector;

#[async_trait]
impl Collector for PartitionCollector {
    fn name(&self) -> &'static str {
        "partitions"
    }

    fn module(&self) -> Module {
        Module::GrabSwiftPartition
    }

    fn families(&self) -> &'static [FamilySpec] {
        FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let progress: ReplicationProgress = ctx.read_json(&ctx.config.replication_progress_file).await?;
        let mounts = ctx.swift_mounts().await?;

        for (label, mount) in &mounts {
            let Some(dirs) = progress.drive(label) else {
                debug!(drive = %label, "Drive missing from replication progress");
                continue;
            };
            for (dir, counts) in dirs {
                let Some(role) = classify_dir(dir, &ctx.policies) else {
                    continue;
                };
                let labels = [
                    ctx.fqdn(),
                    ctx.uuid(),
                    label.as_str(),
                    role.storage_policy.as_str(),
                    role.swift_role.as_str(),
                    mount.kind.label(),
                ];
                ctx.set_present("swift_drive_primary_partitions", &labels, counts.primary)?;
                ctx.set_present("swift_drive_handoff_partitions", &labels, counts.handoff)?;
            }
        }
        Ok(())
    }
}
