//! Per-drive space, I/O and SMART health.

use super::{Collector, CollectorContext, CollectorError, FamilySpec};
use crate::config::Module;
use crate::derived;
use crate::sources::{DiskIo, DriveKind, SmartReport};
use async_trait::async_trait;
use tracing::warn;

static USAGE_FAMILIES: &[FamilySpec] = &[
    FamilySpec::new(
        "swift_drive_usage",
        "Space on a Swift drive in bytes.",
        &["swift_drive_label", "drive_type", "state", "FQDN", "UUID"],
    ),
    FamilySpec::new(
        "swift_inodes_total",
        "Inodes on a Swift drive.",
        &["swift_drive_label", "state", "drive_type", "FQDN", "UUID"],
    ),
    FamilySpec::new(
        "swift_drive_percentage_used",
        "Fraction of a Swift drive's space in use.",
        &["swift_drive_label", "FQDN", "UUID"],
    ),
];

/// Space and inode usage of every Swift drive.
pub struct DiskUsageCollector;

#[async_trait]
impl Collector for DiskUsageCollector {
    fn name(&self) -> &'static str {
        "disk_usage"
    }

    fn module(&self) -> Module {
        Module::SwiftDiskUsage
    }

    fn families(&self) -> &'static [FamilySpec] {
        USAGE_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        for (label, mount) in ctx.swift_mounts().await? {
            let usage = match ctx.probes.system.filesystem_usage(&mount.mount_point).await {
                Ok(usage) => usage,
                Err(e) => {
                    warn!(collector = self.name(), drive = %label, error = %e, "Failed to stat drive");
                    continue;
                }
            };
            let kind = mount.kind.label();
            for (state, bytes) in [("total", usage.total), ("used", usage.used), ("free", usage.free)] {
                ctx.set("swift_drive_usage", &[label.as_str(), kind, state, ctx.fqdn(), ctx.uuid()], bytes as f64)?;
            }
            for (state, inodes) in [
                ("total", usage.inodes_total),
                ("used", usage.inodes_used),
                ("free", usage.inodes_free),
            ] {
                ctx.set("swift_inodes_total", &[label.as_str(), state, kind, ctx.fqdn(), ctx.uuid()], inodes as f64)?;
            }
            ctx.set_present(
                "swift_drive_percentage_used",
                &[label.as_str(), ctx.fqdn(), ctx.uuid()],
                derived::ratio(usage.used as f64, usage.total as f64),
            )?;
        }
        Ok(())
    }
}

static IO_FAMILIES: &[FamilySpec] = &[FamilySpec::new(
    "swift_drive_io_stat",
    "Cumulative I/O counters of a Swift drive. Sizes in bytes, times in milliseconds.",
    &["swift_drive", "metric_name", "drive_type", "FQDN", "UUID"],
)];

fn io_series(io: &DiskIo) -> [(&'static str, u64); 11] {
    [
        ("readCount", io.read_count),
        ("mergedReadCount", io.merged_read_count),
        ("writeCount", io.write_count),
        ("mergedWriteCount", io.merged_write_count),
        ("readBytes", io.read_bytes),
        ("writeBytes", io.write_bytes),
        ("readTime", io.read_time_ms),
        ("writeTime", io.write_time_ms),
        ("iopsInProgress", io.in_progress),
        ("ioTime", io.io_time_ms),
        ("weightedIO", io.weighted_io_ms),
    ]
}

/// Block-device counters for every Swift drive.
pub struct DriveIoCollector;

#[async_trait]
impl Collector for DriveIoCollector {
    fn name(&self) -> &'static str {
        "drive_io"
    }

    fn module(&self) -> Module {
        Module::SwiftDriveIO
    }

    fn families(&self) -> &'static [FamilySpec] {
        IO_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        let mounts = ctx.swift_mounts().await?;
        let counters = ctx.probes.system.disk_io().await?;
        for (_, mount) in mounts {
            let device = mount.device_name();
            let Some(io) = counters.get(device) else {
                continue;
            };
            for (metric, value) in io_series(io) {
                ctx.set(
                    "swift_drive_io_stat",
                    &[device, metric, mount.kind.label(), ctx.fqdn(), ctx.uuid()],
                    value as f64,
                )?;
            }
        }
        Ok(())
    }
}

const HEALTH_LABELS: &[&str] = &["drive_label", "drive_type", "FQDN", "UUID"];

static HEALTH_FAMILIES: &[FamilySpec] = &[
    FamilySpec::new(
        "swift_drive_reallocated_sector_count",
        "SMART Reallocated_Sector_Ct raw value (HDD).",
        HEALTH_LABELS,
    ),
    FamilySpec::new(
        "swift_drive_offline_uncorrectable_count",
        "SMART Offline_Uncorrectable raw value (HDD).",
        HEALTH_LABELS,
    ),
    FamilySpec::new(
        "swift_drive_media_wearout_indicator_count",
        "SMART Media_Wearout_Indicator normalized value (Intel SSD).",
        HEALTH_LABELS,
    ),
    FamilySpec::new(
        "swift_drive_wear_leveling_count",
        "SMART Wear_Leveling_Count raw value (Samsung SSD).",
        HEALTH_LABELS,
    ),
];

/// Values extracted from one `smartctl` report.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveHealth {
    pub reallocated_sectors: Option<f64>,
    pub offline_uncorrectable: Option<f64>,
    pub media_wearout_indicator: Option<f64>,
    pub wear_leveling_count: Option<f64>,
}

/// Finds the attribute row whose name matches `attribute` (underscores and
/// spaces are interchangeable) and returns its whitespace-separated fields.
fn attribute_fields<'a>(attributes: &'a str, attribute: &str) -> Option<Vec<&'a str>> {
    attributes
        .lines()
        .find(|line| line.replace('_', " ").contains(attribute))
        .map(|line| line.split_whitespace().collect())
}

fn raw_value(attributes: &str, attribute: &str) -> Option<f64> {
    attribute_fields(attributes, attribute)?.last()?.parse().ok()
}

/// Normalized VALUE column (fourth field of an `smartctl -A` row).
fn normalized_value(attributes: &str, attribute: &str) -> Option<f64> {
    attribute_fields(attributes, attribute)?.get(3)?.parse().ok()
}

/// HDDs report reallocated and uncorrectable sectors. SSDs report wear,
/// under a vendor-specific attribute picked from the `smartctl -i` identity.
pub fn parse_smart_report(kind: DriveKind, report: &SmartReport) -> DriveHealth {
    let attributes = report.attributes.as_str();
    match kind {
        DriveKind::Hdd => DriveHealth {
            reallocated_sectors: raw_value(attributes, "Reallocated Sector Ct"),
            offline_uncorrectable: raw_value(attributes, "Offline Uncorrectable"),
            ..DriveHealth::default()
        },
        DriveKind::Ssd if report.info.contains("Samsung") => DriveHealth {
            wear_leveling_count: raw_value(attributes, "Wear Leveling Count"),
            ..DriveHealth::default()
        },
        DriveKind::Ssd if report.info.contains("Intel") => DriveHealth {
            media_wearout_indicator: normalized_value(attributes, "Media Wearout Indicator"),
            ..DriveHealth::default()
        },
        DriveKind::Ssd | DriveKind::Unknown => DriveHealth::default(),
    }
}

/// SMART health of every Swift drive.
pub struct DriveHealthCollector;

#[async_trait]
impl Collector for DriveHealthCollector {
    fn name(&self) -> &'static str {
        "drive_health"
    }

    fn module(&self) -> Module {
        Module::RunSMARTCTL
    }

    fn families(&self) -> &'static [FamilySpec] {
        HEALTH_FAMILIES
    }

    async fn collect(&self, ctx: &CollectorContext) -> Result<(), CollectorError> {
        for (label, mount) in ctx.swift_mounts().await? {
            let report = match ctx.probes.drive_health.smart_report(&mount.device).await {
                Ok(report) => report,
                Err(e) => {
                    warn!(collector = self.name(), drive = %label, error = %e, "smartctl failed");
                    continue;
                }
            };
            let health = parse_smart_report(mount.kind, &report);
            let labels = [mount.device.as_str(), mount.kind.label(), ctx.fqdn(), ctx.uuid()];
            ctx.set_present("swift_drive_reallocated_sector_count", &labels, health.reallocated_sectors)?;
            ctx.set_present("swift_drive_offline_uncorrectable_count", &labels, health.offline_uncorrectable)?;
            ctx.set_present(
                "swift_drive_media_wearout_indicator_count",
                &labels,
                health.media_wearout_indicator,
            )?;
            ctx.set_present("swift_drive_wear_leveling_count", &labels, health.wear_leveling_count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::{harness, mount};
    use crate::config::Config;
    use crate::sources::FsUsage;

    const HDD_ATTRIBUTES: &str = "\
ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  5 Reallocated_Sector_Ct   0x0033   100   100   010    Pre-fail  Always       -       8
198 Offline_Uncorrectable   0x0030   100   100   000    Old_age   Offline      -       0
";

    const INTEL_ATTRIBUTES: &str = "\
ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
233 Media_Wearout_Indicator 0x0032   097   097   000    Old_age   Always       -       0
";

    const SAMSUNG_ATTRIBUTES: &str = "\
ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
177 Wear_Leveling_Count     0x0013   099   099   000    Pre-fail  Always       -       12
";

    fn report(info: &str, attributes: &str) -> SmartReport {
        SmartReport {
            info: info.to_string(),
            attributes: attributes.to_string(),
        }
    }

    #[test]
    fn test_parse_hdd_report() {
        let health = parse_smart_report(DriveKind::Hdd, &report("", HDD_ATTRIBUTES));
        assert_eq!(health.reallocated_sectors, Some(8.0));
        assert_eq!(health.offline_uncorrectable, Some(0.0));
        assert_eq!(health.wear_leveling_count, None);
    }

    #[test]
    fn test_parse_ssd_report_by_vendor() {
        let intel = parse_smart_report(
            DriveKind::Ssd,
            &report("Model Family:     Intel 730 and DC S35x0/3610/3700 Series SSDs", INTEL_ATTRIBUTES),
        );
        assert_eq!(intel.media_wearout_indicator, Some(97.0));

        let samsung = parse_smart_report(
            DriveKind::Ssd,
            &report("Model Family:     Samsung based SSDs", SAMSUNG_ATTRIBUTES),
        );
        assert_eq!(samsung.wear_leveling_count, Some(12.0));

        let other = parse_smart_report(DriveKind::Ssd, &report("Model Family: Micron", SAMSUNG_ATTRIBUTES));
        assert_eq!(other, DriveHealth::default());
    }

    #[tokio::test]
    async fn test_disk_usage_and_percentage() {
        let h = harness(Config::default());
        h.fakes
            .system
            .set_mounts(vec![mount("/dev/sdb1", "/srv/node/d1", DriveKind::Hdd)]);
        h.fakes.system.set_usage(
            "/srv/node/d1",
            FsUsage {
                total: 1000,
                used: 250,
                free: 750,
                inodes_total: 100,
                inodes_used: 10,
                inodes_free: 90,
            },
        );

        DiskUsageCollector.collect(&h.ctx).await.unwrap();
        let s = h.ctx.registry.snapshot();
        let id = ["node1.example.com", "uuid-1"];
        assert_eq!(s.value("swift_drive_usage", &["d1", "HDD", "used", id[0], id[1]]), Some(250.0));
        assert_eq!(s.value("swift_inodes_total", &["d1", "free", "HDD", id[0], id[1]]), Some(90.0));
        assert_eq!(s.value("swift_drive_percentage_used", &["d1", id[0], id[1]]), Some(0.25));
    }

    #[tokio::test]
    async fn test_empty_filesystem_omits_percentage() {
        let h = harness(Config::default());
        h.fakes
            .system
            .set_mounts(vec![mount("/dev/sdb1", "/srv/node/d1", DriveKind::Ssd)]);
        h.fakes.system.set_usage("/srv/node/d1", FsUsage::default());

        DiskUsageCollector.collect(&h.ctx).await.unwrap();
        let s = h.ctx.registry.snapshot();
        assert_eq!(s.series_count("swift_drive_percentage_used"), 0);
        assert_eq!(s.series_count("swift_drive_usage"), 3);
    }

    #[tokio::test]
    async fn test_drive_io_matches_mounts_to_devices() {
        let h = harness(Config::default());
        h.fakes.system.set_mounts(vec![
            mount("/dev/sdb1", "/srv/node/d1", DriveKind::Hdd),
            mount("/dev/sda1", "/", DriveKind::Ssd),
        ]);
        let io = DiskIo {
            read_count: 42,
            write_bytes: 4096,
            ..DiskIo::default()
        };
        h.fakes.system.set_disk_io("sdb1", io);
        h.fakes.system.set_disk_io("sda1", io);

        DriveIoCollector.collect(&h.ctx).await.unwrap();
        let s = h.ctx.registry.snapshot();
        let id = ["node1.example.com", "uuid-1"];
        assert_eq!(s.value("swift_drive_io_stat", &["sdb1", "readCount", "HDD", id[0], id[1]]), Some(42.0));
        assert_eq!(s.value("swift_drive_io_stat", &["sdb1", "writeBytes", "HDD", id[0], id[1]]), Some(4096.0));
        assert_eq!(s.series_count("swift_drive_io_stat"), 11);
    }

    #[tokio::test]
    async fn test_drive_health_skips_failing_drives() {
        let h = harness(Config::default());
        h.fakes.system.set_mounts(vec![
            mount("/dev/sdb1", "/srv/node/d1", DriveKind::Hdd),
            mount("/dev/sdc1", "/srv/node/d2", DriveKind::Hdd),
        ]);
        h.fakes.commands.set_smart_report("/dev/sdc1", "", HDD_ATTRIBUTES);

        DriveHealthCollector.collect(&h.ctx).await.unwrap();
        let s = h.ctx.registry.snapshot();
        assert_eq!(
            s.value(
                "swift_drive_reallocated_sector_count",
                &["/dev/sdc1", "HDD", "node1.example.com", "uuid-1"]
            ),
            Some(8.0)
        );
        assert_eq!(s.series_count("swift_drive_reallocated_sector_count"), 1);
    }
}
