//! Configuration management for the exporter.
//!
//! Settings are layered with `figment`: built-in defaults, then the optional
//! YAML file named on the command line, then the command-line flags (and their
//! environment variables) on top. The result is validated once and treated as
//! read-only for the rest of the process.
//!
//! Module switches accept either a plain boolean or the legacy one-element
//! list form:
//!
//! ```yaml
//! ReadReconFile: true
//! RunSMARTCTL: [false]
//! ```

use crate::cli::Cli;
use crate::swift::SwiftVersion;
use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {0} does not exist")]
    MissingFile(PathBuf),
    #[error("failed to load configuration: {0}")]
    Extract(#[from] figment::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// An optional feature of the exporter, keyed by its configuration name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    ReadReconFile,
    GatherReplicationEstimate,
    GrabSwiftPartition,
    SwiftDiskUsage,
    SwiftDriveIO,
    CheckObjectServerConnection,
    ExposePerCPUUsage,
    ExposePerNICMetric,
    GrabNICMTU,
    CheckSwiftService,
    RunSMARTCTL,
    SwiftLogSize,
    CountFilesPerSwiftDrive,
    GatherStoragePolicyUtilization,
}

impl Module {
    pub const ALL: [Module; 14] = [
        Module::ReadReconFile,
        Module::GatherReplicationEstimate,
        Module::GrabSwiftPartition,
        Module::SwiftDiskUsage,
        Module::SwiftDriveIO,
        Module::CheckObjectServerConnection,
        Module::ExposePerCPUUsage,
        Module::ExposePerNICMetric,
        Module::GrabNICMTU,
        Module::CheckSwiftService,
        Module::RunSMARTCTL,
        Module::SwiftLogSize,
        Module::CountFilesPerSwiftDrive,
        Module::GatherStoragePolicyUtilization,
    ];

    /// The key used in the YAML file.
    pub fn key(&self) -> &'static str {
        match self {
            Module::ReadReconFile => "ReadReconFile",
            Module::GatherReplicationEstimate => "GatherReplicationEstimate",
            Module::GrabSwiftPartition => "GrabSwiftPartition",
            Module::SwiftDiskUsage => "SwiftDiskUsage",
            Module::SwiftDriveIO => "SwiftDriveIO",
            Module::CheckObjectServerConnection => "CheckObjectServerConnection",
            Module::ExposePerCPUUsage => "ExposePerCPUUsage",
            Module::ExposePerNICMetric => "ExposePerNICMetric",
            Module::GrabNICMTU => "GrabNICMTU",
            Module::CheckSwiftService => "CheckSwiftService",
            Module::RunSMARTCTL => "RunSMARTCTL",
            Module::SwiftLogSize => "SwiftLogSize",
            Module::CountFilesPerSwiftDrive => "CountFilesPerSwiftDrive",
            Module::GatherStoragePolicyUtilization => "GatherStoragePolicyUtilization",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Accepts `true` as well as `[true]`. An empty list keeps the module on.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        One(bool),
        Many(Vec<bool>),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::One(value) => value,
        Flag::Many(values) => values.first().copied().unwrap_or(true),
    })
}

/// Periods of the five collection tasks, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CollectionIntervals {
    pub one_minute: u64,
    pub five_minutes: u64,
    pub one_hour: u64,
    pub three_hours: u64,
    pub six_hours: u64,
}

impl Default for CollectionIntervals {
    fn default() -> Self {
        Self {
            one_minute: 60,
            five_minutes: 5 * 60,
            one_hour: 60 * 60,
            three_hours: 3 * 60 * 60,
            six_hours: 6 * 60 * 60,
        }
    }
}

/// The main configuration struct for the application.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Config {
    #[serde(deserialize_with = "flag")]
    pub read_recon_file: bool,
    #[serde(deserialize_with = "flag")]
    pub gather_replication_estimate: bool,
    #[serde(deserialize_with = "flag")]
    pub grab_swift_partition: bool,
    #[serde(deserialize_with = "flag")]
    pub swift_disk_usage: bool,
    #[serde(rename = "SwiftDriveIO", deserialize_with = "flag")]
    pub swift_drive_io: bool,
    #[serde(deserialize_with = "flag")]
    pub check_object_server_connection: bool,
    #[serde(rename = "ExposePerCPUUsage", deserialize_with = "flag")]
    pub expose_per_cpu_usage: bool,
    #[serde(rename = "ExposePerNICMetric", deserialize_with = "flag")]
    pub expose_per_nic_metric: bool,
    #[serde(rename = "GrabNICMTU", deserialize_with = "flag")]
    pub grab_nic_mtu: bool,
    #[serde(deserialize_with = "flag")]
    pub check_swift_service: bool,
    #[serde(rename = "RunSMARTCTL", deserialize_with = "flag")]
    pub run_smartctl: bool,
    #[serde(deserialize_with = "flag")]
    pub swift_log_size: bool,
    #[serde(deserialize_with = "flag")]
    pub count_files_per_swift_drive: bool,
    #[serde(deserialize_with = "flag")]
    pub gather_storage_policy_utilization: bool,

    pub swift_log_file: PathBuf,
    pub swift_config_file: PathBuf,
    pub replication_progress_file: PathBuf,
    pub object_recon_file: PathBuf,
    pub container_recon_file: PathBuf,
    pub account_recon_file: PathBuf,
    /// `key = value` file holding the node UUID and proxy address.
    pub node_config_file: PathBuf,
    /// Directory the Swift drives are mounted under.
    pub swift_drive_root: PathBuf,

    /// First release that publishes sharding and per-disk replication stats.
    pub sharding_min_version: SwiftVersion,
    pub object_server_port: u16,
    /// Bound on each external call (`du`, `smartctl`, `systemctl`, `/info`).
    /// A whole collector run is bounded by its task's period instead.
    pub collector_timeout_seconds: u64,
    pub collection_intervals: CollectionIntervals,
    /// Units reported on `swift_service_status`.
    pub swift_services: Vec<String>,
    /// Units reported on `swift_sub_service_status`.
    pub swift_sub_services: Vec<String>,

    pub log_level: String,
    /// Append the exporter's own operational metrics to `/metrics`.
    pub self_metrics: bool,
    pub listen_address: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_recon_file: true,
            gather_replication_estimate: true,
            grab_swift_partition: true,
            swift_disk_usage: true,
            swift_drive_io: true,
            check_object_server_connection: true,
            expose_per_cpu_usage: true,
            expose_per_nic_metric: true,
            grab_nic_mtu: true,
            check_swift_service: true,
            run_smartctl: true,
            swift_log_size: true,
            count_files_per_swift_drive: true,
            gather_storage_policy_utilization: true,
            swift_log_file: PathBuf::from("/var/log/swift/all.log"),
            swift_config_file: PathBuf::from("/etc/swift/swift.conf"),
            replication_progress_file: PathBuf::from("/opt/ss/var/lib/replication_progress.json"),
            object_recon_file: PathBuf::from("/var/cache/swift/object.recon"),
            container_recon_file: PathBuf::from("/var/cache/swift/container.recon"),
            account_recon_file: PathBuf::from("/var/cache/swift/account.recon"),
            node_config_file: PathBuf::from("/etc/ssnode.conf"),
            swift_drive_root: PathBuf::from("/srv/node"),
            sharding_min_version: SwiftVersion::new(2, 15),
            object_server_port: 6000,
            collector_timeout_seconds: 120,
            collection_intervals: CollectionIntervals::default(),
            swift_services: [
                "ssswift-proxy",
                "ssswift-account@server",
                "ssswift-container@server",
                "ssswift-object@server",
            ]
            .map(String::from)
            .to_vec(),
            swift_sub_services: [
                "ssswift-object-replication@server",
                "ssswift-object-replication@reconstructor",
                "ssswift-object-replication@replicator",
                "ssswift-object@updater",
                "ssswift-object@auditor",
                "ssswift-container-replication@sharder",
                "ssswift-container-replication@replicator",
                "ssswift-container-replication@server",
                "ssswift-container@updater",
                "ssswift-container@auditor",
                "ssswift-account-replication@replicator",
                "ssswift-account-replication@server",
                "ssswift-account@reaper",
                "ssswift-account@auditor",
            ]
            .map(String::from)
            .to_vec(),
            log_level: "info".to_string(),
            self_metrics: true,
            listen_address: SocketAddr::from(([0, 0, 0, 0], 53167)),
        }
    }
}

impl Config {
    /// Loads defaults, the YAML file given on the command line (if any) and
    /// the command-line overrides, in that order.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if let Some(path) = &cli.config {
            if !path.is_file() {
                return Err(ConfigError::MissingFile(path.clone()));
            }
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment.merge(cli.clone()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a YAML file without command-line overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::load(&Cli::for_config(path))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = &self.collection_intervals;
        for (name, secs) in [
            ("OneMinute", intervals.one_minute),
            ("FiveMinutes", intervals.five_minutes),
            ("OneHour", intervals.one_hour),
            ("ThreeHours", intervals.three_hours),
            ("SixHours", intervals.six_hours),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(format!("CollectionIntervals.{name} must be positive")));
            }
        }
        if self.collector_timeout_seconds == 0 {
            return Err(ConfigError::Invalid("CollectorTimeoutSeconds must be positive".into()));
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.log_level) {
            return Err(ConfigError::Invalid(format!("LogLevel '{}': {e}", self.log_level)));
        }
        Ok(())
    }

    pub fn is_enabled(&self, module: Module) -> bool {
        match module {
            Module::ReadReconFile => self.read_recon_file,
            Module::GatherReplicationEstimate => self.gather_replication_estimate,
            Module::GrabSwiftPartition => self.grab_swift_partition,
            Module::SwiftDiskUsage => self.swift_disk_usage,
            Module::SwiftDriveIO => self.swift_drive_io,
            Module::CheckObjectServerConnection => self.check_object_server_connection,
            Module::ExposePerCPUUsage => self.expose_per_cpu_usage,
            Module::ExposePerNICMetric => self.expose_per_nic_metric,
            Module::GrabNICMTU => self.grab_nic_mtu,
            Module::CheckSwiftService => self.check_swift_service,
            Module::RunSMARTCTL => self.run_smartctl,
            Module::SwiftLogSize => self.swift_log_size,
            Module::CountFilesPerSwiftDrive => self.count_files_per_swift_drive,
            Module::GatherStoragePolicyUtilization => self.gather_storage_policy_utilization,
        }
    }

    pub fn set_enabled(&mut self, module: Module, enabled: bool) {
        let slot = match module {
            Module::ReadReconFile => &mut self.read_recon_file,
            Module::GatherReplicationEstimate => &mut self.gather_replication_estimate,
            Module::GrabSwiftPartition => &mut self.grab_swift_partition,
            Module::SwiftDiskUsage => &mut self.swift_disk_usage,
            Module::SwiftDriveIO => &mut self.swift_drive_io,
            Module::CheckObjectServerConnection => &mut self.check_object_server_connection,
            Module::ExposePerCPUUsage => &mut self.expose_per_cpu_usage,
            Module::ExposePerNICMetric => &mut self.expose_per_nic_metric,
            Module::GrabNICMTU => &mut self.grab_nic_mtu,
            Module::CheckSwiftService => &mut self.check_swift_service,
            Module::RunSMARTCTL => &mut self.run_smartctl,
            Module::SwiftLogSize => &mut self.swift_log_size,
            Module::CountFilesPerSwiftDrive => &mut self.count_files_per_swift_drive,
            Module::GatherStoragePolicyUtilization => &mut self.gather_storage_policy_utilization,
        };
        *slot = enabled;
    }

    /// Enables exactly the given modules.
    pub fn with_only(mut self, enabled: &[Module]) -> Self {
        for module in Module::ALL {
            self.set_enabled(module, enabled.contains(&module));
        }
        self
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector_timeout_seconds)
    }

    /// Turns off modules whose input files are missing. Returns the modules
    /// that were disabled.
    pub fn disable_missing_prerequisites(&mut self) -> Vec<Module> {
        let mut disabled = Vec::new();

        let recon_files = [
            &self.account_recon_file,
            &self.container_recon_file,
            &self.object_recon_file,
        ];
        if self.read_recon_file {
            if let Some(missing) = recon_files.iter().find(|path| !path.exists()) {
                warn!(module = %Module::ReadReconFile, path = %missing.display(), "Recon file not found, disabling module");
                disabled.push(Module::ReadReconFile);
            }
        }
        if self.grab_swift_partition && !self.replication_progress_file.exists() {
            warn!(
                module = %Module::GrabSwiftPartition,
                path = %self.replication_progress_file.display(),
                "Replication progress file not found, disabling module"
            );
            disabled.push(Module::GrabSwiftPartition);
        }
        if self.swift_log_size && !self.swift_log_file.exists() {
            warn!(
                module = %Module::SwiftLogSize,
                path = %self.swift_log_file.display(),
                "Swift log file not found, disabling module"
            );
            disabled.push(Module::SwiftLogSize);
        }
        if !self.swift_config_file.exists() {
            warn!(
                path = %self.swift_config_file.display(),
                "swift.conf not found, storage policies will be reported as unknown"
            );
        }

        for module in &disabled {
            self.set_enabled(*module, false);
        }
        disabled
    }
}
