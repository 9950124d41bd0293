//! Schemas for the `*.recon` JSON snapshots written by the Swift daemons.
//!
//! Every counter is optional: the daemons only write the keys they have
//! produced so far, and older releases omit whole sections. A missing counter
//! becomes `None` and is skipped by the collectors instead of being reported
//! as zero.

use crate::derived;
use crate::swift::version::SwiftVersion;
use serde::Deserialize;
use std::collections::BTreeMap;

/// One `(service_name, metrics_name, value)` triple for the
/// `account_server` / `container_server` / `object_server` families.
pub type ServerSeries = (&'static str, &'static str, Option<f64>);

/// Which optional recon sections the running Swift release provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconCapabilities {
    pub sharding_stats: bool,
    pub per_disk_replication: bool,
}

impl ReconCapabilities {
    /// Capabilities for `version`, gated at `threshold`. An unknown version
    /// enables nothing.
    pub fn for_version(version: Option<SwiftVersion>, threshold: SwiftVersion) -> Self {
        let supported = version.is_some_and(|v| v.at_least(threshold));
        Self {
            sharding_stats: supported,
            per_disk_replication: supported,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReplicationStats {
    pub attempted: Option<f64>,
    pub diff: Option<f64>,
    pub diff_capped: Option<f64>,
    pub failure: Option<f64>,
    pub hashmatch: Option<f64>,
    pub no_change: Option<f64>,
    pub remote_merge: Option<f64>,
    pub rsync: Option<f64>,
    pub success: Option<f64>,
    pub ts_repl: Option<f64>,
    pub start: Option<f64>,
}

impl ReplicationStats {
    fn db_replicator_series(&self, replication_time: Option<f64>) -> Vec<ServerSeries> {
        vec![
            ("replicator", "remote_merge", self.remote_merge),
            ("replicator", "diff", self.diff),
            ("replicator", "diff_capped", self.diff_capped),
            ("replicator", "no_change", self.no_change),
            ("replicator", "ts_repl", self.ts_repl),
            ("replicator", "replication_time", replication_time),
            ("replicator", "rsync", self.rsync),
            ("replicator", "success", self.success),
            ("replicator", "failure", self.failure),
            ("replicator", "attempted", self.attempted),
            ("replicator", "hashmatch", self.hashmatch),
        ]
    }
}

/// `account.recon`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccountRecon {
    pub account_audits_passed: Option<f64>,
    pub account_audits_failed: Option<f64>,
    pub account_auditor_pass_completed: Option<f64>,
    pub replication_stats: ReplicationStats,
    /// Seconds.
    pub replication_time: Option<f64>,
}

impl AccountRecon {
    pub fn server_series(&self) -> Vec<ServerSeries> {
        let mut series = vec![
            ("auditor", "passed", self.account_audits_passed),
            ("auditor", "failed", self.account_audits_failed),
            ("auditor", "passed_completed", self.account_auditor_pass_completed),
        ];
        series.extend(self.replication_stats.db_replicator_series(self.replication_time));
        series
    }

    /// Partitions replicated per second during the last pass.
    pub fn parts_per_second(&self) -> Option<f64> {
        derived::per_second(self.replication_stats.attempted?, self.replication_time?)
    }
}

/// `container.recon`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContainerRecon {
    pub container_audits_passed: Option<f64>,
    pub container_audits_failed: Option<f64>,
    pub container_auditor_pass_completed: Option<f64>,
    pub replication_stats: ReplicationStats,
    /// Seconds.
    pub replication_time: Option<f64>,
    pub sharding_last: Option<f64>,
    pub sharding_stats: Option<ShardingStats>,
}

impl ContainerRecon {
    pub fn server_series(&self) -> Vec<ServerSeries> {
        let mut series = vec![
            ("auditor", "passed", self.container_audits_passed),
            ("auditor", "failed", self.container_audits_failed),
            ("auditor", "passed_completed", self.container_auditor_pass_completed),
        ];
        series.extend(self.replication_stats.db_replicator_series(self.replication_time));
        series
    }

    pub fn parts_per_second(&self) -> Option<f64> {
        derived::per_second(self.replication_stats.attempted?, self.replication_time?)
    }

    /// `(metric_name, parameter, value)` triples for `swift_container_sharding`.
    pub fn sharding_series(&self) -> Vec<(&'static str, &'static str, Option<f64>)> {
        let Some(stats) = &self.sharding_stats else {
            return Vec::new();
        };

        let mut series = vec![
            ("sharding_stats", "attempted", stats.attempted),
            ("sharding_stats", "deferred", stats.deferred),
            ("sharding_stats", "diff", stats.diff),
            ("sharding_stats", "diff_capped", stats.diff_capped),
            ("sharding_stats", "empty", stats.empty),
            ("sharding_stats", "failure", stats.failure),
            ("sharding_stats", "hashmatch", stats.hashmatch),
            ("sharding_stats", "no_change", stats.no_change),
            ("sharding_stats", "remote_merge", stats.remote_merge),
            ("sharding_stats", "remove", stats.remove),
            ("sharding_stats", "rsync", stats.rsync),
        ];

        let detail = &stats.sharding;
        let mut push = |name: &'static str, counters: &ShardingCounters, fields: &[&'static str]| {
            for field in fields {
                series.push((name, *field, counters.get(field)));
            }
        };
        push("audit_root", &detail.audit_root, &["attempted", "failure", "success"]);
        push("audit_shard", &detail.audit_shard, &["attempted", "failure", "success"]);
        push(
            "cleaved",
            &detail.cleaved,
            &["attempted", "failure", "max_time", "min_time", "success"],
        );
        push("created", &detail.created, &["attempted", "failure", "success"]);
        push(
            "misplaced",
            &detail.misplaced,
            &["attempted", "failure", "found", "max_time", "min_time", "success"],
        );
        push(
            "scanned",
            &detail.scanned,
            &["attempted", "failure", "found", "max_time", "min_time", "success"],
        );
        push("sharding_candidates", &detail.sharding_candidates, &["found"]);
        push(
            "visited",
            &detail.visited,
            &["attempted", "completed", "failure", "skipped", "success"],
        );
        series
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShardingStats {
    pub attempted: Option<f64>,
    #[serde(alias = "deffered")]
    pub deferred: Option<f64>,
    pub diff: Option<f64>,
    pub diff_capped: Option<f64>,
    pub empty: Option<f64>,
    pub failure: Option<f64>,
    pub hashmatch: Option<f64>,
    pub no_change: Option<f64>,
    pub remote_merge: Option<f64>,
    pub remove: Option<f64>,
    pub rsync: Option<f64>,
    pub sharding: ShardingDetail,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShardingDetail {
    pub audit_root: ShardingCounters,
    pub audit_shard: ShardingCounters,
    pub cleaved: ShardingCounters,
    pub created: ShardingCounters,
    pub misplaced: ShardingCounters,
    pub scanned: ShardingCounters,
    pub sharding_candidates: ShardingCounters,
    #[serde(alias = "visitred")]
    pub visited: ShardingCounters,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShardingCounters {
    pub attempted: Option<f64>,
    pub success: Option<f64>,
    pub failure: Option<f64>,
    pub found: Option<f64>,
    pub placed: Option<f64>,
    pub unplaced: Option<f64>,
    pub max_time: Option<f64>,
    pub min_time: Option<f64>,
    pub top: Option<f64>,
    pub skipped: Option<f64>,
    pub completed: Option<f64>,
}

impl ShardingCounters {
    fn get(&self, field: &str) -> Option<f64> {
        match field {
            "attempted" => self.attempted,
            "success" => self.success,
            "failure" => self.failure,
            "found" => self.found,
            "placed" => self.placed,
            "unplaced" => self.unplaced,
            "max_time" => self.max_time,
            "min_time" => self.min_time,
            "top" => self.top,
            "skipped" => self.skipped,
            "completed" => self.completed,
            _ => None,
        }
    }
}

/// `object.recon`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObjectRecon {
    pub async_pending: Option<f64>,
    pub expired_last_pass: Option<f64>,
    pub replication_stats: ReplicationStats,
    #[serde(rename = "object_auditor_stats_ALL")]
    pub auditor_all: ObjectAuditorStats,
    #[serde(rename = "object_auditor_stats_ZBF")]
    pub auditor_zbf: ObjectAuditorStats,
    pub object_expiration_pass: Option<f64>,
    pub object_reconstruction_last: Option<f64>,
    pub object_reconstruction_time: Option<f64>,
    /// Minutes.
    pub object_replication_time: Option<f64>,
    pub object_replication_per_disk: BTreeMap<String, PerDiskReplication>,
    pub object_updater_sweep: Option<f64>,
    pub replication_last: Option<f64>,
}

impl ObjectRecon {
    pub fn server_series(&self) -> Vec<ServerSeries> {
        let stats = &self.replication_stats;
        let mut series = vec![
            ("server", "async_pending", self.async_pending),
            ("server", "replication_last", self.replication_last),
            ("replicator", "object_replication_time", self.object_replication_time),
            ("replicator", "rsync", stats.rsync),
            ("replicator", "success", stats.success),
            ("replicator", "failure", stats.failure),
            ("replicator", "attempted", stats.attempted),
            ("replicator", "suffixes_checked", stats.hashmatch),
            ("replicator", "start", stats.start),
            ("reconstructor", "object_reconstruction_time", self.object_reconstruction_time),
            ("updater", "object_updater_sweep", self.object_updater_sweep),
        ];
        for (service, auditor) in [("auditor_ALL", &self.auditor_all), ("auditor_ZBF", &self.auditor_zbf)] {
            series.extend([
                (service, "audit_time", auditor.audit_time),
                (service, "byte_processed", auditor.bytes_processed),
                (service, "errors", auditor.errors),
                (service, "passes", auditor.passes),
                (service, "quarantined", auditor.quarantined),
            ]);
        }
        series
    }

    /// `(parts_per_second, time_used_seconds)` for the last replication pass.
    pub fn replication_estimate(&self) -> (Option<f64>, Option<f64>) {
        replication_estimate(self.replication_stats.attempted, self.object_replication_time)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObjectAuditorStats {
    pub audit_time: Option<f64>,
    pub bytes_processed: Option<f64>,
    pub errors: Option<f64>,
    pub passes: Option<f64>,
    pub quarantined: Option<f64>,
}

/// One entry of `object_replication_per_disk`, keyed by drive name.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerDiskReplication {
    pub replication_last: Option<f64>,
    pub replication_stats: PerDiskReplicationStats,
    /// Minutes.
    pub replication_time: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerDiskReplicationStats {
    pub attempted: Option<f64>,
    pub failure: Option<f64>,
    pub hashmatch: Option<f64>,
    pub remove: Option<f64>,
    pub rsync: Option<f64>,
    pub success: Option<f64>,
    pub suffix_count: Option<f64>,
    pub suffix_hash: Option<f64>,
    pub suffix_sync: Option<f64>,
}

impl PerDiskReplication {
    /// `(service_name, metrics_type, value)` triples for
    /// `swift_object_replication_per_disk`.
    pub fn series(&self) -> Vec<ServerSeries> {
        let stats = &self.replication_stats;
        vec![
            ("replicator_per_disk", "rsync", stats.rsync),
            ("replicator_per_disk", "success", stats.success),
            ("replicator_per_disk", "failure", stats.failure),
            ("replicator_per_disk", "attempted", stats.attempted),
            ("replicator_per_disk", "hashmatch", stats.hashmatch),
            ("replicator_per_disk", "remove", stats.remove),
            ("replicator_per_disk", "suffix_count", stats.suffix_count),
            ("replicator_per_disk", "suffix_hash", stats.suffix_hash),
            ("replicator_per_disk", "suffix_sync", stats.suffix_sync),
            ("replicator_per_disk", "replication_last", self.replication_last),
            ("replication_per_disk", "replication_time", self.replication_time),
        ]
    }

    pub fn replication_estimate(&self) -> (Option<f64>, Option<f64>) {
        replication_estimate(self.replication_stats.attempted, self.replication_time)
    }
}

fn replication_estimate(attempted: Option<f64>, minutes: Option<f64>) -> (Option<f64>, Option<f64>) {
    let parts_per_second = attempted
        .zip(minutes)
        .and_then(|(attempted, minutes)| derived::per_second_over_minutes(attempted, minutes));
    let time_used = minutes.and_then(derived::minutes_to_seconds);
    (parts_per_second, time_used)
}
