//! Collectors driven through the public API against fakes and fixture files.

use std::path::PathBuf;
use std::sync::Arc;
use swift_exporter::{
    collectors::{self, partitions::PartitionCollector, recon::ReconCollector, run_once, Collector, CollectorContext, Outcome},
    config::{Config, Module},
    derived::CpuTimes,
    identity::NodeIdentity,
    registry::MetricRegistry,
    sources::{fake::FakeProbes, CpuSample, DriveKind, FsUsage, Mount},
    swift::{StoragePolicies, SwiftVersion},
};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::fixtures::{SwiftNode, NODE_UUID, SWIFT_CONF};

const FQDN: &str = "storage01.example.com";

fn context(config: Config, fakes: &FakeProbes) -> CollectorContext {
    let registry = Arc::new(MetricRegistry::new());
    collectors::register_all(&registry, &collectors::all()).unwrap();
    CollectorContext {
        registry,
        identity: Arc::new(NodeIdentity::new(FQDN, NODE_UUID)),
        config: Arc::new(config),
        probes: fakes.probes(),
        policies: Arc::new(StoragePolicies::parse(SWIFT_CONF)),
    }
}

fn populate(fakes: &FakeProbes, node: &SwiftNode) {
    let mount_point: PathBuf = node.drive_root().join("d1");
    fakes.system.set_mounts(vec![Mount {
        device: "/dev/sdb1".into(),
        mount_point: mount_point.clone(),
        kind: DriveKind::Hdd,
    }]);
    fakes.system.set_usage(
        &mount_point,
        FsUsage {
            total: 1000,
            used: 250,
            free: 750,
            inodes_total: 100,
            inodes_used: 10,
            inodes_free: 90,
        },
    );
    fakes.system.set_cpus(vec![CpuSample {
        name: "cpu0".into(),
        times: CpuTimes {
            user: 30,
            system: 20,
            idle: 50,
            ..CpuTimes::default()
        },
    }]);
    fakes.system.set_sockets(6000, 4);
    fakes.commands.set_directory_size(mount_point.join("objects"), 10);
    fakes.commands.set_directory_size(mount_point.join("objects-1"), 20);
    fakes.cluster.set_version(Some(SwiftVersion::new(2, 20)));
}

async fn run_all(ctx: &CollectorContext) -> Vec<(&'static str, Outcome)> {
    let mut outcomes = Vec::new();
    for collector in collectors::all() {
        let outcome = run_once(collector.as_ref(), ctx).await.unwrap_or(Outcome::Failure);
        outcomes.push((collector.name(), outcome));
    }
    outcomes
}

#[tokio::test]
async fn test_disabled_modules_do_no_io_and_write_nothing() {
    let node = SwiftNode::new();
    let fakes = FakeProbes::new();
    populate(&fakes, &node);
    let ctx = context(node.config().with_only(&[]), &fakes);

    let outcomes = run_all(&ctx).await;
    assert!(outcomes.iter().all(|(_, outcome)| *outcome == Outcome::Disabled));
    assert_eq!(fakes.total_calls(), 0);
    assert_eq!(ctx.registry.snapshot().total_series(), 0);
}

#[tokio::test]
async fn test_repeated_runs_over_unchanged_inputs_are_idempotent() {
    let node = SwiftNode::new();
    let fakes = FakeProbes::new();
    populate(&fakes, &node);
    let ctx = context(node.config(), &fakes);

    run_all(&ctx).await;
    let first = ctx.registry.snapshot();
    run_all(&ctx).await;
    let second = ctx.registry.snapshot();

    assert!(first.total_series() > 0);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_object_replication_rate_and_per_disk_gating() {
    let node = SwiftNode::new();
    let fakes = FakeProbes::new();
    let ctx = context(node.config(), &fakes);
    let object = ReconCollector::object();
    let per_disk = ["replicator_per_disk", "attempted", "d1", FQDN, NODE_UUID];

    fakes.cluster.set_version(Some(SwiftVersion::new(2, 14)));
    object.collect(&ctx).await.unwrap();
    let snapshot = ctx.registry.snapshot();
    assert_eq!(
        snapshot.value("swift_object_replication_estimate", &["parts_per_second", FQDN, NODE_UUID]),
        Some(1.0)
    );
    assert_eq!(snapshot.value("swift_object_replication_per_disk", &per_disk), None);

    fakes.cluster.set_version(Some("2.20.1".parse().unwrap()));
    object.collect(&ctx).await.unwrap();
    assert_eq!(
        ctx.registry.snapshot().value("swift_object_replication_per_disk", &per_disk),
        Some(30.0)
    );
}

#[tokio::test]
async fn test_partition_policy_names_resolve_from_swift_conf() {
    let node = SwiftNode::new();
    let fakes = FakeProbes::new();
    populate(&fakes, &node);
    let ctx = context(node.config(), &fakes);

    PartitionCollector.collect(&ctx).await.unwrap();
    let snapshot = ctx.registry.snapshot();
    assert_eq!(
        snapshot.value(
            "swift_drive_primary_partitions",
            &[FQDN, NODE_UUID, "d1", "Silver", "objects-1", "HDD"]
        ),
        Some(300.0)
    );
    assert_eq!(
        snapshot.value(
            "swift_drive_primary_partitions",
            &[FQDN, NODE_UUID, "d1", "unknown", "objects-9", "HDD"]
        ),
        Some(5.0)
    );
    assert_eq!(
        snapshot.value(
            "swift_drive_primary_partitions",
            &[FQDN, NODE_UUID, "d1", "Gold", "objects", "HDD"]
        ),
        Some(100.0)
    );
}

#[tokio::test]
async fn test_failed_source_keeps_previous_values() {
    let node = SwiftNode::new();
    let fakes = FakeProbes::new();
    populate(&fakes, &node);
    let ctx = context(node.config().with_only(&[Module::SwiftDiskUsage]), &fakes);
    let usage = collectors::drives::DiskUsageCollector;
    let labels = ["d1", "HDD", "used", FQDN, NODE_UUID];

    assert_eq!(run_once(&usage, &ctx).await.unwrap(), Outcome::Success);
    assert_eq!(ctx.registry.snapshot().value("swift_drive_usage", &labels), Some(250.0));
    assert_eq!(
        ctx.registry
            .snapshot()
            .value("swift_drive_percentage_used", &["d1", FQDN, NODE_UUID]),
        Some(0.25)
    );

    fakes.system.set_failing(true);
    assert!(run_once(&usage, &ctx).await.is_err());
    assert_eq!(ctx.registry.snapshot().value("swift_drive_usage", &labels), Some(250.0));
}

#[tokio::test]
async fn test_missing_recon_file_is_transient() {
    let node = SwiftNode::new();
    let fakes = FakeProbes::new();
    let ctx = context(node.config(), &fakes);
    let account = ReconCollector::account();
    let labels = ["auditor", "passed", FQDN, NODE_UUID];

    account.collect(&ctx).await.unwrap();
    node.remove("account.recon");
    assert!(account.collect(&ctx).await.is_err());
    assert_eq!(ctx.registry.snapshot().value("account_server", &labels), Some(12.0));
}
