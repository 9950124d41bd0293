#![allow(dead_code)]
//! An on-disk Swift storage node laid out in a temporary directory.

use std::path::PathBuf;
use swift_exporter::config::{CollectionIntervals, Config};
use tempfile::TempDir;

pub const ACCOUNT_RECON: &str = r#"{
    "account_audits_passed": 12,
    "account_audits_failed": 0,
    "replication_stats": {"attempted": 60, "success": 58, "failure": 2},
    "replication_time": 30
}"#;

pub const CONTAINER_RECON: &str = r#"{
    "container_audits_passed": 40,
    "replication_stats": {"attempted": 90},
    "replication_time": 45,
    "sharding_stats": {"attempted": 3, "success": 3}
}"#;

pub const OBJECT_RECON: &str = r#"{
    "async_pending": 7,
    "object_replication_time": 2,
    "replication_stats": {"attempted": 120, "success": 118, "failure": 2},
    "object_replication_per_disk": {
        "d1": {"replication_time": 1, "replication_stats": {"attempted": 30, "success": 30}}
    }
}"#;

pub const REPLICATION_PROGRESS: &str = r#"{
    "d1": {
        "accounts": {"primary": 10, "handoff": 1},
        "containers": {"primary": 20, "handoff": 0},
        "objects": {"primary": 100, "handoff": 2},
        "objects-1": {"primary": 300, "handoff": 4},
        "objects-9": {"primary": 5, "handoff": 0}
    }
}"#;

pub const SWIFT_CONF: &str = "\
[swift-hash]
swift_hash_path_suffix = changeme

[storage-policy:0]
name = Gold
default = yes

[storage-policy:1]
name = Silver
";

pub const NODE_UUID: &str = "5d1b3f2e-8a4c-4f6e-9b7a-0c2d4e6f8a1b";

/// A storage node with every input file the collectors read.
pub struct SwiftNode {
    pub dir: TempDir,
}

impl Default for SwiftNode {
    fn default() -> Self {
        Self::new()
    }
}

impl SwiftNode {
    pub fn new() -> Self {
        let node = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        node.write("account.recon", ACCOUNT_RECON);
        node.write("container.recon", CONTAINER_RECON);
        node.write("object.recon", OBJECT_RECON);
        node.write("replication_progress.json", REPLICATION_PROGRESS);
        node.write("swift.conf", SWIFT_CONF);
        node.write("all.log", &"x".repeat(4096));
        node.write("ssnode.conf", &format!("node_uuid = {NODE_UUID}\n"));
        for dir in ["objects", "objects-1", "accounts"] {
            std::fs::create_dir_all(node.drive_root().join("d1").join(dir)).unwrap();
        }
        node
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn drive_root(&self) -> PathBuf {
        self.dir.path().join("node")
    }

    pub fn write(&self, name: &str, contents: &str) {
        std::fs::write(self.path(name), contents).unwrap();
    }

    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.path(name)).unwrap();
    }

    /// A config pointing at this node, serving on an ephemeral port with a
    /// one-second fast cadence.
    pub fn config(&self) -> Config {
        Config {
            swift_log_file: self.path("all.log"),
            swift_config_file: self.path("swift.conf"),
            replication_progress_file: self.path("replication_progress.json"),
            object_recon_file: self.path("object.recon"),
            container_recon_file: self.path("container.recon"),
            account_recon_file: self.path("account.recon"),
            node_config_file: self.path("ssnode.conf"),
            swift_drive_root: self.drive_root(),
            collection_intervals: CollectionIntervals {
                one_minute: 1,
                ..CollectionIntervals::default()
            },
            collector_timeout_seconds: 5,
            self_metrics: false,
            listen_address: "127.0.0.1:0".parse().unwrap(),
            ..Config::default()
        }
    }
}
