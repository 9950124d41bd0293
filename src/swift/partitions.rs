//! The replication progress snapshot: drive -> data directory -> partition counts.
//!
//! ```json
//! {"d1": {"accounts": {"primary": 10, "handoff": 0},
//!         "objects-1": {"primary": 310, "handoff": 4}}}
//! ```

use crate::swift::policy::{StoragePolicies, ACCOUNT_AND_CONTAINER};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PartCounts {
    pub primary: Option<f64>,
    pub handoff: Option<f64>,
}

/// Partition counts per data directory for one drive.
pub type DrivePartitions = BTreeMap<String, PartCounts>;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ReplicationProgress {
    pub drives: BTreeMap<String, DrivePartitions>,
}

impl ReplicationProgress {
    pub fn parse(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn drive(&self, label: &str) -> Option<&DrivePartitions> {
        self.drives.get(label)
    }
}

/// How a data directory is labeled on the partition gauges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRole {
    /// `storage_policy` label: a policy name, or "Account & Container".
    pub storage_policy: String,
    /// `swift_role` label: `account`, `container`, or the object directory name.
    pub swift_role: String,
}

/// Classifies a data directory. Returns `None` for directories that do not
/// hold partitions (`tmp`, `lost+found`, ...).
pub fn classify_dir(dir: &str, policies: &StoragePolicies) -> Option<PartitionRole> {
    let (storage_policy, swift_role) = match dir {
        "accounts" => (ACCOUNT_AND_CONTAINER.to_string(), "account".to_string()),
        "containers" => (ACCOUNT_AND_CONTAINER.to_string(), "container".to_string()),
        _ => (policies.resolve_dir(dir)?.to_string(), dir.to_string()),
    };
    Some(PartitionRole {
        storage_policy,
        swift_role,
    })
}
