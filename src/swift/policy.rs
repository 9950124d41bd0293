//! Storage-policy names from `swift.conf`.
//!
//! Object data for policy 0 lives in `<drive>/objects`, policy N in
//! `<drive>/objects-N`. The policy's human name comes from the
//! `[storage-policy:N]` section of `swift.conf`.

use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

/// Label value used when a directory refers to a policy index that is not
/// declared in `swift.conf`.
pub const UNKNOWN_POLICY: &str = "unknown";

/// Label value used for account and container partitions, which are not
/// tied to a storage policy.
pub const ACCOUNT_AND_CONTAINER: &str = "Account & Container";

static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[\s*(?P<section>[^\]]+?)\s*\]\s*$").expect("valid section pattern"));

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*name\s*=\s*(?P<name>.*?)\s*$").expect("valid name pattern"));

/// Index -> name table parsed once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoragePolicies {
    names: BTreeMap<u32, String>,
}

impl StoragePolicies {
    /// Parses the contents of a `swift.conf` file.
    ///
    /// Sections other than `[storage-policy:N]` are ignored, as are policy
    /// sections without a `name` key.
    pub fn parse(contents: &str) -> Self {
        let mut names = BTreeMap::new();
        let mut current: Option<u32> = None;

        for line in contents.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(caps) = SECTION.captures(line) {
                current = caps["section"]
                    .strip_prefix("storage-policy:")
                    .and_then(|index| index.trim().parse().ok());
                continue;
            }
            if let (Some(index), Some(caps)) = (current, NAME.captures(line)) {
                names.entry(index).or_insert_with(|| caps["name"].to_string());
            }
        }

        Self { names }
    }

    /// Reads and parses `swift.conf`.
    pub async fn load(path: &Path) -> std::io::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Ok(Self::parse(&contents))
    }

    pub fn name(&self, index: u32) -> Option<&str> {
        self.names.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolves an object directory name to its policy name.
    ///
    /// Returns `None` if `dir` is not an object directory at all, and
    /// [`UNKNOWN_POLICY`] if it is one but its index is not declared.
    pub fn resolve_dir(&self, dir: &str) -> Option<&str> {
        let index = policy_index(dir)?;
        Some(self.name(index).unwrap_or(UNKNOWN_POLICY))
    }
}

/// Policy index encoded in an object directory name: `objects` is 0,
/// `objects-N` is N.
pub fn policy_index(dir: &str) -> Option<u32> {
    match dir.strip_prefix("objects")? {
        "" => Some(0),
        suffix => suffix.strip_prefix('-')?.parse().ok(),
    }
}
