//! Swift release versions as reported by the cluster `/info` endpoint.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid Swift version '{0}'")]
pub struct VersionError(pub String);

/// A `major.minor` Swift release. Patch and pre-release suffixes are ignored,
/// so `2.20.1` and `2.20.0.dev12` both compare as `2.20`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwiftVersion {
    pub major: u32,
    pub minor: u32,
}

impl SwiftVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Returns `true` if this version is `threshold` or newer.
    pub fn at_least(&self, threshold: SwiftVersion) -> bool {
        *self >= threshold
    }
}

impl FromStr for SwiftVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('v');
        let mut parts = trimmed.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| VersionError(s.to_string()))?;
        let minor = match parts.next() {
            Some(p) => leading_number(p).ok_or_else(|| VersionError(s.to_string()))?,
            None => 0,
        };
        Ok(Self { major, minor })
    }
}

/// Parses the leading digits of a version component (`"15rc1"` -> 15).
fn leading_number(part: &str) -> Option<u32> {
    let end = part
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(part.len(), |(i, _)| i);
    part[..end].parse().ok()
}

impl fmt::Display for SwiftVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl<'de> Deserialize<'de> for SwiftVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for SwiftVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
