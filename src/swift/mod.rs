//! Swift-specific file formats: recon snapshots, partition progress,
//! storage-policy names and release versions.

pub mod partitions;
pub mod policy;
pub mod recon;
pub mod version;

pub use policy::StoragePolicies;
pub use recon::ReconCapabilities;
pub use version::SwiftVersion;
