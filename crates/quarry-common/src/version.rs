//! Schema versions for serialized reports and configs.

use serde::{Deserialize, Serialize};

/// Version stamped on serialized damage reports and pipeline configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when old readers can no longer parse the data
    pub major: u16,
    /// Bumped for added fields
    pub minor: u16,
    /// Bumped for fixes that keep the layout
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Current damage report format version.
    pub const DAMAGE_REPORT: Self = Self::new(1, 0, 0);

    /// Current pipeline config format version.
    pub const PIPELINE_CONFIG: Self = Self::new(1, 0, 0);

    /// Data written under another minor or patch of the same major is
    /// readable. A major bump is not.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
