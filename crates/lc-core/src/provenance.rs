//! Provenance and schema descriptors attached to experiment artifacts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Semantic version describing the schema of serialized payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version incremented for breaking changes.
    pub major: u32,
    /// Minor version incremented for additive changes.
    pub minor: u32,
    /// Patch version incremented for bug fixes.
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a new schema version descriptor.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// Provenance recorded in the experiment manifest and run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// Schema of the artifact carrying this record.
    #[serde(default)]
    pub schema: SchemaVersion,
    /// Hash of the resolved experiment configuration.
    pub config_hash: String,
    /// Master deterministic seed used for all shuffles.
    pub seed: u64,
    /// RFC-3339 timestamp recording when the artifact was generated.
    pub created_at: String,
    /// Version map for the tools involved in the run.
    #[serde(default)]
    pub tool_versions: BTreeMap<String, String>,
}

impl RunProvenance {
    /// Builds a provenance record stamped with the current time.
    pub fn now(config_hash: impl Into<String>, seed: u64) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert("lc-core".to_string(), env!("CARGO_PKG_VERSION").to_string());
        Self {
            schema: SchemaVersion::default(),
            config_hash: config_hash.into(),
            seed,
            created_at: chrono::Utc::now().to_rfc3339(),
            tool_versions,
        }
    }
}
