//! Store session options
//!
//! Options are an explicit value handed to `Store::open`, never ambient
//! process-global state, so independent stores with different policies can
//! coexist in one process. An optional TOML file supplies defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::retain::RetentionPolicy;
use crate::sidecar::SidecarFormat;

fn default_true() -> bool {
    true
}

fn default_format() -> String {
    "json".to_string()
}

/// Options governing one store session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreOptions {
    /// Commit a version snapshot on every effective save
    #[serde(default = "default_true")]
    pub versioned: bool,

    /// Skip the write entirely when content and code are unchanged
    #[serde(default = "default_true")]
    pub skip_unchanged: bool,

    /// Serialization backend used when a save names no format
    #[serde(default = "default_format")]
    pub default_format: String,

    /// Sidecar encodings written beside each artifact
    #[serde(default)]
    pub sidecar_format: SidecarFormat,

    /// Retention policy applied after each save (None = keep everything)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionPolicy>,

    /// Emit progress lines to stderr
    #[serde(default)]
    pub verbose: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            versioned: true,
            skip_unchanged: true,
            default_format: default_format(),
            sidecar_format: SidecarFormat::default(),
            retention: None,
            verbose: false,
        }
    }
}

impl StoreOptions {
    /// Load options from a TOML file
    pub fn from_toml_file(path: &Path) -> StoreResult<Self> {
        let body =
            fs::read_to_string(path).map_err(|e| StoreError::io("read options", path, e))?;
        toml::from_str(&body).map_err(|e| StoreError::corrupt(path, e.to_string()))
    }

    /// Disable version snapshots
    pub fn unversioned(mut self) -> Self {
        self.versioned = false;
        self
    }

    /// Set the retention policy applied after saves
    pub fn with_retention(mut self, policy: RetentionPolicy) -> Self {
        self.retention = Some(policy);
        self
    }
}
