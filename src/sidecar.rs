//! Sidecar metadata store
//!
//! The sidecar is the small metadata record living beside each live artifact
//! file: current content/code/file hashes, primary key, user metadata, and
//! format name. It always reflects the latest version; historical copies are
//! carried inside each version snapshot.
//!
//! A sidecar may be persisted in one or both of two parallel encodings
//! (JSON, TOML); readers prefer JSON and fall back to TOML.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;

/// Schema version for sidecar records
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "strata/sidecar@1";

/// Which sidecar encodings are present for an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SidecarFormat {
    /// No sidecar written (unversioned scratch artifacts)
    None,
    /// JSON encoding only
    #[default]
    Json,
    /// TOML encoding only
    Toml,
    /// Both encodings in parallel
    Both,
}

impl SidecarFormat {
    /// The concrete encodings this format selects
    pub fn encodings(&self) -> &'static [SidecarEncoding] {
        match self {
            SidecarFormat::None => &[],
            SidecarFormat::Json => &[SidecarEncoding::Json],
            SidecarFormat::Toml => &[SidecarEncoding::Toml],
            SidecarFormat::Both => &[SidecarEncoding::Json, SidecarEncoding::Toml],
        }
    }

    /// Whether the given encoding is part of this format
    pub fn has(&self, encoding: SidecarEncoding) -> bool {
        self.encodings().contains(&encoding)
    }
}

/// One concrete sidecar encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarEncoding {
    Json,
    Toml,
}

impl SidecarEncoding {
    /// File suffix appended to the artifact file name
    pub fn suffix(&self) -> &'static str {
        match self {
            SidecarEncoding::Json => "sidecar.json",
            SidecarEncoding::Toml => "sidecar.toml",
        }
    }
}

/// Sidecar record (one per live artifact)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarRecord {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Normalized artifact path this record describes
    pub path: String,

    /// Version id of the latest committed version
    pub version_id: String,

    /// Canonical hash of the serialized object
    pub content_hash: String,

    /// Hash of the producing code, if supplied at save time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<String>,

    /// Hash of the on-disk artifact bytes (detects external modification)
    pub file_hash: String,

    /// Primary-key column set, if declared
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,

    /// Arbitrary user metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Serialization format name of the artifact file
    pub format: String,

    /// When the latest version was committed
    pub created_at: DateTime<Utc>,
}

impl SidecarRecord {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Write atomically beside the artifact, one file per requested encoding
    pub fn write(
        &self,
        layout: &StoreLayout,
        artifact: &Path,
        format: SidecarFormat,
    ) -> StoreResult<()> {
        for encoding in format.encodings() {
            let path = layout.sidecar_path(artifact, *encoding);
            let body = match encoding {
                SidecarEncoding::Json => self.to_json()?,
                SidecarEncoding::Toml => toml::to_string_pretty(self)
                    .map_err(|e| StoreError::corrupt(&path, e.to_string()))?,
            };
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, body)
                .map_err(|e| StoreError::AtomicWriteFailure { path: tmp.clone(), source: e })?;
            fs::rename(&tmp, &path)
                .map_err(|e| StoreError::AtomicWriteFailure { path, source: e })?;
        }
        Ok(())
    }

    /// Load the sidecar for an artifact.
    ///
    /// Prefers the JSON encoding, falls back to TOML. Absent sidecars are
    /// `NotFound`; present but malformed ones are `CorruptState`.
    pub fn load(layout: &StoreLayout, artifact: &Path) -> StoreResult<Self> {
        let json_path = layout.sidecar_path(artifact, SidecarEncoding::Json);
        if json_path.exists() {
            let body = fs::read_to_string(&json_path)
                .map_err(|e| StoreError::io("read sidecar", &json_path, e))?;
            return Self::from_json(&body)
                .map_err(|e| StoreError::corrupt(&json_path, e.to_string()));
        }

        let toml_path = layout.sidecar_path(artifact, SidecarEncoding::Toml);
        if toml_path.exists() {
            let body = fs::read_to_string(&toml_path)
                .map_err(|e| StoreError::io("read sidecar", &toml_path, e))?;
            return toml::from_str(&body)
                .map_err(|e| StoreError::corrupt(&toml_path, e.to_string()));
        }

        Err(StoreError::NotFound {
            what: "sidecar",
            path: artifact.display().to_string(),
        })
    }

    /// Whether any sidecar encoding exists for the artifact
    pub fn exists(layout: &StoreLayout, artifact: &Path) -> bool {
        layout.sidecar_path(artifact, SidecarEncoding::Json).exists()
            || layout.sidecar_path(artifact, SidecarEncoding::Toml).exists()
    }

    /// Remove all sidecar encodings for the artifact
    pub fn delete(layout: &StoreLayout, artifact: &Path) -> StoreResult<()> {
        for encoding in [SidecarEncoding::Json, SidecarEncoding::Toml] {
            let path = layout.sidecar_path(artifact, encoding);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| StoreError::io("delete sidecar", &path, e))?;
            }
        }
        Ok(())
    }
}
