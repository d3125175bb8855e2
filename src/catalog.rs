//! Catalog: the authoritative artifact/version index
//!
//! Two logical tables — one row per artifact, one row per committed version —
//! persisted as a single JSON document. Every mutation re-serializes the
//! whole catalog and atomically replaces the file (temp write + rename), so
//! a concurrent reader sees either the old or the new state, never a partial
//! write.
//!
//! A missing catalog file loads as an empty catalog; an unreadable or
//! malformed one is `CorruptState` and is never silently reset. `repair`
//! exists for the caller who explicitly decides to start over.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::hash;
use crate::sidecar::SidecarFormat;

/// Schema version for catalog.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "strata/catalog@1";

/// One row per logical artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRow {
    /// Hash of the normalized artifact path
    pub artifact_id: String,

    /// Normalized artifact path
    pub path: String,

    /// Version id of the newest committed version
    pub latest_version_id: String,

    /// Number of committed versions currently retained
    pub n_versions: u64,
}

/// One row per committed version snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRow {
    /// Globally unique version id, never reused
    pub version_id: String,

    /// Owning artifact id
    pub artifact_id: String,

    /// Normalized artifact path at commit time
    pub path: String,

    /// Canonical hash of the serialized object
    pub content_hash: String,

    /// Hash of the producing code, if supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<String>,

    /// Size of the artifact file in bytes
    pub size_bytes: u64,

    /// Commit timestamp
    pub created_at: DateTime<Utc>,

    /// Serialization format of the artifact file
    pub format: String,

    /// Which sidecar encodings the snapshot carries
    pub sidecar_format: SidecarFormat,
}

/// Catalog document (catalog.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Artifact table, keyed by artifact id
    artifacts: BTreeMap<String, ArtifactRow>,

    /// Version table, keyed by version id
    versions: BTreeMap<String, VersionRow>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            artifacts: BTreeMap::new(),
            versions: BTreeMap::new(),
        }
    }

    /// Load the catalog from disk.
    ///
    /// An absent file is an empty catalog. A present but unreadable or
    /// malformed file is `CorruptState` — surfaced, never treated as empty.
    pub fn load(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let body =
            fs::read_to_string(path).map_err(|e| StoreError::io("read catalog", path, e))?;
        Self::from_json(&body).map_err(|e| StoreError::corrupt(path, e.to_string()))
    }

    /// Atomically replace the catalog file (temp write + rename)
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| StoreError::io("create state dir", parent, e))?;
        }
        let json = self.to_json()?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)
            .map_err(|e| StoreError::AtomicWriteFailure { path: tmp.clone(), source: e })?;
        fs::rename(&tmp, path)
            .map_err(|e| StoreError::AtomicWriteFailure { path: path.to_path_buf(), source: e })?;
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Insert a version row and refresh its artifact row
    pub fn upsert_version(&mut self, row: VersionRow) {
        let artifact_id = row.artifact_id.clone();
        self.versions.insert(row.version_id.clone(), row);
        self.refresh_artifact(&artifact_id);
    }

    /// Remove version rows and recompute affected artifact rows.
    ///
    /// An artifact whose last version is removed loses its artifact row
    /// entirely; otherwise `latest_version_id` points at the newest
    /// remaining version. Returns the removed rows.
    pub fn remove_versions(&mut self, ids: &[String]) -> Vec<VersionRow> {
        let mut removed = Vec::new();
        for id in ids {
            if let Some(row) = self.versions.remove(id) {
                removed.push(row);
            }
        }

        let affected: Vec<String> = removed.iter().map(|r| r.artifact_id.clone()).collect();
        for artifact_id in affected {
            self.refresh_artifact(&artifact_id);
        }
        removed
    }

    /// Recompute one artifact row from its version rows: newest version
    /// wins the latest pointer, zero versions drops the row
    fn refresh_artifact(&mut self, artifact_id: &str) {
        let mut remaining: Vec<&VersionRow> = self
            .versions
            .values()
            .filter(|v| v.artifact_id == artifact_id)
            .collect();
        if remaining.is_empty() {
            self.artifacts.remove(artifact_id);
            return;
        }
        remaining.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.version_id.cmp(&a.version_id))
        });
        let newest = remaining[0];
        let row = ArtifactRow {
            artifact_id: artifact_id.to_string(),
            path: newest.path.clone(),
            latest_version_id: newest.version_id.clone(),
            n_versions: remaining.len() as u64,
        };
        self.artifacts.insert(artifact_id.to_string(), row);
    }

    /// Latest version row for a normalized path, or None when the artifact
    /// has no versions
    pub fn latest(&self, path: &str) -> Option<&VersionRow> {
        let artifact = self.artifacts.get(&hash::artifact_id(path))?;
        self.versions.get(&artifact.latest_version_id)
    }

    /// All version rows for a normalized path, newest first
    pub fn versions_of(&self, path: &str) -> Vec<&VersionRow> {
        let artifact_id = hash::artifact_id(path);
        let mut rows: Vec<&VersionRow> = self
            .versions
            .values()
            .filter(|v| v.artifact_id == artifact_id)
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.version_id.cmp(&a.version_id))
        });
        rows
    }

    /// Artifact row for a normalized path
    pub fn artifact(&self, path: &str) -> Option<&ArtifactRow> {
        self.artifacts.get(&hash::artifact_id(path))
    }

    /// Version row by version id
    pub fn version(&self, version_id: &str) -> Option<&VersionRow> {
        self.versions.get(version_id)
    }

    /// Normalized paths of all cataloged artifacts
    pub fn paths(&self) -> Vec<String> {
        self.artifacts.values().map(|a| a.path.clone()).collect()
    }

    /// All artifact rows
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactRow> {
        self.artifacts.values()
    }

    /// Total number of version rows
    pub fn n_versions_total(&self) -> usize {
        self.versions.len()
    }

    /// Whether the catalog holds no artifacts
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
