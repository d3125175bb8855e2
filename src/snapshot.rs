//! Version snapshot store
//!
//! One directory per committed version, holding a copy of the artifact
//! bytes, its sidecar encoding(s), and a parents document pinning exact
//! upstream versions. The whole set is staged in a temporary sibling
//! directory and renamed into place as the final step, so a reader never
//! observes a snapshot with the artifact but without its parents document,
//! or vice versa.
//!
//! Committed snapshots are immutable; only the retention engine deletes
//! them.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;
use crate::sidecar::SidecarFormat;

/// Schema version for parents.json
pub const PARENTS_SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const PARENTS_SCHEMA_ID: &str = "strata/parents@1";

/// File name of the parents document within a snapshot
pub const PARENTS_FILENAME: &str = "parents.json";

/// A pinned reference to one exact upstream version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentDescriptor {
    /// Normalized path of the upstream artifact
    pub path: String,

    /// The upstream version id pinned at save time
    pub version_id: String,
}

/// Parents document (parents.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParentsDoc {
    schema_version: u32,
    schema_id: String,
    parents: Vec<ParentDescriptor>,
}

/// Per-version snapshot store
#[derive(Debug)]
pub struct SnapshotStore<'a> {
    layout: &'a StoreLayout,
}

impl<'a> SnapshotStore<'a> {
    /// Create a snapshot store over a layout
    pub fn new(layout: &'a StoreLayout) -> Self {
        Self { layout }
    }

    /// Commit a snapshot of the artifact's current live state.
    ///
    /// Stages artifact copy, sidecar copies, and the parents document in a
    /// temporary sibling directory, then renames it to the final
    /// `version_id` directory. On any failure the stage directory is removed
    /// and prior state is untouched.
    pub fn commit(
        &self,
        artifact: &Path,
        version_id: &str,
        parents: &[ParentDescriptor],
        sidecar_format: SidecarFormat,
    ) -> StoreResult<PathBuf> {
        let artifact = self.layout.resolve(artifact);
        let final_dir = self.layout.version_dir(&artifact, version_id);
        let parent_dir = final_dir
            .parent()
            .ok_or_else(|| StoreError::io(
                "resolve version dir",
                &final_dir,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent directory"),
            ))?
            .to_path_buf();
        let stage_dir = parent_dir.join(format!(".{version_id}.tmp"));

        let result = self.stage(&artifact, &stage_dir, parents, sidecar_format);
        if let Err(e) = result {
            let _ = fs::remove_dir_all(&stage_dir);
            return Err(e);
        }

        fs::rename(&stage_dir, &final_dir).map_err(|e| {
            let _ = fs::remove_dir_all(&stage_dir);
            StoreError::AtomicWriteFailure { path: final_dir.clone(), source: e }
        })?;

        Ok(final_dir)
    }

    fn stage(
        &self,
        artifact: &Path,
        stage_dir: &Path,
        parents: &[ParentDescriptor],
        sidecar_format: SidecarFormat,
    ) -> StoreResult<()> {
        fs::create_dir_all(stage_dir)
            .map_err(|e| StoreError::io("create snapshot stage", stage_dir, e))?;

        let file_name = artifact.file_name().ok_or_else(|| StoreError::NotFound {
            what: "artifact file name",
            path: artifact.display().to_string(),
        })?;
        fs::copy(artifact, stage_dir.join(file_name))
            .map_err(|e| StoreError::io("copy artifact into snapshot", artifact, e))?;

        for encoding in sidecar_format.encodings() {
            let sidecar = self.layout.sidecar_path(artifact, *encoding);
            if sidecar.exists() {
                let sidecar_name = sidecar.file_name().unwrap_or_default();
                fs::copy(&sidecar, stage_dir.join(sidecar_name))
                    .map_err(|e| StoreError::io("copy sidecar into snapshot", &sidecar, e))?;
            }
        }

        // Versions without ancestry carry no parents document at all.
        if !parents.is_empty() {
            let doc = ParentsDoc {
                schema_version: PARENTS_SCHEMA_VERSION,
                schema_id: PARENTS_SCHEMA_ID.to_string(),
                parents: parents.to_vec(),
            };
            let json = serde_json::to_string_pretty(&doc)?;
            let parents_path = stage_dir.join(PARENTS_FILENAME);
            fs::write(&parents_path, json)
                .map_err(|e| StoreError::io("write parents document", &parents_path, e))?;
        }

        Ok(())
    }

    /// Read the artifact bytes stored in a snapshot directory
    pub fn read_object(version_dir: &Path, file_name: &str) -> StoreResult<Vec<u8>> {
        let path = version_dir.join(file_name);
        fs::read(&path).map_err(|e| StoreError::io("read snapshot object", &path, e))
    }

    /// Read the parents list of a snapshot.
    ///
    /// A missing parents document is an empty list — not every version
    /// declares ancestry. A malformed one is `CorruptState`.
    pub fn read_parents(version_dir: &Path) -> StoreResult<Vec<ParentDescriptor>> {
        let path = version_dir.join(PARENTS_FILENAME);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let body =
            fs::read_to_string(&path).map_err(|e| StoreError::io("read parents", &path, e))?;
        let doc: ParentsDoc =
            serde_json::from_str(&body).map_err(|e| StoreError::corrupt(&path, e.to_string()))?;
        Ok(doc.parents)
    }

    /// Whether the snapshot directory for a version exists
    pub fn exists(&self, artifact: &Path, version_id: &str) -> bool {
        self.layout.version_dir(artifact, version_id).exists()
    }

    /// Delete a version's snapshot directory (retention only)
    pub fn remove(&self, artifact: &Path, version_id: &str) -> StoreResult<()> {
        let dir = self.layout.version_dir(artifact, version_id);
        fs::remove_dir_all(&dir).map_err(|e| StoreError::io("remove snapshot", &dir, e))
    }
}
