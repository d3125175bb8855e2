//! Resolved store layout
//!
//! Maps logical artifact paths to the concrete files the store reads and
//! writes: the catalog, per-artifact sidecars, and per-version snapshot
//! directories. The core never derives directories anywhere else.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/
//!   <artifact files ...>
//!   <artifact>.sidecar.json          (per live artifact)
//!   .strata/
//!     catalog.json
//!     versions/<relative artifact path>/<version_id>/...
//!     versions/ext/<artifact_id>/<version_id>/...   (out-of-root artifacts)
//! ```

use std::path::{Path, PathBuf};

use crate::hash;
use crate::sidecar::SidecarEncoding;

/// Name of the state directory under the store root
pub const STATE_DIR_NAME: &str = ".strata";

/// Catalog file name within the state directory
pub const CATALOG_FILENAME: &str = "catalog.json";

/// Versions subdirectory within the state directory
pub const VERSIONS_DIR_NAME: &str = "versions";

/// Subdirectory for artifacts lying outside the tracked root
pub const EXTERNAL_DIR_NAME: &str = "ext";

/// Resolved paths for one store
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
    state_dir: PathBuf,
}

impl StoreLayout {
    /// Layout rooted at `root`, with state under `<root>/.strata`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = PathBuf::from(hash::normalize_path(&root.into()));
        let state_dir = root.join(STATE_DIR_NAME);
        Self { root, state_dir }
    }

    /// Layout with an explicit state directory
    pub fn with_state_dir(root: impl Into<PathBuf>, state_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state_dir: state_dir.into(),
        }
    }

    /// The tracked root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The state directory holding catalog and versions
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Path of the catalog file
    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir.join(CATALOG_FILENAME)
    }

    /// Root directory of all version snapshots
    pub fn versions_root(&self) -> PathBuf {
        self.state_dir.join(VERSIONS_DIR_NAME)
    }

    /// Resolve a logical artifact path to an absolute, normalized path.
    ///
    /// Relative paths are taken relative to the store root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        PathBuf::from(hash::normalize_path(&absolute))
    }

    /// Normalized string form of a resolved artifact path
    pub fn normalized(&self, path: &Path) -> String {
        hash::normalize_path(&self.resolve(path))
    }

    /// Sidecar file path for an artifact, per encoding.
    ///
    /// `<dir>/a.json` maps to `<dir>/a.json.sidecar.json` and
    /// `<dir>/a.json.sidecar.toml`.
    pub fn sidecar_path(&self, artifact: &Path, encoding: SidecarEncoding) -> PathBuf {
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        artifact.with_file_name(format!("{file_name}.{}", encoding.suffix()))
    }

    /// Directory holding all version snapshots of one artifact.
    ///
    /// In-root artifacts nest under their own root-relative path so distinct
    /// artifacts can never collide. Artifacts outside the tracked root fall
    /// back to `ext/<artifact_id>`; the artifact id is derived from the full
    /// normalized path, which keeps the fallback collision-free.
    pub fn version_root_for(&self, artifact: &Path) -> PathBuf {
        let resolved = self.resolve(artifact);
        match resolved.strip_prefix(&self.root) {
            Ok(rel) => self.versions_root().join(rel),
            Err(_) => {
                let id = hash::artifact_id(&hash::normalize_path(&resolved));
                self.versions_root().join(EXTERNAL_DIR_NAME).join(id)
            }
        }
    }

    /// Directory of one specific version snapshot
    pub fn version_dir(&self, artifact: &Path, version_id: &str) -> PathBuf {
        self.version_root_for(artifact).join(version_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lives_under_state_dir() {
        let layout = StoreLayout::new("/store");
        assert_eq!(
            layout.catalog_path(),
            PathBuf::from("/store/.strata/catalog.json")
        );
    }

    #[test]
    fn test_resolve_relative_paths_against_root() {
        let layout = StoreLayout::new("/store");
        assert_eq!(
            layout.resolve(Path::new("data/a.json")),
            PathBuf::from("/store/data/a.json")
        );
        assert_eq!(
            layout.resolve(Path::new("data/../data/a.json")),
            PathBuf::from("/store/data/a.json")
        );
    }

    #[test]
    fn test_sidecar_path_is_sibling_of_artifact() {
        let layout = StoreLayout::new("/store");
        assert_eq!(
            layout.sidecar_path(Path::new("/store/data/a.json"), SidecarEncoding::Json),
            PathBuf::from("/store/data/a.json.sidecar.json")
        );
        assert_eq!(
            layout.sidecar_path(Path::new("/store/data/a.json"), SidecarEncoding::Toml),
            PathBuf::from("/store/data/a.json.sidecar.toml")
        );
    }

    #[test]
    fn test_version_dir_nests_under_relative_path() {
        let layout = StoreLayout::new("/store");
        assert_eq!(
            layout.version_dir(Path::new("data/a.json"), "v123"),
            PathBuf::from("/store/.strata/versions/data/a.json/v123")
        );
    }

    #[test]
    fn test_out_of_root_artifacts_use_external_fallback() {
        let layout = StoreLayout::new("/store");
        let dir = layout.version_root_for(Path::new("/elsewhere/b.json"));
        assert!(dir.starts_with("/store/.strata/versions/ext/"));

        // Distinct out-of-root artifacts never share a fallback directory.
        let other = layout.version_root_for(Path::new("/elsewhere/c.json"));
        assert_ne!(dir, other);
    }
}
