//! Store session
//!
//! `Store` is the single object a caller constructs to work with one
//! artifact store: it owns the resolved layout, the session options, the
//! serialization backends, and the loaded catalog. All mutating operations
//! route through the save pipeline: hash, skip-unchanged check, atomic
//! artifact write, sidecar write, snapshot commit, catalog update, optional
//! retention.
//!
//! A corrupt catalog makes `open` fail; `repair_catalog` reinitializes it
//! when the caller explicitly decides history is lost.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::catalog::{Catalog, VersionRow};
use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::exec::{execution_order, Builder, ExecOutcome, ExecStatus};
use crate::format::FormatRegistry;
use crate::hash;
use crate::layout::StoreLayout;
use crate::lineage::{LineageIndex, LineageRow};
use crate::plan::{PlanEntry, PlanMode, RebuildPlanner};
use crate::retain::{select_candidates, PruneCandidate, PruneReport, RetentionPolicy};
use crate::sidecar::SidecarRecord;
use crate::snapshot::{ParentDescriptor, SnapshotStore};
use crate::stale::{Staleness, StalenessDetector};

/// Everything a save may carry besides the object itself
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    /// Serialization format name (store default when None)
    pub format: Option<String>,

    /// Producing code text, hashed into the version identity
    pub code: Option<String>,

    /// Human label for the producing code
    pub code_label: Option<String>,

    /// Arbitrary user metadata recorded in the sidecar
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Primary-key column set recorded in the sidecar
    pub primary_key: Vec<String>,

    /// Upstream artifact paths, each pinned to its current latest version
    /// at commit time
    pub parents: Vec<String>,
}

impl SaveRequest {
    /// Declare upstream dependencies by path
    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    /// Attach producing code
    pub fn with_code(mut self, code: impl Into<String>, label: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self.code_label = Some(label.into());
        self
    }

    /// Select a serialization format by name
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// What a save did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new version was committed
    Saved { version_id: String },
    /// Content and code were unchanged; nothing was written
    Skipped { version_id: String },
}

impl SaveOutcome {
    /// The version id the artifact now points at
    pub fn version_id(&self) -> &str {
        match self {
            SaveOutcome::Saved { version_id } | SaveOutcome::Skipped { version_id } => version_id,
        }
    }

    /// Whether the save was skipped as unchanged
    pub fn was_skipped(&self) -> bool {
        matches!(self, SaveOutcome::Skipped { .. })
    }
}

/// How to pick a version when reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// The current latest version (the live file)
    Latest,
    /// `n` versions before latest (0 = latest)
    Offset(usize),
    /// A literal version id
    ExactId(String),
    /// Delegate the choice to a caller-supplied chooser
    Interactive,
}

/// Caller-supplied chooser for `VersionSpec::Interactive`; receives the
/// artifact's versions newest first and returns the chosen version id
pub type VersionChooser<'a> = dyn Fn(&[VersionRow]) -> Option<String> + 'a;

/// One open artifact store
pub struct Store {
    layout: StoreLayout,
    options: StoreOptions,
    formats: FormatRegistry,
    catalog: Catalog,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.layout.root())
            .field("artifacts", &self.catalog.paths().len())
            .finish()
    }
}

impl Store {
    /// Open the store rooted at `root`, loading its catalog.
    ///
    /// A corrupt catalog file fails here with `CorruptState` and keeps
    /// failing until the caller runs [`Store::repair_catalog`].
    pub fn open(root: impl Into<PathBuf>, options: StoreOptions) -> StoreResult<Self> {
        Self::open_with(StoreLayout::new(root), options, FormatRegistry::default())
    }

    /// Open with an explicit layout and backend registry
    pub fn open_with(
        layout: StoreLayout,
        options: StoreOptions,
        formats: FormatRegistry,
    ) -> StoreResult<Self> {
        let catalog = Catalog::load(&layout.catalog_path())?;
        Ok(Self {
            layout,
            options,
            formats,
            catalog,
        })
    }

    /// Reinitialize the catalog of the store at `root` to empty.
    ///
    /// This is the explicit repair path for a corrupt catalog: it discards
    /// the index (version history on disk is left behind, orphaned) and is
    /// never invoked automatically.
    pub fn repair_catalog(root: impl Into<PathBuf>) -> StoreResult<()> {
        let layout = StoreLayout::new(root);
        Catalog::new().save(&layout.catalog_path())
    }

    /// Session options
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// The loaded catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The resolved layout
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Normalized string form of an artifact path
    pub fn normalized(&self, path: impl AsRef<Path>) -> String {
        self.layout.normalized(path.as_ref())
    }

    /// Save an object as the new live state of `path`.
    ///
    /// Runs the full pipeline: canonical content hash, skip-unchanged
    /// check, parent pin resolution, atomic artifact write, sidecar write,
    /// snapshot commit, catalog replace, optional retention. Either every
    /// file and catalog row lands, or none do.
    pub fn save(
        &mut self,
        path: impl AsRef<Path>,
        value: &serde_json::Value,
        request: SaveRequest,
    ) -> StoreResult<SaveOutcome> {
        let abs = self.layout.resolve(path.as_ref());
        let norm = hash::normalize_path(&abs);
        let artifact_id = hash::artifact_id(&norm);

        let content_hash = hash::canonical_content_hash(value)?;
        let code_hash = request.code.as_deref().map(hash::code_hash);

        if self.options.skip_unchanged {
            if let Some(latest) = self.catalog.latest(&norm) {
                if latest.content_hash == content_hash && latest.code_hash == code_hash {
                    return Ok(SaveOutcome::Skipped {
                        version_id: latest.version_id.clone(),
                    });
                }
            }
        }

        // Resolve parent pins before any write so a bad reference fails
        // with prior state untouched.
        let mut parents = Vec::new();
        for parent in &request.parents {
            let parent_norm = self.layout.normalized(Path::new(parent));
            let latest = self.catalog.latest(&parent_norm).ok_or(StoreError::NotFound {
                what: "parent version",
                path: parent_norm.clone(),
            })?;
            parents.push(ParentDescriptor {
                path: parent_norm,
                version_id: latest.version_id.clone(),
            });
        }

        let format = request
            .format
            .clone()
            .unwrap_or_else(|| self.options.default_format.clone());

        if let Some(dir) = abs.parent() {
            fs::create_dir_all(dir).map_err(|e| StoreError::io("create artifact dir", dir, e))?;
        }

        // Atomic artifact write: backend writes a temporary sibling, then
        // rename replaces the live file.
        let file_name = abs.file_name().ok_or(StoreError::NotFound {
            what: "artifact file name",
            path: norm.clone(),
        })?;
        let tmp = abs.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));
        let backend = self.formats.get(&format)?;
        backend.write(value, &tmp)?;
        fs::rename(&tmp, &abs).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::AtomicWriteFailure {
                path: abs.clone(),
                source: e,
            }
        })?;

        let created_at = Utc::now();
        let version_id = hash::version_id(&artifact_id, &content_hash, code_hash.as_deref(), &created_at);
        let size_bytes = fs::metadata(&abs)
            .map_err(|e| StoreError::io("stat artifact", &abs, e))?
            .len();
        let file_hash = hash::file_hash(&abs)?;

        let record = SidecarRecord {
            schema_version: crate::sidecar::SCHEMA_VERSION,
            schema_id: crate::sidecar::SCHEMA_ID.to_string(),
            path: norm.clone(),
            version_id: version_id.clone(),
            content_hash: content_hash.clone(),
            code_hash: code_hash.clone(),
            file_hash,
            primary_key: request.primary_key.clone(),
            metadata: request.metadata.clone(),
            format: format.clone(),
            created_at,
        };
        record.write(&self.layout, &abs, self.options.sidecar_format)?;

        if self.options.versioned {
            let snapshots = SnapshotStore::new(&self.layout);
            snapshots.commit(&abs, &version_id, &parents, self.options.sidecar_format)?;

            self.catalog.upsert_version(VersionRow {
                version_id: version_id.clone(),
                artifact_id,
                path: norm.clone(),
                content_hash,
                code_hash,
                size_bytes,
                created_at,
                format,
                sidecar_format: self.options.sidecar_format,
            });
            self.catalog.save(&self.layout.catalog_path())?;

            if let Some(policy) = self.options.retention {
                self.prune_normalized(&[norm.clone()], policy, false)?;
            }
        }

        if self.options.verbose {
            eprintln!("[strata] saved {norm} as {version_id}");
        }

        Ok(SaveOutcome::Saved { version_id })
    }

    /// Read an artifact at a version
    pub fn read(&self, path: impl AsRef<Path>, spec: &VersionSpec) -> StoreResult<serde_json::Value> {
        self.read_with_chooser(path, spec, None)
    }

    /// Read with an interactive chooser collaborator available
    pub fn read_with_chooser(
        &self,
        path: impl AsRef<Path>,
        spec: &VersionSpec,
        chooser: Option<&VersionChooser<'_>>,
    ) -> StoreResult<serde_json::Value> {
        let abs = self.layout.resolve(path.as_ref());
        let norm = hash::normalize_path(&abs);

        if *spec == VersionSpec::Latest {
            if !abs.exists() {
                return Err(StoreError::NotFound {
                    what: "artifact",
                    path: norm,
                });
            }
            let format = self
                .catalog
                .latest(&norm)
                .map(|v| v.format.clone())
                .unwrap_or_else(|| self.options.default_format.clone());
            return self.formats.get(&format)?.read(&abs);
        }

        let version_id = self.resolve_version(&abs, spec, chooser)?;
        let row = self.catalog.version(&version_id).ok_or(StoreError::NotFound {
            what: "version",
            path: version_id.clone(),
        })?;
        let version_dir = self.layout.version_dir(&abs, &version_id);
        let file_name = abs.file_name().ok_or(StoreError::NotFound {
            what: "artifact file name",
            path: norm,
        })?;
        let object_path = version_dir.join(file_name);
        self.formats.get(&row.format)?.read(&object_path)
    }

    /// Resolve a version spec to a concrete version id.
    ///
    /// Pure over the catalog: no I/O happens before resolution, and
    /// `Interactive` is the only variant that consults the chooser.
    pub fn resolve_version(
        &self,
        path: impl AsRef<Path>,
        spec: &VersionSpec,
        chooser: Option<&VersionChooser<'_>>,
    ) -> StoreResult<String> {
        let norm = self.layout.normalized(path.as_ref());
        let versions = self.catalog.versions_of(&norm);
        if versions.is_empty() {
            return Err(StoreError::NotFound {
                what: "artifact",
                path: norm,
            });
        }

        match spec {
            VersionSpec::Latest => Ok(versions[0].version_id.clone()),
            VersionSpec::Offset(n) => versions
                .get(*n)
                .map(|v| v.version_id.clone())
                .ok_or(StoreError::NotFound {
                    what: "version",
                    path: format!("{norm} at offset {n}"),
                }),
            VersionSpec::ExactId(id) => versions
                .iter()
                .find(|v| v.version_id == *id)
                .map(|v| v.version_id.clone())
                .ok_or(StoreError::NotFound {
                    what: "version",
                    path: format!("{norm} version {id}"),
                }),
            VersionSpec::Interactive => {
                let chooser = chooser.ok_or_else(|| {
                    StoreError::PolicyError(
                        "interactive version selection needs a chooser".to_string(),
                    )
                })?;
                let rows: Vec<VersionRow> = versions.iter().map(|v| (*v).clone()).collect();
                chooser(&rows).ok_or(StoreError::NotFound {
                    what: "version",
                    path: format!("{norm} (no interactive choice)"),
                })
            }
        }
    }

    /// All versions of an artifact, newest first
    pub fn versions(&self, path: impl AsRef<Path>) -> Vec<VersionRow> {
        let norm = self.layout.normalized(path.as_ref());
        self.catalog
            .versions_of(&norm)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Full staleness verdict for an artifact
    pub fn staleness(&self, path: impl AsRef<Path>) -> StoreResult<Staleness> {
        let norm = self.layout.normalized(path.as_ref());
        StalenessDetector::new(&self.catalog, &self.layout).staleness(&norm)
    }

    /// Boolean staleness for an artifact
    pub fn is_stale(&self, path: impl AsRef<Path>) -> StoreResult<bool> {
        Ok(self.staleness(path)?.is_stale())
    }

    /// Descendants of an artifact (see [`LineageIndex::children_of`])
    pub fn children_of(
        &self,
        path: impl AsRef<Path>,
        version_id: Option<&str>,
        depth: Option<u32>,
    ) -> StoreResult<Vec<LineageRow>> {
        let norm = self.layout.normalized(path.as_ref());
        LineageIndex::new(&self.catalog, &self.layout).children_of(&norm, version_id, depth)
    }

    /// Ancestors of an artifact (see [`LineageIndex::lineage_of`])
    pub fn lineage_of(
        &self,
        path: impl AsRef<Path>,
        depth: Option<u32>,
    ) -> StoreResult<Vec<LineageRow>> {
        let norm = self.layout.normalized(path.as_ref());
        LineageIndex::new(&self.catalog, &self.layout).lineage_of(&norm, depth)
    }

    /// Compute a rebuild plan for changed or target artifacts
    pub fn plan<P: AsRef<Path>>(
        &self,
        targets: &[P],
        depth: Option<u32>,
        include_targets: bool,
        mode: PlanMode,
    ) -> StoreResult<Vec<PlanEntry>> {
        let normalized: Vec<String> = targets
            .iter()
            .map(|p| self.layout.normalized(p.as_ref()))
            .collect();
        RebuildPlanner::new(&self.catalog, &self.layout).plan(
            &normalized,
            depth,
            include_targets,
            mode,
        )
    }

    /// Execute a rebuild plan in ascending level order.
    ///
    /// Each entry's recorded parents are re-pinned at their current latest
    /// versions and handed to the builder; the result persists through the
    /// save pipeline. A failing entry is recorded and the batch continues;
    /// entries whose parents failed earlier in this batch fail in turn.
    /// With `dry_run` nothing is invoked or written — the report shows what
    /// would happen.
    pub fn rebuild(
        &mut self,
        plan: &[PlanEntry],
        builder: &mut dyn Builder,
        dry_run: bool,
    ) -> StoreResult<Vec<ExecOutcome>> {
        let mut outcomes: Vec<ExecOutcome> = Vec::new();
        let mut failed_paths: Vec<String> = Vec::new();

        let ordered: Vec<PlanEntry> = execution_order(plan).into_iter().cloned().collect();
        for entry in ordered {
            if dry_run {
                outcomes.push(ExecOutcome {
                    level: entry.level,
                    path: entry.path.clone(),
                    status: ExecStatus::Skipped,
                    message: "dry run: would rebuild".to_string(),
                    version_id: None,
                });
                continue;
            }

            let parents = match self.current_parents(&entry.path, &failed_paths) {
                Ok(parents) => parents,
                Err(e) => {
                    failed_paths.push(entry.path.clone());
                    outcomes.push(ExecOutcome {
                        level: entry.level,
                        path: entry.path.clone(),
                        status: ExecStatus::Failed,
                        message: e.to_string(),
                        version_id: None,
                    });
                    continue;
                }
            };

            let product = match builder.build(&entry.path, &parents) {
                Ok(product) => product,
                Err(e) => {
                    failed_paths.push(entry.path.clone());
                    outcomes.push(ExecOutcome {
                        level: entry.level,
                        path: entry.path.clone(),
                        status: ExecStatus::Failed,
                        message: StoreError::BuilderFailure {
                            path: entry.path.clone(),
                            detail: e.to_string(),
                        }
                        .to_string(),
                        version_id: None,
                    });
                    continue;
                }
            };

            let request = SaveRequest {
                format: product.format,
                code: product.code,
                code_label: product.code_label,
                metadata: product.metadata,
                primary_key: Vec::new(),
                parents: parents.iter().map(|p| p.path.clone()).collect(),
            };
            match self.save(Path::new(&entry.path), &product.object, request) {
                Ok(SaveOutcome::Saved { version_id }) => outcomes.push(ExecOutcome {
                    level: entry.level,
                    path: entry.path.clone(),
                    status: ExecStatus::Built,
                    message: "built".to_string(),
                    version_id: Some(version_id),
                }),
                Ok(SaveOutcome::Skipped { version_id }) => outcomes.push(ExecOutcome {
                    level: entry.level,
                    path: entry.path.clone(),
                    status: ExecStatus::Skipped,
                    message: "unchanged".to_string(),
                    version_id: Some(version_id),
                }),
                Err(e) => {
                    failed_paths.push(entry.path.clone());
                    outcomes.push(ExecOutcome {
                        level: entry.level,
                        path: entry.path.clone(),
                        status: ExecStatus::Failed,
                        message: e.to_string(),
                        version_id: None,
                    });
                }
            }
        }

        Ok(outcomes)
    }

    /// Recorded parents of `path`, re-pinned at their current latest
    /// versions; fails when a parent failed earlier in this batch or has
    /// no resolvable version
    fn current_parents(
        &self,
        path: &str,
        failed_paths: &[String],
    ) -> StoreResult<Vec<ParentDescriptor>> {
        let lineage = LineageIndex::new(&self.catalog, &self.layout);
        let recorded = lineage.latest_parents(path)?;
        let mut current = Vec::new();
        for parent in recorded {
            if failed_paths.contains(&parent.path) {
                return Err(StoreError::BuilderFailure {
                    path: path.to_string(),
                    detail: format!("upstream build failed: {}", parent.path),
                });
            }
            let latest = self.catalog.latest(&parent.path).ok_or(StoreError::NotFound {
                what: "parent version",
                path: parent.path.clone(),
            })?;
            current.push(ParentDescriptor {
                path: parent.path,
                version_id: latest.version_id.clone(),
            });
        }
        Ok(current)
    }

    /// Prune version history per the policy.
    ///
    /// `paths = None` prunes every cataloged artifact. Dry runs report
    /// candidates and an estimated byte count without deleting anything.
    /// Live artifact files and sidecars are never touched.
    pub fn prune<P: AsRef<Path>>(
        &mut self,
        paths: Option<&[P]>,
        policy: RetentionPolicy,
        dry_run: bool,
    ) -> StoreResult<PruneReport> {
        let targets: Vec<String> = match paths {
            Some(paths) => paths
                .iter()
                .map(|p| self.layout.normalized(p.as_ref()))
                .collect(),
            None => self.catalog.paths(),
        };
        self.prune_normalized(&targets, policy, dry_run)
    }

    /// Prune every cataloged artifact
    pub fn prune_all(&mut self, policy: RetentionPolicy, dry_run: bool) -> StoreResult<PruneReport> {
        let targets = self.catalog.paths();
        self.prune_normalized(&targets, policy, dry_run)
    }

    fn prune_normalized(
        &mut self,
        targets: &[String],
        policy: RetentionPolicy,
        dry_run: bool,
    ) -> StoreResult<PruneReport> {
        policy.validate()?;
        let now = Utc::now();

        let mut candidates: Vec<PruneCandidate> = Vec::new();
        for path in targets {
            let versions = self.catalog.versions_of(path);
            candidates.extend(select_candidates(&versions, policy, now));
        }

        let mut report = PruneReport {
            dry_run,
            ..Default::default()
        };

        if dry_run {
            report.bytes_reclaimed = candidates.iter().map(|c| c.size_bytes).sum();
            report.pruned = candidates;
            return Ok(report);
        }

        let snapshots = SnapshotStore::new(&self.layout);
        let mut removed_ids = Vec::new();
        for candidate in &candidates {
            match snapshots.remove(Path::new(&candidate.path), &candidate.version_id) {
                Ok(()) => report.bytes_reclaimed += candidate.size_bytes,
                Err(e) => report.warnings.push(format!(
                    "snapshot {} of {} not removed: {e}",
                    candidate.version_id, candidate.path
                )),
            }
            removed_ids.push(candidate.version_id.clone());
        }

        if !removed_ids.is_empty() {
            self.catalog.remove_versions(&removed_ids);
            self.catalog.save(&self.layout.catalog_path())?;
        }

        if self.options.verbose && !candidates.is_empty() {
            eprintln!(
                "[strata] pruned {} versions ({} bytes)",
                candidates.len(),
                report.bytes_reclaimed
            );
        }

        report.pruned = candidates;
        Ok(report)
    }

    /// Check the live artifact file against its sidecar's recorded file
    /// hash; false means the file was modified outside the store
    pub fn verify(&self, path: impl AsRef<Path>) -> StoreResult<bool> {
        let abs = self.layout.resolve(path.as_ref());
        let record = SidecarRecord::load(&self.layout, &abs)?;
        Ok(hash::file_hash(&abs)? == record.file_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Store {
        Store::open(dir.path(), StoreOptions::default()).unwrap()
    }

    #[test]
    fn test_save_creates_artifact_sidecar_snapshot_catalog() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        let outcome = store
            .save("data/a.json", &json!({"x": 1}), SaveRequest::default())
            .unwrap();
        let version_id = outcome.version_id().to_string();

        assert!(dir.path().join("data/a.json").exists());
        assert!(dir.path().join("data/a.json.sidecar.json").exists());
        assert!(dir
            .path()
            .join(format!(".strata/versions/data/a.json/{version_id}"))
            .exists());
        assert_eq!(
            store.versions("data/a.json")[0].version_id,
            version_id
        );
    }

    #[test]
    fn test_idempotent_save_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        let first = store
            .save("a.json", &json!({"x": 1}), SaveRequest::default())
            .unwrap();
        let second = store
            .save("a.json", &json!({"x": 1}), SaveRequest::default())
            .unwrap();

        assert!(!first.was_skipped());
        assert!(second.was_skipped());
        assert_eq!(second.version_id(), first.version_id());
        assert_eq!(store.versions("a.json").len(), 1);
    }

    #[test]
    fn test_changed_code_defeats_skip() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store
            .save(
                "a.json",
                &json!({"x": 1}),
                SaveRequest::default().with_code("f()", "build.R"),
            )
            .unwrap();
        let outcome = store
            .save(
                "a.json",
                &json!({"x": 1}),
                SaveRequest::default().with_code("g()", "build.R"),
            )
            .unwrap();

        assert!(!outcome.was_skipped());
        assert_eq!(store.versions("a.json").len(), 2);
    }

    #[test]
    fn test_version_ids_are_unique_per_save() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        let mut seen = std::collections::HashSet::new();
        for i in 0..5 {
            let outcome = store
                .save("a.json", &json!({"x": i}), SaveRequest::default())
                .unwrap();
            assert!(seen.insert(outcome.version_id().to_string()));
        }
        assert_eq!(store.versions("a.json").len(), 5);
    }

    #[test]
    fn test_save_with_missing_parent_fails_clean() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        let err = store
            .save(
                "b.json",
                &json!({"x": 1}),
                SaveRequest::default().with_parents(["ghost.json"]),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!dir.path().join("b.json").exists());
        assert!(store.versions("b.json").is_empty());
    }

    #[test]
    fn test_read_latest_and_offsets() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store.save("a.json", &json!({"x": 1}), SaveRequest::default()).unwrap();
        store.save("a.json", &json!({"x": 2}), SaveRequest::default()).unwrap();
        store.save("a.json", &json!({"x": 3}), SaveRequest::default()).unwrap();

        assert_eq!(store.read("a.json", &VersionSpec::Latest).unwrap()["x"], 3);
        assert_eq!(store.read("a.json", &VersionSpec::Offset(0)).unwrap()["x"], 3);
        assert_eq!(store.read("a.json", &VersionSpec::Offset(1)).unwrap()["x"], 2);
        assert_eq!(store.read("a.json", &VersionSpec::Offset(2)).unwrap()["x"], 1);

        let err = store.read("a.json", &VersionSpec::Offset(3)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn test_read_exact_id() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        let v1 = store
            .save("a.json", &json!({"x": 1}), SaveRequest::default())
            .unwrap()
            .version_id()
            .to_string();
        store.save("a.json", &json!({"x": 2}), SaveRequest::default()).unwrap();

        let value = store.read("a.json", &VersionSpec::ExactId(v1)).unwrap();
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn test_interactive_needs_chooser() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.save("a.json", &json!({"x": 1}), SaveRequest::default()).unwrap();

        let err = store.read("a.json", &VersionSpec::Interactive).unwrap_err();
        assert!(matches!(err, StoreError::PolicyError(_)));

        let chooser = |rows: &[VersionRow]| Some(rows[rows.len() - 1].version_id.clone());
        let value = store
            .read_with_chooser("a.json", &VersionSpec::Interactive, Some(&chooser))
            .unwrap();
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let version_id;
        {
            let mut store = open(&dir);
            version_id = store
                .save("a.json", &json!({"x": 1}), SaveRequest::default())
                .unwrap()
                .version_id()
                .to_string();
        }

        let store = open(&dir);
        assert_eq!(store.versions("a.json")[0].version_id, version_id);
    }

    #[test]
    fn test_corrupt_catalog_fails_open_until_repaired() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = open(&dir);
            store.save("a.json", &json!({"x": 1}), SaveRequest::default()).unwrap();
        }

        let catalog_path = dir.path().join(".strata/catalog.json");
        fs::write(&catalog_path, "{ broken").unwrap();

        let err = Store::open(dir.path(), StoreOptions::default()).unwrap_err();
        assert!(matches!(err, StoreError::CorruptState { .. }));

        Store::repair_catalog(dir.path()).unwrap();
        let store = open(&dir);
        assert!(store.catalog().is_empty());
    }

    #[test]
    fn test_unversioned_store_writes_no_snapshots() {
        let dir = TempDir::new().unwrap();
        let mut store =
            Store::open(dir.path(), StoreOptions::default().unversioned()).unwrap();

        store.save("a.json", &json!({"x": 1}), SaveRequest::default()).unwrap();

        assert!(dir.path().join("a.json").exists());
        assert!(store.versions("a.json").is_empty());
        assert!(!dir.path().join(".strata/versions").exists());
    }

    #[test]
    fn test_verify_detects_external_modification() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.save("a.json", &json!({"x": 1}), SaveRequest::default()).unwrap();

        assert!(store.verify("a.json").unwrap());

        fs::write(dir.path().join("a.json"), "tampered").unwrap();
        assert!(!store.verify("a.json").unwrap());
    }

    #[test]
    fn test_retention_applied_on_save() {
        let dir = TempDir::new().unwrap();
        let options = StoreOptions::default()
            .with_retention(RetentionPolicy::KeepLast { n: 2 });
        let mut store = Store::open(dir.path(), options).unwrap();

        for i in 0..4 {
            store.save("a.json", &json!({"x": i}), SaveRequest::default()).unwrap();
        }

        assert_eq!(store.versions("a.json").len(), 2);
    }
}
