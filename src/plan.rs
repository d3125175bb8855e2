//! Rebuild planner
//!
//! Computes the ordered, leveled set of artifacts to rebuild after a change.
//! Two modes:
//!
//! - `Propagate` (default): breadth-first over the dependency graph with a
//!   will-change set, so transitive effects reach artifacts whose parents
//!   have not actually been rebuilt yet.
//! - `Strict`: only artifacts already stale against their parents' present
//!   latest versions; no forward propagation.
//!
//! An artifact reachable at several levels is kept at the lowest level it
//! was first discovered, which preserves topological execution order.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;
use crate::lineage::LineageIndex;
use crate::stale::StalenessDetector;

/// Planning algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Propagate changes forward through not-yet-rebuilt intermediates
    #[default]
    Propagate,
    /// Only artifacts currently stale against present parent versions
    Strict,
}

/// One artifact scheduled for rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    /// BFS distance from the nearest changed target (0 = the target itself)
    pub level: u32,

    /// Normalized artifact path
    pub path: String,

    /// Why this artifact is in the plan
    pub reason: String,

    /// The artifact's latest version id before rebuilding (for later
    /// comparison)
    pub latest_version_before: Option<String>,
}

/// Rebuild planning over catalog + snapshots
#[derive(Debug)]
pub struct RebuildPlanner<'a> {
    catalog: &'a Catalog,
    layout: &'a StoreLayout,
}

impl<'a> RebuildPlanner<'a> {
    /// Create a planner over the current catalog state
    pub fn new(catalog: &'a Catalog, layout: &'a StoreLayout) -> Self {
        Self { catalog, layout }
    }

    /// Compute a rebuild plan for the given normalized target paths.
    ///
    /// `depth` bounds the number of BFS levels (`None` = until closure).
    /// `include_targets` inserts targets that are themselves stale at level 0.
    pub fn plan(
        &self,
        targets: &[String],
        depth: Option<u32>,
        include_targets: bool,
        mode: PlanMode,
    ) -> StoreResult<Vec<PlanEntry>> {
        if targets.is_empty() {
            return Err(StoreError::PolicyError(
                "rebuild plan needs at least one target".to_string(),
            ));
        }
        if depth == Some(0) {
            return Err(StoreError::PolicyError(
                "plan depth must be at least 1".to_string(),
            ));
        }

        let parent_map = self.parent_map()?;
        let detector = StalenessDetector::new(self.catalog, self.layout);

        let mut entries: Vec<PlanEntry> = Vec::new();
        let mut planned: HashSet<String> = HashSet::new();

        if include_targets {
            for target in targets {
                if planned.contains(target) {
                    continue;
                }
                if detector.is_stale(target)? {
                    planned.insert(target.clone());
                    entries.push(PlanEntry {
                        level: 0,
                        path: target.clone(),
                        reason: "target is stale".to_string(),
                        latest_version_before: self.latest_id(target),
                    });
                }
            }
        }

        // The will-change set doubles as the reachability frontier. In
        // propagate mode every reached artifact is planned; in strict mode
        // reachability still expands through current intermediates, but only
        // artifacts already stale against present parent versions get an
        // entry.
        let mut will_change: HashSet<String> = targets.iter().cloned().collect();
        let mut level: u32 = 1;

        loop {
            if let Some(d) = depth {
                if level > d {
                    break;
                }
            }

            let mut discovered: Vec<(String, Vec<String>)> = Vec::new();
            for (path, parents) in &parent_map {
                if will_change.contains(path) {
                    continue;
                }
                let changed: Vec<String> = parents
                    .iter()
                    .filter(|p| will_change.contains(*p))
                    .cloned()
                    .collect();
                if !changed.is_empty() {
                    discovered.push((path.clone(), changed));
                }
            }

            if discovered.is_empty() {
                break;
            }

            for (path, changed) in discovered {
                will_change.insert(path.clone());
                let include = match mode {
                    PlanMode::Propagate => true,
                    PlanMode::Strict => detector.is_stale(&path)?,
                };
                if include && planned.insert(path.clone()) {
                    entries.push(PlanEntry {
                        level,
                        path: path.clone(),
                        reason: format!("parent changed: {}", changed.join(", ")),
                        latest_version_before: self.latest_id(&path),
                    });
                }
            }
            level += 1;
        }

        Ok(entries)
    }

    fn latest_id(&self, path: &str) -> Option<String> {
        self.catalog.latest(path).map(|v| v.version_id.clone())
    }

    /// Immediate parents of every cataloged artifact's latest version
    fn parent_map(&self) -> StoreResult<BTreeMap<String, Vec<String>>> {
        let lineage = LineageIndex::new(self.catalog, self.layout);
        let mut map = BTreeMap::new();
        for artifact in self.catalog.artifacts() {
            let parents: Vec<String> = lineage
                .latest_parents(&artifact.path)?
                .into_iter()
                .map(|p| p.path)
                .collect();
            map.insert(artifact.path.clone(), parents);
        }
        Ok(map)
    }
}
