//! Lineage index
//!
//! Derives the dependency graph from the parents documents committed with
//! each artifact's latest version, and answers descendant (`children_of`)
//! and ancestor (`lineage_of`) queries by breadth-first traversal.
//!
//! Both walks carry a visited set. A traversal that reaches its own starting
//! artifact again has found a data anomaly and stops with `CycleDetected`
//! rather than hanging; plain duplicate references are skipped.

use std::collections::HashSet;

use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;
use crate::snapshot::{ParentDescriptor, SnapshotStore};

/// One parent/child edge discovered by a traversal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageRow {
    /// Downstream artifact path
    pub child_path: String,

    /// The child version holding the pin
    pub child_version_id: String,

    /// Upstream artifact path
    pub parent_path: String,

    /// The exact upstream version pinned by the child
    pub parent_version_id: String,

    /// BFS distance from the queried artifact (1 = immediate)
    pub depth: u32,
}

/// Read-only lineage queries over catalog + snapshots
#[derive(Debug)]
pub struct LineageIndex<'a> {
    catalog: &'a Catalog,
    layout: &'a StoreLayout,
}

impl<'a> LineageIndex<'a> {
    /// Create a lineage index over the current catalog state
    pub fn new(catalog: &'a Catalog, layout: &'a StoreLayout) -> Self {
        Self { catalog, layout }
    }

    /// Parents recorded with an artifact's latest version.
    ///
    /// An artifact with no latest version, or whose snapshot was pruned,
    /// contributes no ancestry.
    pub fn latest_parents(&self, path: &str) -> StoreResult<Vec<ParentDescriptor>> {
        let Some(latest) = self.catalog.latest(path) else {
            return Ok(Vec::new());
        };
        let version_dir = self
            .layout
            .version_dir(std::path::Path::new(path), &latest.version_id);
        if !version_dir.exists() {
            return Ok(Vec::new());
        }
        SnapshotStore::read_parents(&version_dir)
    }

    /// All edges of the dependency graph (one per parent descriptor across
    /// all latest versions)
    fn all_edges(&self) -> StoreResult<Vec<LineageRow>> {
        let mut edges = Vec::new();
        for artifact in self.catalog.artifacts() {
            for parent in self.latest_parents(&artifact.path)? {
                edges.push(LineageRow {
                    child_path: artifact.path.clone(),
                    child_version_id: artifact.latest_version_id.clone(),
                    parent_path: parent.path,
                    parent_version_id: parent.version_id,
                    depth: 0,
                });
            }
        }
        Ok(edges)
    }

    /// Descendants of an artifact, breadth-first.
    ///
    /// `version_id` restricts the first hop to children pinning that exact
    /// upstream version. `depth` bounds the expansion; `None` walks until no
    /// new artifacts are discovered.
    pub fn children_of(
        &self,
        path: &str,
        version_id: Option<&str>,
        depth: Option<u32>,
    ) -> StoreResult<Vec<LineageRow>> {
        validate_depth(depth)?;
        let edges = self.all_edges()?;

        let mut rows: Vec<LineageRow> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(path.to_string());

        let mut frontier: Vec<String> = vec![path.to_string()];
        let mut level: u32 = 1;

        while !frontier.is_empty() && depth.map_or(true, |d| level <= d) {
            let mut next: Vec<String> = Vec::new();
            for edge in &edges {
                if !frontier.contains(&edge.parent_path) {
                    continue;
                }
                if level == 1 {
                    if let Some(pin) = version_id {
                        if edge.parent_version_id != pin {
                            continue;
                        }
                    }
                }
                if edge.child_path == path {
                    return Err(StoreError::CycleDetected {
                        path: path.to_string(),
                    });
                }
                if !visited.insert(edge.child_path.clone()) {
                    continue;
                }
                rows.push(LineageRow {
                    depth: level,
                    ..edge.clone()
                });
                next.push(edge.child_path.clone());
            }
            frontier = next;
            level += 1;
        }

        Ok(rows)
    }

    /// Ancestors of an artifact, walking recorded parents of successive
    /// latest versions upward
    pub fn lineage_of(&self, path: &str, depth: Option<u32>) -> StoreResult<Vec<LineageRow>> {
        validate_depth(depth)?;

        let mut rows: Vec<LineageRow> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(path.to_string());

        let mut frontier: Vec<String> = vec![path.to_string()];
        let mut level: u32 = 1;

        while !frontier.is_empty() && depth.map_or(true, |d| level <= d) {
            let mut next: Vec<String> = Vec::new();
            for child in &frontier {
                let child_version = self
                    .catalog
                    .latest(child)
                    .map(|v| v.version_id.clone())
                    .unwrap_or_default();
                for parent in self.latest_parents(child)? {
                    if parent.path == path {
                        return Err(StoreError::CycleDetected {
                            path: path.to_string(),
                        });
                    }
                    if !visited.insert(parent.path.clone()) {
                        continue;
                    }
                    rows.push(LineageRow {
                        child_path: child.clone(),
                        child_version_id: child_version.clone(),
                        parent_path: parent.path.clone(),
                        parent_version_id: parent.version_id.clone(),
                        depth: level,
                    });
                    next.push(parent.path);
                }
            }
            frontier = next;
            level += 1;
        }

        Ok(rows)
    }
}

fn validate_depth(depth: Option<u32>) -> StoreResult<()> {
    if depth == Some(0) {
        return Err(StoreError::PolicyError(
            "traversal depth must be at least 1".to_string(),
        ));
    }
    Ok(())
}
