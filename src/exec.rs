//! Rebuild executor types
//!
//! The executor walks a plan strictly in ascending level order: siblings
//! within a level have no recorded dependency on each other, but every
//! lower level must have finished before a higher one starts, since higher
//! levels may consume freshly built output. Execution itself lives on
//! [`Store::rebuild`](crate::store::Store::rebuild), which routes each
//! builder result through the save pipeline.
//!
//! One failing entry never aborts the batch; it is recorded and later
//! entries run. An entry depending on a failed build fails in turn when its
//! parent resolution references missing state.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::plan::PlanEntry;
use crate::snapshot::ParentDescriptor;

/// What the builder produced for one artifact
#[derive(Debug, Clone)]
pub struct BuildProduct {
    /// The object to persist
    pub object: serde_json::Value,

    /// Format name (store default when None)
    pub format: Option<String>,

    /// User metadata to record in the sidecar
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Producing code text, hashed into the version identity
    pub code: Option<String>,

    /// Human label for the producing code
    pub code_label: Option<String>,
}

impl BuildProduct {
    /// Product carrying just an object, with store defaults for the rest
    pub fn new(object: serde_json::Value) -> Self {
        Self {
            object,
            format: None,
            metadata: BTreeMap::new(),
            code: None,
            code_label: None,
        }
    }

    /// Attach producing code
    pub fn with_code(mut self, code: impl Into<String>, label: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self.code_label = Some(label.into());
        self
    }
}

/// Error type builders may return
pub type BuildError = Box<dyn std::error::Error + Send + Sync>;

/// User-supplied builder callback.
///
/// Must be a function of its inputs: the artifact path and its parents
/// pinned at their current latest versions.
pub trait Builder {
    fn build(&mut self, path: &str, parents: &[ParentDescriptor])
        -> Result<BuildProduct, BuildError>;
}

impl<F> Builder for F
where
    F: FnMut(&str, &[ParentDescriptor]) -> Result<BuildProduct, BuildError>,
{
    fn build(
        &mut self,
        path: &str,
        parents: &[ParentDescriptor],
    ) -> Result<BuildProduct, BuildError> {
        self(path, parents)
    }
}

/// Explicit path-to-builder mapping, supplied by the caller at rebuild
/// time — no hidden registration state. Keys are normalized artifact paths
/// (see [`Store::normalized`](crate::store::Store::normalized)).
#[derive(Default)]
pub struct BuilderMap {
    builders: BTreeMap<String, Box<dyn Builder>>,
}

impl BuilderMap {
    /// Empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the builder for one artifact path
    pub fn insert(&mut self, path: impl Into<String>, builder: Box<dyn Builder>) -> &mut Self {
        self.builders.insert(path.into(), builder);
        self
    }

    /// Registered paths
    pub fn paths(&self) -> Vec<&str> {
        self.builders.keys().map(|k| k.as_str()).collect()
    }
}

impl Builder for BuilderMap {
    fn build(
        &mut self,
        path: &str,
        parents: &[ParentDescriptor],
    ) -> Result<BuildProduct, BuildError> {
        match self.builders.get_mut(path) {
            Some(builder) => builder.build(path, parents),
            None => Err(format!("no builder registered for {path}").into()),
        }
    }
}

/// Per-entry execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    /// Rebuilt and persisted
    Built,
    /// Builder or save pipeline failed; batch continued
    Failed,
    /// Dry run, or save skipped as unchanged
    Skipped,
}

/// Outcome row for one plan entry
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutcome {
    /// Level the entry ran at
    pub level: u32,

    /// Normalized artifact path
    pub path: String,

    /// What happened
    pub status: ExecStatus,

    /// Human-readable detail (error text for failures)
    pub message: String,

    /// New version id for built entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

/// Order plan entries for execution: ascending level, stable within a level
pub fn execution_order(plan: &[PlanEntry]) -> Vec<&PlanEntry> {
    let mut ordered: Vec<&PlanEntry> = plan.iter().collect();
    ordered.sort_by_key(|e| e.level);
    ordered
}
