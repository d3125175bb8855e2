//! Staleness detection
//!
//! An artifact is stale when any parent pin recorded with its latest version
//! no longer matches that parent's current latest version. An artifact with
//! no recorded parents is never stale. An artifact whose own latest version
//! cannot be resolved needs attention — reported as `Unknown`, distinct from
//! a confirmed-current answer.

use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::StoreResult;
use crate::layout::StoreLayout;
use crate::lineage::LineageIndex;

/// Why one parent pin makes an artifact stale
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleReason {
    /// Upstream artifact path
    pub parent_path: String,

    /// The version pinned when the artifact was last saved
    pub pinned_version_id: String,

    /// The parent's current latest version (None when the parent has no
    /// resolvable version left, e.g. after pruning)
    pub latest_version_id: Option<String>,
}

/// Staleness verdict for one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Staleness {
    /// Every parent pin matches its parent's current latest version
    Current,
    /// At least one parent has moved on (or vanished)
    Stale { reasons: Vec<StaleReason> },
    /// The artifact itself cannot be resolved; needs attention
    Unknown { detail: String },
}

impl Staleness {
    /// Collapse to the boolean question. `Unknown` counts as stale: an
    /// unresolvable artifact needs attention, not silence.
    pub fn is_stale(&self) -> bool {
        !matches!(self, Staleness::Current)
    }
}

/// Staleness queries over catalog + snapshots
#[derive(Debug)]
pub struct StalenessDetector<'a> {
    catalog: &'a Catalog,
    layout: &'a StoreLayout,
}

impl<'a> StalenessDetector<'a> {
    /// Create a detector over the current catalog state
    pub fn new(catalog: &'a Catalog, layout: &'a StoreLayout) -> Self {
        Self { catalog, layout }
    }

    /// Full staleness verdict for a normalized path
    pub fn staleness(&self, path: &str) -> StoreResult<Staleness> {
        if self.catalog.latest(path).is_none() {
            return Ok(Staleness::Unknown {
                detail: format!("no resolvable latest version for {path}"),
            });
        }

        let lineage = LineageIndex::new(self.catalog, self.layout);
        let parents = lineage.latest_parents(path)?;
        if parents.is_empty() {
            return Ok(Staleness::Current);
        }

        let mut reasons = Vec::new();
        for parent in parents {
            let latest = self.catalog.latest(&parent.path).map(|v| v.version_id.clone());
            if latest.as_deref() != Some(parent.version_id.as_str()) {
                reasons.push(StaleReason {
                    parent_path: parent.path,
                    pinned_version_id: parent.version_id,
                    latest_version_id: latest,
                });
            }
        }

        if reasons.is_empty() {
            Ok(Staleness::Current)
        } else {
            Ok(Staleness::Stale { reasons })
        }
    }

    /// Boolean staleness for a normalized path
    pub fn is_stale(&self, path: &str) -> StoreResult<bool> {
        Ok(self.staleness(path)?.is_stale())
    }
}
