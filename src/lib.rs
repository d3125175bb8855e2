//! strata-store - content-addressed artifact store for data pipelines
//!
//! Persists arbitrary serialized objects with provenance metadata, keeps a
//! full version history per artifact, tracks parent/child dependencies
//! between artifacts, detects staleness against upstream changes, and plans
//! and executes dependency-ordered rebuilds.
//!
//! The entry point is [`Store`]: one session object per store, constructed
//! with explicit [`StoreOptions`] so independent stores coexist in one
//! process.

pub mod catalog;
pub mod config;
pub mod error;
pub mod exec;
pub mod format;
pub mod hash;
pub mod layout;
pub mod lineage;
pub mod plan;
pub mod retain;
pub mod sidecar;
pub mod snapshot;
pub mod stale;
pub mod store;

pub use catalog::{ArtifactRow, Catalog, VersionRow};
pub use config::StoreOptions;
pub use error::{StoreError, StoreResult};
pub use exec::{BuildProduct, Builder, BuilderMap, ExecOutcome, ExecStatus};
pub use format::{FormatRegistry, JsonBackend, SerializationBackend};
pub use layout::StoreLayout;
pub use lineage::{LineageIndex, LineageRow};
pub use plan::{PlanEntry, PlanMode, RebuildPlanner};
pub use retain::{PruneReport, RetentionPolicy};
pub use sidecar::{SidecarFormat, SidecarRecord};
pub use snapshot::{ParentDescriptor, SnapshotStore};
pub use stale::{StaleReason, Staleness, StalenessDetector};
pub use store::{SaveOutcome, SaveRequest, Store, VersionSpec};
