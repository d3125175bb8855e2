//! Retention engine
//!
//! Applies a keep-policy per artifact over its version history and deletes
//! pruned snapshots plus their catalog rows. Pruning never touches the live
//! artifact file or its sidecar — only historical snapshots.
//!
//! The combined policy keeps a version when it satisfies *either* condition
//! (union, not intersection): among the `n` most recent, or younger than
//! `days`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::VersionRow;
use crate::error::{StoreError, StoreResult};

/// Rule selecting which historical versions survive a prune
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep every version
    KeepAll,
    /// Keep the `n` most recent versions per artifact
    KeepLast { n: u64 },
    /// Keep a version if it is among the `n` most recent OR younger than
    /// `days` (union)
    KeepLastOrWithinDays { n: u64, days: u32 },
}

impl RetentionPolicy {
    /// Validate policy arguments
    pub fn validate(&self) -> StoreResult<()> {
        if let RetentionPolicy::KeepLastOrWithinDays { days: 0, .. } = self {
            return Err(StoreError::PolicyError(
                "retention window must be at least one day; use keep_last for a pure count policy"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// One version considered by a prune call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PruneCandidate {
    /// Normalized artifact path
    pub path: String,

    /// Version scheduled for (or surviving) deletion
    pub version_id: String,

    /// Commit timestamp of the version
    pub created_at: DateTime<Utc>,

    /// Size recorded in the catalog
    pub size_bytes: u64,
}

/// Outcome of a prune call
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    /// Versions selected for deletion (deleted unless `dry_run`)
    pub pruned: Vec<PruneCandidate>,

    /// Bytes reclaimed (estimated in dry-run, from catalog `size_bytes`)
    pub bytes_reclaimed: u64,

    /// Whether this was a dry run
    pub dry_run: bool,

    /// Non-fatal problems encountered (e.g. a snapshot already missing)
    pub warnings: Vec<String>,
}

/// Select the versions of ONE artifact that the policy does not keep.
///
/// `versions` must be sorted newest first, as `Catalog::versions_of`
/// returns them. Pure function; `now` is the time of the prune call.
pub fn select_candidates(
    versions: &[&VersionRow],
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<PruneCandidate> {
    let keep = |index: usize, row: &VersionRow| -> bool {
        match policy {
            RetentionPolicy::KeepAll => true,
            RetentionPolicy::KeepLast { n } => (index as u64) < n,
            RetentionPolicy::KeepLastOrWithinDays { n, days } => {
                (index as u64) < n || now - row.created_at < Duration::days(i64::from(days))
            }
        }
    };

    versions
        .iter()
        .enumerate()
        .filter(|(i, row)| !keep(*i, row))
        .map(|(_, row)| PruneCandidate {
            path: row.path.clone(),
            version_id: row.version_id.clone(),
            created_at: row.created_at,
            size_bytes: row.size_bytes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;
    use crate::sidecar::SidecarFormat;

    fn row(version_id: &str, age_days: i64) -> VersionRow {
        VersionRow {
            version_id: version_id.to_string(),
            artifact_id: hash::artifact_id("/store/a.json"),
            path: "/store/a.json".to_string(),
            content_hash: format!("c-{version_id}"),
            code_hash: None,
            size_bytes: 100,
            created_at: Utc::now() - Duration::days(age_days),
            format: "json".to_string(),
            sidecar_format: SidecarFormat::Json,
        }
    }

    #[test]
    fn test_keep_all_prunes_nothing() {
        let rows = [row("v4", 0), row("v3", 5), row("v2", 10), row("v1", 20)];
        let refs: Vec<&VersionRow> = rows.iter().collect();
        assert!(select_candidates(&refs, RetentionPolicy::KeepAll, Utc::now()).is_empty());
    }

    #[test]
    fn test_keep_last_n_takes_newest_first() {
        let rows = [row("v4", 0), row("v3", 5), row("v2", 10), row("v1", 20)];
        let refs: Vec<&VersionRow> = rows.iter().collect();

        let pruned = select_candidates(&refs, RetentionPolicy::KeepLast { n: 2 }, Utc::now());
        let ids: Vec<&str> = pruned.iter().map(|c| c.version_id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v1"]);
    }

    #[test]
    fn test_union_keeps_either_condition() {
        // v4, v3 within 7 days; v4, v3 also the two most recent; v2, v1 match
        // neither condition.
        let rows = [row("v4", 1), row("v3", 3), row("v2", 10), row("v1", 20)];
        let refs: Vec<&VersionRow> = rows.iter().collect();

        let pruned = select_candidates(
            &refs,
            RetentionPolicy::KeepLastOrWithinDays { n: 2, days: 7 },
            Utc::now(),
        );
        let ids: Vec<&str> = pruned.iter().map(|c| c.version_id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v1"]);
    }

    #[test]
    fn test_union_with_disjoint_subsets() {
        // n=1 selects {v4}; days=7 selects {v4, v3}; union keeps both, so
        // only v2 and v1 are candidates. With n=3 the count condition also
        // rescues v2 even though it is too old.
        let rows = [row("v4", 1), row("v3", 3), row("v2", 10), row("v1", 20)];
        let refs: Vec<&VersionRow> = rows.iter().collect();

        let pruned = select_candidates(
            &refs,
            RetentionPolicy::KeepLastOrWithinDays { n: 1, days: 7 },
            Utc::now(),
        );
        let ids: Vec<&str> = pruned.iter().map(|c| c.version_id.as_str()).collect();
        assert_eq!(ids, vec!["v2", "v1"]);

        let pruned = select_candidates(
            &refs,
            RetentionPolicy::KeepLastOrWithinDays { n: 3, days: 7 },
            Utc::now(),
        );
        let ids: Vec<&str> = pruned.iter().map(|c| c.version_id.as_str()).collect();
        assert_eq!(ids, vec!["v1"]);
    }

    #[test]
    fn test_keep_last_zero_prunes_everything() {
        let rows = [row("v2", 0), row("v1", 5)];
        let refs: Vec<&VersionRow> = rows.iter().collect();

        let pruned = select_candidates(&refs, RetentionPolicy::KeepLast { n: 0 }, Utc::now());
        assert_eq!(pruned.len(), 2);
    }

    #[test]
    fn test_validate_rejects_zero_day_window() {
        let err = RetentionPolicy::KeepLastOrWithinDays { n: 2, days: 0 }
            .validate()
            .unwrap_err();
        assert!(matches!(err, StoreError::PolicyError(_)));
        assert!(RetentionPolicy::KeepLast { n: 0 }.validate().is_ok());
    }
}
