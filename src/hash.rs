//! Identity hashing
//!
//! Derives stable identifiers from paths, serialized content, and producing
//! code. All identifiers are SHA-256 digests truncated to 16 hex characters
//! (64 bits) — sufficient entropy for single-repository scale. This is a
//! documented non-adversarial assumption, not a cryptographic guarantee.
//!
//! Structured values are canonicalized with JCS (RFC 8785) before hashing so
//! equal logical content hashes identically regardless of attribute order.

use std::path::{Component, Path};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{StoreError, StoreResult};

/// Width of every identifier and hash, in hex characters
pub const HASH_LEN: usize = 16;

fn sha256_trunc(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hex::encode(hasher.finalize());
    digest[..HASH_LEN].to_string()
}

/// Normalize a path to a canonical string form.
///
/// Lexical only: resolves `.` and `..` segments and joins components with
/// `/`, so two textual spellings of the same location normalize identically.
/// Does not touch the filesystem.
pub fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut absolute = false;

    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::Prefix(p) => parts.push(p.as_os_str().to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.is_empty() {
                    parts.push("..".to_string());
                } else {
                    parts.pop();
                }
            }
            Component::Normal(seg) => parts.push(seg.to_string_lossy().into_owned()),
        }
    }

    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Derive the artifact identifier from a normalized path string
pub fn artifact_id(normalized_path: &str) -> String {
    sha256_trunc(normalized_path.as_bytes())
}

/// Hash raw serialized bytes
pub fn content_hash(bytes: &[u8]) -> String {
    sha256_trunc(bytes)
}

/// Hash a structured value through JCS canonicalization.
///
/// Attribute order and other representation variance does not affect the
/// result; only logical content does.
pub fn canonical_content_hash<T: Serialize>(value: &T) -> StoreResult<String> {
    let canonical = serde_json_canonicalizer::to_vec(value)
        .map_err(|e| StoreError::corrupt("<canonicalize>", e.to_string()))?;
    Ok(sha256_trunc(&canonical))
}

/// Hash producing code text, with line endings normalized
pub fn code_hash(code: &str) -> String {
    let normalized = code.replace("\r\n", "\n");
    sha256_trunc(normalized.as_bytes())
}

/// Hash the on-disk bytes of a file (external-modification detection)
pub fn file_hash(path: &Path) -> StoreResult<String> {
    let bytes = std::fs::read(path).map_err(|e| StoreError::io("hash file", path, e))?;
    Ok(content_hash(&bytes))
}

/// Derive a version identifier.
///
/// Changes whenever any input changes; the nanosecond timestamp keeps ids
/// distinct across time even for identical content and code.
pub fn version_id(
    artifact_id: &str,
    content_hash: &str,
    code_hash: Option<&str>,
    created_at: &DateTime<Utc>,
) -> String {
    let input = format!(
        "{artifact_id}\n{content_hash}\n{}\n{}",
        code_hash.unwrap_or(""),
        created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
    );
    sha256_trunc(input.as_bytes())
}
