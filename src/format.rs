//! Serialization backends
//!
//! Backends encode and decode opaque object bytes at a path; the core only
//! hashes their output and never inspects format internals. Backends are
//! selected by name from a caller-supplied registry — no global registration
//! state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// A pluggable object encoder/decoder
pub trait SerializationBackend {
    /// Format name used to select this backend
    fn name(&self) -> &str;

    /// Write the object to `path`. Writes must land at `path` exactly; the
    /// caller handles atomicity by writing to a temporary path and renaming.
    fn write(&self, value: &serde_json::Value, path: &Path) -> StoreResult<()>;

    /// Read the object back from `path`
    fn read(&self, path: &Path) -> StoreResult<serde_json::Value>;
}

/// Pretty-printed JSON backend
#[derive(Debug, Default)]
pub struct JsonBackend;

impl SerializationBackend for JsonBackend {
    fn name(&self) -> &str {
        "json"
    }

    fn write(&self, value: &serde_json::Value, path: &Path) -> StoreResult<()> {
        let body = serde_json::to_string_pretty(value)?;
        fs::write(path, body).map_err(|e| StoreError::io("write artifact", path, e))
    }

    fn read(&self, path: &Path) -> StoreResult<serde_json::Value> {
        let body =
            fs::read_to_string(path).map_err(|e| StoreError::io("read artifact", path, e))?;
        serde_json::from_str(&body).map_err(|e| StoreError::corrupt(path, e.to_string()))
    }
}

/// Backend registry, supplied by the caller at store construction
pub struct FormatRegistry {
    backends: BTreeMap<String, Box<dyn SerializationBackend + Send + Sync>>,
}

impl Default for FormatRegistry {
    /// Registry with the built-in JSON backend
    fn default() -> Self {
        let mut registry = Self {
            backends: BTreeMap::new(),
        };
        registry.register(Box::new(JsonBackend));
        registry
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("formats", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FormatRegistry {
    /// Register a backend under its own name (replacing any previous one)
    pub fn register(&mut self, backend: Box<dyn SerializationBackend + Send + Sync>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Look up a backend by format name
    pub fn get(&self, name: &str) -> StoreResult<&(dyn SerializationBackend + Send + Sync)> {
        self.backends
            .get(name)
            .map(|b| b.as_ref())
            .ok_or_else(|| StoreError::PolicyError(format!("unknown format: {name}")))
    }

    /// Registered format names
    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(|k| k.as_str()).collect()
    }
}
