//! Parse snapshot (.cache.json)
//!
//! Serialized copy of the registry's file and module maps, written after a
//! scan and used to seed the registry on the next run.

use crate::registry::{FileEntry, Module, ModuleRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Snapshot format version
pub const SNAPSHOT_VERSION: &str = "1.0";

/// Snapshot file name inside the output directory
pub const SNAPSHOT_FILE_NAME: &str = ".cache.json";

/// Errors that can occur during snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Failed to read or write the snapshot file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The registry comes from an interrupted scan
    #[error("refusing to snapshot a partially scanned registry")]
    PartialRegistry,
}

/// Registry state as persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParseSnapshot {
    /// Snapshot format version
    pub format_version: String,

    /// Absolute source directory the snapshot was taken from
    pub base_path: String,

    /// Files by project-relative path
    #[serde(default)]
    pub files: BTreeMap<String, SnapshotFile>,

    /// Modules by id
    #[serde(default)]
    pub modules: BTreeMap<String, SnapshotModule>,
}

/// A file entry in the snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotFile {
    /// Ids of the modules defined in the file
    #[serde(default)]
    pub modules: Vec<String>,

    /// Content hash (hex-encoded)
    #[serde(default)]
    pub hash: String,
}

/// A module entry in the snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotModule {
    /// Declared dependency ids
    #[serde(default)]
    pub deps: Vec<String>,

    /// Defining file
    pub file: String,
}

impl ParseSnapshot {
    /// Create an empty snapshot for `base_path`
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            format_version: SNAPSHOT_VERSION.to_string(),
            base_path: base_path.into(),
            files: BTreeMap::new(),
            modules: BTreeMap::new(),
        }
    }

    /// Capture the current state of `registry`
    pub fn capture(
        registry: &ModuleRegistry,
        base_path: impl Into<String>,
    ) -> Result<Self, SnapshotError> {
        if registry.is_partial() {
            return Err(SnapshotError::PartialRegistry);
        }

        let mut snapshot = Self::new(base_path);
        for file in registry.files() {
            snapshot.files.insert(
                file.path.clone(),
                SnapshotFile {
                    modules: file.defined_module_ids.clone(),
                    hash: file.content_hash.clone(),
                },
            );
        }
        for module in registry.modules() {
            snapshot.modules.insert(
                module.id.clone(),
                SnapshotModule {
                    deps: module.dependency_ids.clone(),
                    file: module.file_id.clone(),
                },
            );
        }
        Ok(snapshot)
    }

    /// Load a snapshot from a file
    ///
    /// Returns `Ok(None)` when the file is missing, malformed, or written
    /// by a different format version.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match Self::from_str(&content) {
            Ok(snapshot) if snapshot.format_version == SNAPSHOT_VERSION => Ok(Some(snapshot)),
            Ok(snapshot) => {
                debug!(
                    found = %snapshot.format_version,
                    expected = SNAPSHOT_VERSION,
                    "ignoring snapshot with other format version"
                );
                Ok(None)
            }
            Err(e) => {
                debug!(error = %e, "ignoring unreadable snapshot");
                Ok(None)
            }
        }
    }

    /// Parse a snapshot from a JSON string
    pub fn from_str(content: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot to a file
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Copy the snapshot's files and modules into `registry`
    pub fn seed(&self, registry: &mut ModuleRegistry) {
        for (path, file) in &self.files {
            registry.insert_file(FileEntry {
                path: path.clone(),
                content_hash: file.hash.clone(),
                defined_module_ids: file.modules.clone(),
            });
        }
        for (id, module) in &self.modules {
            registry.insert_module(Module {
                id: id.clone(),
                dependency_ids: module.deps.clone(),
                file_id: module.file.clone(),
            });
        }
        debug!(
            files = self.files.len(),
            modules = self.modules.len(),
            "seeded registry from snapshot"
        );
    }
}
