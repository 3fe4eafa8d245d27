//! Build run
//!
//! Checks the configuration, then scans the source tree into a registry,
//! seeding from and saving the parse snapshot when caching is enabled.

use crate::config::{BuildConfig, ConfigError};
use crate::define::DefineParser;
use crate::planner::EntrySelector;
use crate::registry::ModuleRegistry;
use crate::scan::{ScanError, Scanner};
use crate::snapshot::{ParseSnapshot, SnapshotError};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during a build run
#[derive(Debug, Error)]
pub enum RunError {
    /// Config error
    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Scan error
    #[error("Scan error: {0}")]
    ScanError(#[from] ScanError),

    /// Snapshot error
    #[error("Snapshot error: {0}")]
    SnapshotError(#[from] SnapshotError),
}

/// Where a command's entry modules come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRequest {
    /// The command plans nothing
    NotNeeded,

    /// Names given on the command line
    Explicit(Vec<String>),

    /// `modules.entries` or `modules.entry-pattern`
    Configured,
}

/// A validated configuration, ready to scan
#[derive(Debug)]
pub struct BuildRun {
    config: BuildConfig,
    selector: Option<EntrySelector>,
}

impl BuildRun {
    /// Validate directories and the entry filter
    ///
    /// Nothing is read from the source tree until this succeeds.
    pub fn prepare(config: BuildConfig, request: EntryRequest) -> Result<Self, ConfigError> {
        config.validate_paths()?;
        let selector = match request {
            EntryRequest::NotNeeded => None,
            EntryRequest::Explicit(names) if !names.is_empty() => {
                Some(EntrySelector::Explicit(names))
            }
            EntryRequest::Explicit(_) | EntryRequest::Configured => Some(config.entry_selector()?),
        };
        Ok(Self { config, selector })
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Seed from the snapshot (if enabled), scan, and persist a new snapshot
    pub fn build_registry(&self) -> Result<ModuleRegistry, RunError> {
        let source = self.config.source_dir()?;
        let output = self.config.output_dir()?;
        let mut registry = self.config.registry();

        let snapshot_path = self.config.snapshot_path();
        if let Some(path) = &snapshot_path {
            if let Some(snapshot) = ParseSnapshot::load(path)? {
                snapshot.seed(&mut registry);
            }
        }

        let report = Scanner::new(source, &DefineParser)
            .ignore_dir(output)
            .scan(&mut registry)?;
        if !report.parse_errors.is_empty() {
            warn!("{} file(s) skipped with parse errors", report.parse_errors.len());
        }

        if let Some(path) = &snapshot_path {
            let base = source
                .canonicalize()
                .unwrap_or_else(|_| source.to_path_buf());
            ParseSnapshot::capture(&registry, base.to_string_lossy())?.save(path)?;
        }

        Ok(registry)
    }

    /// Entry modules for `registry`; empty when none were requested
    pub fn entries(&self, registry: &ModuleRegistry) -> Vec<String> {
        self.selector
            .as_ref()
            .map(|selector| selector.select(registry))
            .unwrap_or_default()
    }
}
