//! Build configuration (amdgraph.toml)
//!
//! Provides structures and parsing for the build configuration file.

use crate::planner::{EntrySelector, PlannerOptions, DEFAULT_SHARED_BUNDLE, DEFAULT_THRESHOLD};
use crate::registry::{AliasTable, ModuleRegistry, ReservedNames};
use crate::snapshot::SNAPSHOT_FILE_NAME;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "amdgraph.toml";

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Source directory missing or not a directory
    #[error("Source directory does not exist: {0}")]
    MissingSourceDir(PathBuf),

    /// Output directory not configured
    #[error("Output directory not set")]
    MissingOutputDir,

    /// Neither an entry list nor an entry pattern was configured
    #[error("No entry modules configured (set modules.entries or modules.entry-pattern)")]
    MissingEntryFilter,

    /// Validation error
    #[error("Invalid config: {0}")]
    ValidationError(String),
}

/// Build configuration (amdgraph.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    /// Source and output locations
    #[serde(default)]
    pub build: BuildSection,

    /// Module resolution settings
    #[serde(default)]
    pub modules: ModulesSection,

    /// Shared bundle settings
    #[serde(default)]
    pub bundle: BundleSection,
}

/// `[build]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildSection {
    /// Source tree to scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Directory bundles and the snapshot are written to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Persist a parse snapshot in the output directory
    #[serde(default)]
    pub cache: bool,

    /// Log filter (e.g. "debug", "amdgraph=trace")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,

    /// Command run on every emitted bundle, `{input}` and `{output}` substituted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<String>,
}

/// `[modules]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ModulesSection {
    /// Extra reserved names
    #[serde(default)]
    pub reserve: Vec<String>,

    /// Explicit entry modules
    #[serde(default)]
    pub entries: Vec<String>,

    /// Page-module filter: module ids matching this regex are entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_pattern: Option<String>,

    /// Alias name → module id
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// `[bundle]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct BundleSection {
    /// Shared bundle name (default: "r.core")
    #[serde(default = "default_shared_name")]
    pub shared_name: String,

    /// File always placed first in the shared bundle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinned_file: Option<String>,

    /// Promotion threshold (default: 0.5)
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_shared_name() -> String {
    DEFAULT_SHARED_BUNDLE.to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for BundleSection {
    fn default() -> Self {
        Self {
            shared_name: default_shared_name(),
            pinned_file: None,
            threshold: default_threshold(),
        }
    }
}

impl BuildConfig {
    /// Parse a config from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a config from a string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: BuildConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate values that do not touch the filesystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.bundle.threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "bundle.threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.bundle.shared_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "bundle.shared-name cannot be empty".to_string(),
            ));
        }

        if let Some(pattern) = &self.modules.entry_pattern {
            Regex::new(pattern).map_err(|e| {
                ConfigError::ValidationError(format!("Invalid entry-pattern: {}", e))
            })?;
        }

        for (alias, target) in &self.modules.aliases {
            if alias.is_empty() || target.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Alias '{}' -> '{}' has an empty side",
                    alias, target
                )));
            }
        }

        Ok(())
    }

    /// Source directory; must exist
    pub fn source_dir(&self) -> Result<&Path, ConfigError> {
        match &self.build.source {
            Some(dir) if dir.is_dir() => Ok(dir),
            Some(dir) => Err(ConfigError::MissingSourceDir(dir.clone())),
            None => Err(ConfigError::MissingSourceDir(PathBuf::new())),
        }
    }

    /// Output directory; must be configured
    pub fn output_dir(&self) -> Result<&Path, ConfigError> {
        self.build
            .output
            .as_deref()
            .ok_or(ConfigError::MissingOutputDir)
    }

    /// Check both directories before any scanning begins
    pub fn validate_paths(&self) -> Result<(), ConfigError> {
        self.source_dir()?;
        self.output_dir()?;
        Ok(())
    }

    /// Snapshot location when caching is enabled
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        if !self.build.cache {
            return None;
        }
        self.build
            .output
            .as_ref()
            .map(|dir| dir.join(SNAPSHOT_FILE_NAME))
    }

    /// Empty registry carrying the configured aliases and reserved names
    pub fn registry(&self) -> ModuleRegistry {
        let aliases: AliasTable = self.modules.aliases.clone().into_iter().collect();
        let reserved = ReservedNames::with_extra(self.modules.reserve.iter().cloned());
        ModuleRegistry::new(aliases, reserved)
    }

    pub fn planner_options(&self) -> PlannerOptions {
        PlannerOptions {
            threshold: self.bundle.threshold,
            shared_bundle_name: self.bundle.shared_name.clone(),
            pinned_entry_file: self.bundle.pinned_file.clone(),
        }
    }

    /// How to pick entry modules; explicit entries win over the pattern
    pub fn entry_selector(&self) -> Result<EntrySelector, ConfigError> {
        if !self.modules.entries.is_empty() {
            return Ok(EntrySelector::Explicit(self.modules.entries.clone()));
        }
        match &self.modules.entry_pattern {
            Some(pattern) => Regex::new(pattern)
                .map(EntrySelector::Pattern)
                .map_err(|e| ConfigError::ValidationError(format!("Invalid entry-pattern: {}", e))),
            None => Err(ConfigError::MissingEntryFilter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Resolver;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[build]
source = "src"
output = "dist"
cache = true

[modules]
reserve = ["jquery"]
entries = ["page/index"]

[modules.aliases]
"$" = "vendor/zepto"
mustache = "vendor/mustache"

[bundle]
shared-name = "common"
pinned-file = "r.core.js"
threshold = 0.6
"#;

        let config = BuildConfig::from_str(toml).unwrap();
        assert_eq!(config.build.source, Some(PathBuf::from("src")));
        assert!(config.build.cache);
        assert_eq!(config.modules.aliases.len(), 2);
        assert_eq!(config.bundle.shared_name, "common");
        assert_eq!(config.bundle.pinned_file.as_deref(), Some("r.core.js"));
        assert_eq!(config.snapshot_path(), Some(PathBuf::from("dist/.cache.json")));
    }

    #[test]
    fn test_defaults() {
        let config = BuildConfig::from_str("").unwrap();
        assert_eq!(config.bundle.shared_name, "r.core");
        assert_eq!(config.bundle.threshold, 0.5);
        assert!(!config.build.cache);
        assert!(config.snapshot_path().is_none());
    }

    #[test]
    fn test_threshold_out_of_range() {
        for bad in ["0.0", "1.5", "-0.2"] {
            let toml = format!("[bundle]\nthreshold = {}\n", bad);
            let result = BuildConfig::from_str(&toml);
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "threshold {} should be rejected",
                bad
            );
        }
        assert!(BuildConfig::from_str("[bundle]\nthreshold = 1.0\n").is_ok());
    }

    #[test]
    fn test_bad_entry_pattern() {
        let result = BuildConfig::from_str("[modules]\nentry-pattern = \"(\"\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_missing_entry_filter() {
        let config = BuildConfig::default();
        assert!(matches!(
            config.entry_selector(),
            Err(ConfigError::MissingEntryFilter)
        ));
    }

    #[test]
    fn test_explicit_entries_win() {
        let config = BuildConfig::from_str(
            "[modules]\nentries = [\"a\"]\nentry-pattern = \"^page/\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.entry_selector().unwrap(),
            EntrySelector::Explicit(ref e) if e == &["a".to_string()]
        ));
    }

    #[test]
    fn test_missing_dirs() {
        let config = BuildConfig::default();
        assert!(matches!(
            config.source_dir(),
            Err(ConfigError::MissingSourceDir(_))
        ));
        assert!(matches!(config.output_dir(), Err(ConfigError::MissingOutputDir)));

        let mut config = BuildConfig::default();
        config.build.source = Some(PathBuf::from("/nonexistent/amdgraph/src"));
        assert!(matches!(
            config.validate_paths(),
            Err(ConfigError::MissingSourceDir(_))
        ));
    }

    #[test]
    fn test_registry_uses_aliases_and_reserve() {
        let config = BuildConfig::from_str(
            "[modules]\nreserve = [\"jquery\"]\n[modules.aliases]\n\"$\" = \"zepto\"\n",
        )
        .unwrap();
        let registry = config.registry();
        assert!(registry.is_reserved("jquery"));
        assert_eq!(registry.aliases().get("$"), Some("zepto"));
    }
}
