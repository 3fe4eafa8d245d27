//! Source tree scanning
//!
//! Walks a project directory, hands every script to a [`ModuleParser`] and
//! feeds the extracted module records into a [`ModuleRegistry`].

use crate::registry::{ModuleRecords, ModuleRegistry};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A file the parser could not read; the file is skipped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{file}:{line}:{col}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub col: usize,
    pub message: String,
}

/// Errors that abort a scan
#[derive(Debug, Error)]
pub enum ScanError {
    /// IO error walking the tree or reading a file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Scan root missing or not a directory
    #[error("Source directory does not exist: {0}")]
    MissingSourceDir(PathBuf),
}

/// Extracts module definitions from one source file
pub trait ModuleParser {
    /// Module records defined in `source`
    ///
    /// Returns an empty map when the file defines no modules.
    fn parse(&self, file: &str, source: &str) -> Result<ModuleRecords, ParseError>;
}

/// Outcome of a scan
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Files ingested into the registry
    pub files_scanned: usize,

    /// Module definitions ingested
    pub modules_found: usize,

    /// Files skipped because they failed to parse
    pub parse_errors: Vec<ParseError>,

    /// Whether the scan stopped early on request
    pub cancelled: bool,
}

/// SHA-256 of `bytes`, hex-encoded
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Directory walker feeding a registry
pub struct Scanner<'p, P: ModuleParser + ?Sized> {
    root: PathBuf,
    parser: &'p P,
    extension: String,
    ignored: Vec<PathBuf>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'p, P: ModuleParser + ?Sized> Scanner<'p, P> {
    /// Create a scanner for `.js` files under `root`
    pub fn new(root: impl Into<PathBuf>, parser: &'p P) -> Self {
        Self {
            root: root.into(),
            parser,
            extension: "js".to_string(),
            ignored: Vec::new(),
            cancel: None,
        }
    }

    /// Scan files with this extension instead of `js`
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Skip a directory (e.g. the output directory inside the source tree)
    pub fn ignore_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.ignored
            .push(dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf()));
        self
    }

    /// Stop between files once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Scannable files under the root, sorted
    pub fn collect_files(&self) -> Result<Vec<PathBuf>, ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::MissingSourceDir(self.root.clone()));
        }
        let mut files = Vec::new();
        self.collect_in_dir(&self.root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn collect_in_dir(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ScanError> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with('.') || self.is_ignored(&path) {
                    continue;
                }
                self.collect_in_dir(&path, files)?;
            } else if path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn is_ignored(&self, path: &Path) -> bool {
        if self.ignored.is_empty() {
            return false;
        }
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.ignored.iter().any(|dir| *dir == path)
    }

    /// Project-relative path with `/` separators
    pub fn relative_path(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Parse every file and ingest the results
    ///
    /// Parse failures are recorded and the file's existing entry is dropped.
    /// A cancelled scan marks the registry partial.
    pub fn scan(&self, registry: &mut ModuleRegistry) -> Result<ScanReport, ScanError> {
        let files = self.collect_files()?;
        let mut report = ScanReport::default();

        for path in files {
            if self
                .cancel
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
            {
                warn!(scanned = report.files_scanned, "scan cancelled");
                registry.mark_partial();
                report.cancelled = true;
                break;
            }

            let file_id = self.relative_path(&path);
            let bytes = std::fs::read(&path)?;
            let source = String::from_utf8_lossy(&bytes);

            match self.parser.parse(&file_id, &source) {
                Ok(records) => {
                    report.files_scanned += 1;
                    report.modules_found += records.len();
                    registry.ingest(&file_id, &content_hash(&bytes), records);
                }
                Err(err) => {
                    warn!("Parse error: {}", err);
                    // a broken file contributes no modules, seeded or not
                    registry.remove_file(&file_id);
                    report.parse_errors.push(err);
                }
            }
        }

        info!(
            files = report.files_scanned,
            modules = report.modules_found,
            errors = report.parse_errors.len(),
            "scanned {}",
            self.root.display()
        );
        debug!(registry_modules = registry.module_count(), "registry after scan");
        Ok(report)
    }
}
