//! Bundle output
//!
//! Concatenates each planned bundle into `<output>/<bundle>.js` and runs an
//! optional compressor over the written files.

use crate::planner::BundleMap;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that abort writing bundles
#[derive(Debug, Error)]
pub enum EmitError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Bundle name would leave the output directory
    #[error("Bundle name '{0}' is not a relative path inside the output directory")]
    UnsafeBundleName(String),
}

/// Errors from a compressor run on one bundle
#[derive(Debug, Error)]
pub enum CompressError {
    /// Command could not be started
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Command exited unsuccessfully
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Empty command template
    #[error("empty compressor command")]
    EmptyCommand,

    /// IO error around the compressed file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Minifies one file into another
pub trait Compressor {
    fn compress(&self, input: &Path, output: &Path) -> Result<(), CompressError>;
}

/// Runs an external command, e.g. `uglifyjs {input} -o {output}`
#[derive(Debug, Clone)]
pub struct CommandCompressor {
    template: String,
}

impl CommandCompressor {
    /// `{input}` and `{output}` in `template` are replaced per file
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Compressor for CommandCompressor {
    fn compress(&self, input: &Path, output: &Path) -> Result<(), CompressError> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let args: Vec<String> = self
            .template
            .split_whitespace()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect();
        let (program, rest) = args.split_first().ok_or(CompressError::EmptyCommand)?;

        let result = Command::new(program)
            .args(rest)
            .output()
            .map_err(|source| CompressError::Spawn {
                command: program.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(CompressError::Failed {
                command: program.clone(),
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of writing bundles
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Bundle files written
    pub written: Vec<PathBuf>,

    /// Listed source files that did not exist
    pub missing_sources: Vec<PathBuf>,
}

/// Output path for a bundle
///
/// Only plain relative names are accepted: no `..`, no root, no drive prefix.
pub fn bundle_path(output_dir: &Path, bundle: &str) -> Result<PathBuf, EmitError> {
    let name = Path::new(bundle);
    let plain = !bundle.is_empty()
        && name
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain {
        return Err(EmitError::UnsafeBundleName(bundle.to_string()));
    }
    Ok(output_dir.join(format!("{}.js", bundle)))
}

/// Concatenate every bundle's files into the output directory
///
/// Every bundle name is checked before anything is written. Missing source
/// files are skipped with a warning.
pub fn write_bundles(
    bundles: &BundleMap,
    source_dir: &Path,
    output_dir: &Path,
) -> Result<EmitReport, EmitError> {
    let mut report = EmitReport::default();

    let targets = bundles
        .iter()
        .map(|(name, files)| Ok((name, files, bundle_path(output_dir, name)?)))
        .collect::<Result<Vec<_>, EmitError>>()?;

    for (name, files, out) in targets {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut content = Vec::new();
        for file in files {
            let path = source_dir.join(file);
            if !path.is_file() {
                warn!("file ({}) not exists. [IGNORED]", path.display());
                report.missing_sources.push(path);
                continue;
            }
            content.extend(std::fs::read(&path)?);
            if content.last().is_some_and(|b| *b != b'\n') {
                content.push(b'\n');
            }
        }

        std::fs::write(&out, content)?;
        info!(bundle = name, files = files.len(), "wrote {}", out.display());
        report.written.push(out);
    }

    Ok(report)
}

/// Compress each file in place, continuing past failures
///
/// Returns the files that could not be compressed.
pub fn compress_files(
    files: &[PathBuf],
    compressor: &dyn Compressor,
) -> Vec<(PathBuf, CompressError)> {
    let mut failures = Vec::new();

    for file in files {
        let mut tmp = file.clone().into_os_string();
        tmp.push(".min");
        let tmp = PathBuf::from(tmp);

        let result = compressor
            .compress(file, &tmp)
            .and_then(|()| std::fs::rename(&tmp, file).map_err(CompressError::from));

        match result {
            Ok(()) => info!("Build {}", file.display()),
            Err(err) => {
                warn!("compressor failed on {}: {}", file.display(), err);
                let _ = std::fs::remove_file(&tmp);
                failures.push((file.clone(), err));
            }
        }
    }

    failures
}
