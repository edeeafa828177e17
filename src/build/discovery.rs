//! Source file discovery for build steps.
//!
//! Resolves a step's glob patterns against its base directory. A base
//! directory that does not exist simply matches nothing.

use glob::{glob, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during source discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
}

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Path below the discovery base directory
    pub relative: PathBuf,
}

/// Discover regular files under `base_dir` matching any of `patterns`.
///
/// Results are sorted and de-duplicated. Unreadable entries are logged and
/// skipped.
pub fn discover_files(base_dir: &Path, patterns: &[String]) -> Result<Vec<SourceFile>, DiscoveryError> {
    if !base_dir.is_dir() {
        log::debug!("Input directory {} does not exist, nothing to do", base_dir.display());
        return Ok(vec![]);
    }

    let escaped_base = Pattern::escape(&base_dir.to_string_lossy());
    let mut files = BTreeSet::new();

    for pattern in patterns {
        let full_pattern = format!("{}/{}", escaped_base.trim_end_matches('/'), pattern);
        let paths =
            glob(&full_pattern).map_err(|e| DiscoveryError::InvalidPattern(pattern.clone(), e))?;

        for entry in paths {
            match entry {
                Ok(path) => {
                    if !path.is_file() {
                        continue;
                    }
                    if let Ok(relative) = path.strip_prefix(base_dir) {
                        let relative = relative.to_path_buf();
                        files.insert(SourceFile { path, relative });
                    }
                }
                Err(e) => {
                    log::warn!("Error reading path: {}", e);
                }
            }
        }
    }

    Ok(files.into_iter().collect())
}
