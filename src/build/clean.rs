//! Output root removal.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error while cleaning the output root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CleanError {
    #[error("Failed to remove {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Recursively delete `output_root`.
///
/// Returns `true` if something was removed. A missing root is not an error.
pub fn clean_output(output_root: &Path) -> Result<bool, CleanError> {
    match fs::remove_dir_all(output_root) {
        Ok(()) => {
            log::info!("Cleaned {}", output_root.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("{} does not exist, nothing to clean", output_root.display());
            Ok(false)
        }
        Err(source) => Err(CleanError::Io { path: output_root.to_path_buf(), source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_tree() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");
        fs::create_dir_all(out.join("resources/assets/css")).unwrap();
        fs::write(out.join("resources/assets/css/main.css"), "a{}").unwrap();

        assert!(clean_output(&out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn test_clean_twice_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist");
        fs::create_dir_all(&out).unwrap();

        assert!(clean_output(&out).unwrap());
        assert!(!clean_output(&out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn test_clean_missing_root() {
        let temp = TempDir::new().unwrap();
        assert!(!clean_output(&temp.path().join("never-built")).unwrap());
    }
}
