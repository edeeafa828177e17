//! Configuration loading and discovery for `frontpipe.toml`
//!
//! Finds `frontpipe.toml` above a start directory and loads the project.

use super::schema::FrontConfig;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file.
pub const CONFIG_FILENAME: &str = "frontpipe.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse frontpipe.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// A loaded configuration together with the project root it applies to.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FrontConfig,
    /// Directory holding `frontpipe.toml`, or the working directory
    pub project_root: PathBuf,
    /// The file the config came from, if any
    pub source: Option<PathBuf>,
}

/// Find frontpipe.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Discover and load the project configuration starting at `start`.
///
/// The project root is the directory containing the config file; without a
/// config file it is `start` itself.
pub fn load_project(start: &Path) -> Result<LoadedConfig, ConfigError> {
    match find_config_from(start.to_path_buf()) {
        Some(path) => {
            let config = load_config_file(&path)?;
            let project_root =
                path.parent().map(Path::to_path_buf).unwrap_or_else(|| start.to_path_buf());
            Ok(LoadedConfig { config, project_root, source: Some(path) })
        }
        None => Ok(LoadedConfig {
            config: default_config(),
            project_root: start.to_path_buf(),
            source: None,
        }),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<FrontConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: FrontConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no frontpipe.toml is found.
pub fn default_config() -> FrontConfig {
    FrontConfig::default()
}
