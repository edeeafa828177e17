//! Build context containing configuration and resolved paths for a build.

use crate::config::{FrontConfig, PathsConfig};
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// All directory accessors return absolute paths resolved against the
/// project root.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: FrontConfig,
    /// Project root directory (where frontpipe.toml is located)
    project_root: PathBuf,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: FrontConfig, project_root: PathBuf) -> Self {
        Self { config, project_root }
    }

    /// Get the configuration.
    pub fn config(&self) -> &FrontConfig {
        &self.config
    }

    /// Get the path configuration.
    pub fn paths(&self) -> &PathsConfig {
        &self.config.paths
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        }
    }

    pub fn source_root(&self) -> PathBuf {
        self.resolve_path(&self.paths().source_root)
    }

    pub fn output_root(&self) -> PathBuf {
        self.resolve_path(&self.paths().output_root)
    }

    pub fn html_src(&self) -> PathBuf {
        self.resolve_path(&self.paths().html_src)
    }

    pub fn css_src(&self) -> PathBuf {
        self.resolve_path(&self.paths().css_src)
    }

    pub fn js_src(&self) -> PathBuf {
        self.resolve_path(&self.paths().js_src)
    }

    pub fn img_src(&self) -> PathBuf {
        self.resolve_path(&self.paths().img_src)
    }

    pub fn sprite_input_src(&self) -> PathBuf {
        self.resolve_path(&self.paths().sprite_input_src)
    }

    pub fn sprite_layout_src(&self) -> PathBuf {
        self.resolve_path(&self.paths().sprite_layout_src)
    }

    pub fn shared_src(&self) -> PathBuf {
        self.resolve_path(&self.paths().shared_src)
    }

    pub fn html_out(&self) -> PathBuf {
        self.resolve_path(&self.paths().html_out)
    }

    pub fn css_out(&self) -> PathBuf {
        self.resolve_path(&self.paths().css_out)
    }

    pub fn js_out(&self) -> PathBuf {
        self.resolve_path(&self.paths().js_out)
    }

    pub fn img_out(&self) -> PathBuf {
        self.resolve_path(&self.paths().img_out)
    }

    /// Directory the packed sprite sheets are written to.
    pub fn sprite_sheet_out(&self) -> PathBuf {
        self.img_out().join("sprite")
    }

    pub fn sprite_out(&self) -> PathBuf {
        self.resolve_path(&self.paths().sprite_out)
    }

    pub fn shared_out(&self) -> PathBuf {
        self.resolve_path(&self.paths().shared_out)
    }

    /// Number of worker threads used per dependency level.
    pub fn jobs(&self) -> usize {
        self.config
            .build
            .jobs
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    #[test]
    fn test_build_context_new() {
        let root = PathBuf::from("/project");
        let ctx = BuildContext::new(default_config(), root.clone());
        assert_eq!(ctx.project_root(), &root);
    }

    #[test]
    fn test_build_context_resolve_path_absolute() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));
        let absolute = Path::new("/other/path");
        assert_eq!(ctx.resolve_path(absolute), PathBuf::from("/other/path"));
    }

    #[test]
    fn test_build_context_resolved_dirs() {
        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));

        assert_eq!(ctx.output_root(), PathBuf::from("/project/dist"));
        assert_eq!(ctx.css_src(), PathBuf::from("/project/sources/resources/assets/scss"));
        assert_eq!(
            ctx.sprite_sheet_out(),
            PathBuf::from("/project/dist/resources/assets/images/sprite")
        );
    }

    #[test]
    fn test_build_context_jobs() {
        let mut config = default_config();
        config.build.jobs = Some(3);
        let ctx = BuildContext::new(config, PathBuf::from("/project"));
        assert_eq!(ctx.jobs(), 3);

        let ctx = BuildContext::new(default_config(), PathBuf::from("/project"));
        assert!(ctx.jobs() >= 1);
    }
}
