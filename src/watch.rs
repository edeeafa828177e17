//! Watch mode for automatic step re-runs on file changes
//!
//! Every source directory is bound to the steps that consume it. A debounced
//! batch of change events is routed to every binding whose directory contains
//! a changed path; the matching steps run one after another.

use crate::build::{BuildContext, Pipeline, StepId};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

/// Error during watch mode
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("Failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("Failed to watch {}: {source}", .path.display())]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// None of the bound directories exist
    #[error("No source directory to watch")]
    NothingToWatch,
    /// Channel receive error
    #[error("Watch channel error: {0}")]
    Channel(String),
}

/// A watched directory and the steps re-run when something below it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBinding {
    pub watched: PathBuf,
    pub steps: Vec<StepId>,
}

impl WatchBinding {
    pub fn new(watched: impl Into<PathBuf>, steps: &[StepId]) -> Self {
        Self { watched: watched.into(), steps: steps.to_vec() }
    }
}

/// The standard bindings, in routing order.
pub fn standard_bindings(ctx: &BuildContext) -> Vec<WatchBinding> {
    vec![
        WatchBinding::new(ctx.shared_src(), &[StepId::Common]),
        WatchBinding::new(ctx.html_src(), &[StepId::Html]),
        WatchBinding::new(ctx.sprite_layout_src(), &[StepId::SpriteCopy]),
        WatchBinding::new(ctx.css_src(), &[StepId::Css]),
        WatchBinding::new(ctx.js_src(), &[StepId::Js]),
        WatchBinding::new(ctx.img_src(), &[StepId::Images]),
        WatchBinding::new(ctx.sprite_input_src(), &[StepId::SpriteGenerate]),
    ]
}

/// Routes changed paths to steps.
#[derive(Debug, Clone, Default)]
pub struct WatchRouter {
    bindings: Vec<WatchBinding>,
}

impl WatchRouter {
    pub fn new(bindings: Vec<WatchBinding>) -> Self {
        Self { bindings }
    }

    pub fn from_context(ctx: &BuildContext) -> Self {
        Self::new(standard_bindings(ctx))
    }

    pub fn bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }

    /// Steps to run for a batch of changed paths.
    ///
    /// Every binding whose watched directory contains one of the paths
    /// contributes its steps. Steps are de-duplicated and keep binding order.
    pub fn route(&self, changed: &[PathBuf]) -> Vec<StepId> {
        let mut steps: Vec<StepId> = Vec::new();
        for binding in &self.bindings {
            if !changed.iter().any(|p| p.starts_with(&binding.watched)) {
                continue;
            }
            for step in &binding.steps {
                if !steps.contains(step) {
                    steps.push(*step);
                }
            }
        }
        steps
    }

    /// Bindings whose directory exists, with canonical paths so they match
    /// what the OS watcher reports. Missing directories are skipped.
    fn active(&self) -> WatchRouter {
        let mut active = Vec::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            match binding.watched.canonicalize() {
                Ok(watched) if watched.is_dir() => {
                    active.push(WatchBinding { watched, steps: binding.steps.clone() })
                }
                _ => log::warn!("Not watching {}: directory does not exist", binding.watched.display()),
            }
        }
        WatchRouter::new(active)
    }

    /// Watch every bound directory and re-run routed steps until the process
    /// ends.
    pub fn run(&self, pipeline: &Pipeline, debounce: Duration) -> Result<(), WatchError> {
        let active = self.active();
        if active.bindings.is_empty() {
            return Err(WatchError::NothingToWatch);
        }

        // Create channel for debounced events
        let (tx, rx) = channel();
        let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;

        for binding in &active.bindings {
            debouncer
                .watcher()
                .watch(&binding.watched, RecursiveMode::Recursive)
                .map_err(|source| WatchError::WatchPath { path: binding.watched.clone(), source })?;
            log::debug!("Watching {} -> {:?}", binding.watched.display(), binding.steps);
        }
        log::info!("Watching {} directories for changes...", active.bindings.len());

        loop {
            match rx.recv() {
                Ok(Ok(events)) => {
                    let changed: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    for path in &changed {
                        log::debug!("Changed: {}", path.display());
                    }
                    active.dispatch(pipeline, &changed);
                }
                Ok(Err(error)) => {
                    // Watch error (non-fatal) - log but continue watching
                    log::warn!("Watch error: {:?}", error);
                }
                Err(e) => return Err(WatchError::Channel(e.to_string())),
            }
        }
    }

    /// Run the steps routed for `changed`; failures are logged, not returned.
    pub fn dispatch(&self, pipeline: &Pipeline, changed: &[PathBuf]) -> Vec<StepId> {
        let steps = self.route(changed);
        for step in &steps {
            match pipeline.run_step(*step) {
                Ok(result) if result.has_errors() => {
                    log::warn!("'{}' finished with {} error(s)", step, result.errors.len())
                }
                Ok(_) => {}
                Err(e) => log::error!("'{}' failed: {}", step, e),
            }
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FrontConfig;
    use std::fs;
    use tempfile::TempDir;

    fn router() -> WatchRouter {
        WatchRouter::from_context(&BuildContext::new(FrontConfig::default(), PathBuf::from("/p")))
    }

    #[test]
    fn test_standard_binding_order() {
        let steps: Vec<StepId> = router().bindings().iter().flat_map(|b| b.steps.clone()).collect();
        assert_eq!(
            steps,
            vec![
                StepId::Common,
                StepId::Html,
                StepId::SpriteCopy,
                StepId::Css,
                StepId::Js,
                StepId::Images,
                StepId::SpriteGenerate,
            ]
        );
    }

    #[test]
    fn test_route_single_directory() {
        let steps = router().route(&[PathBuf::from("/p/sources/resources/assets/js/app.js")]);
        assert_eq!(steps, vec![StepId::Js]);
    }

    #[test]
    fn test_nested_directories_trigger_both_bindings() {
        // The sprite layout dir lives inside the scss dir
        let steps = router().route(&[PathBuf::from("/p/sources/resources/assets/scss/sprite/_sprite.css")]);
        assert_eq!(steps, vec![StepId::SpriteCopy, StepId::Css]);
    }

    #[test]
    fn test_route_dedups_and_keeps_declaration_order() {
        let steps = router().route(&[
            PathBuf::from("/p/sources/resources/assets/ir/home.png"),
            PathBuf::from("/p/sources/resources/assets/scss/main.scss"),
            PathBuf::from("/p/sources/resources/assets/scss/_vars.scss"),
            PathBuf::from("/p/sources/html/index.html"),
        ]);
        assert_eq!(steps, vec![StepId::Html, StepId::Css, StepId::SpriteGenerate]);
    }

    #[test]
    fn test_route_unrelated_path() {
        assert!(router().route(&[PathBuf::from("/p/README.md")]).is_empty());
        assert!(router().route(&[PathBuf::from("/p/sources/index.html")]).is_empty());
    }

    #[test]
    fn test_active_skips_missing_directories() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("js")).unwrap();
        let router = WatchRouter::new(vec![
            WatchBinding::new(temp.path().join("js"), &[StepId::Js]),
            WatchBinding::new(temp.path().join("missing"), &[StepId::Css]),
        ]);

        let active = router.active();
        assert_eq!(active.bindings().len(), 1);
        assert_eq!(active.bindings()[0].steps, vec![StepId::Js]);
    }

    #[test]
    fn test_nothing_to_watch() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(FrontConfig::default(), temp.path().to_path_buf());
        let pipeline = Pipeline::new(ctx.clone()).unwrap();
        let result = WatchRouter::from_context(&ctx).run(&pipeline, Duration::from_millis(10));
        assert!(matches!(result, Err(WatchError::NothingToWatch)));
    }

    #[test]
    fn test_dispatch_runs_routed_steps() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(FrontConfig::default(), temp.path().to_path_buf());
        let js_dir = ctx.js_src();
        fs::create_dir_all(&js_dir).unwrap();
        fs::write(js_dir.join("app.js"), "var  a = 1; // note").unwrap();

        let pipeline = Pipeline::new(ctx.clone()).unwrap();
        let ran = WatchRouter::from_context(&ctx).dispatch(&pipeline, &[js_dir.join("app.js")]);

        assert_eq!(ran, vec![StepId::Js]);
        assert_eq!(fs::read_to_string(ctx.js_out().join("app.js")).unwrap(), "var a=1;");
    }
}
