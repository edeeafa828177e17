//! Transform step definitions.
//!
//! A [`TransformStep`] reads the files matched by its [`InputSpec`], pushes
//! them through an ordered list of [`Transform`]s and writes what comes out
//! beneath its destination directory.

use crate::build::discovery::{discover_files, DiscoveryError, SourceFile};
use crate::build::incremental::{filter_newer_than_output, filter_since};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Identifier of a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    /// Top-level `sources/*.html` entry files
    Index,
    /// Shared static resources
    Common,
    /// HTML templates with includes
    Html,
    /// Sprite sheet and stylesheet fragment generation
    SpriteGenerate,
    /// SCSS/CSS compilation
    Css,
    /// JavaScript minification
    Js,
    /// Image copy and optimization
    Images,
    /// Sprite layout resources copy
    SpriteCopy,
}

impl StepId {
    /// Every step in declaration order.
    pub const ALL: [StepId; 8] = [
        StepId::Index,
        StepId::Common,
        StepId::Html,
        StepId::SpriteGenerate,
        StepId::Css,
        StepId::Js,
        StepId::Images,
        StepId::SpriteCopy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::Index => "index",
            StepId::Common => "common",
            StepId::Html => "html",
            StepId::SpriteGenerate => "sprite",
            StepId::Css => "css",
            StepId::Js => "js",
            StepId::Images => "images",
            StepId::SpriteCopy => "sprite-copy",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What connected browsers should do after a step wrote output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadKind {
    /// Full page reload
    Reload,
    /// Swap stylesheets in place
    InjectCss,
}

/// One file flowing through a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// File the asset was read from (None for generated assets)
    pub source: Option<PathBuf>,
    /// Output path below the write root
    pub relative: PathBuf,
    /// Write root overriding the step destination
    pub root: Option<PathBuf>,
    /// File contents
    pub contents: Vec<u8>,
}

impl Asset {
    /// Create an asset read from `source`.
    pub fn from_source(source: PathBuf, relative: PathBuf, contents: Vec<u8>) -> Self {
        Self { source: Some(source), relative, root: None, contents }
    }

    /// Create a generated asset with no backing source file.
    pub fn generated(relative: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self { source: None, relative: relative.into(), root: None, contents }
    }

    /// Write this asset under `root` instead of the step destination.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Path used when reporting errors about this asset.
    pub fn display_path(&self) -> &Path {
        self.source.as_deref().unwrap_or(&self.relative)
    }

    /// Lossy UTF-8 view of the contents.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }

    /// Replace the file extension of the output path.
    pub fn set_extension(&mut self, ext: &str) {
        self.relative.set_extension(ext);
    }

    /// Absolute output path for a step writing to `destination`.
    pub fn output_path(&self, destination: &Path) -> PathBuf {
        self.root.as_deref().unwrap_or(destination).join(&self.relative)
    }
}

/// A per-file transformation failure. The file is dropped, the step goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .file.display())]
pub struct CompileError {
    /// File that failed to compile
    pub file: PathBuf,
    /// Tool error message
    pub message: String,
}

impl CompileError {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { file: file.into(), message: message.into() }
    }
}

/// Diagnostics collected while transforming a batch.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub errors: Vec<CompileError>,
    pub warnings: Vec<String>,
}

impl Diagnostics {
    pub fn error(&mut self, error: CompileError) {
        log::error!("{}", error);
        self.errors.push(error);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// A batch transformation: input stream of assets to output stream.
pub trait Transform: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Transform a batch. Per-file failures go to `diagnostics` and the file
    /// is left out of the returned batch.
    fn apply(&self, assets: Vec<Asset>, diagnostics: &mut Diagnostics) -> Vec<Asset>;
}

/// Apply `f` to each asset, dropping (and reporting) the ones that fail.
pub fn map_each<F>(assets: Vec<Asset>, diagnostics: &mut Diagnostics, mut f: F) -> Vec<Asset>
where
    F: FnMut(Asset) -> Result<Asset, CompileError>,
{
    let mut out = Vec::with_capacity(assets.len());
    for asset in assets {
        match f(asset) {
            Ok(asset) => out.push(asset),
            Err(e) => diagnostics.error(e),
        }
    }
    out
}

/// Where a step reads its inputs from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    /// Base directory; output paths are relative to it
    pub base: PathBuf,
    /// Glob patterns below `base`
    pub patterns: Vec<String>,
}

impl InputSpec {
    pub fn new(base: impl Into<PathBuf>, patterns: &[&str]) -> Self {
        Self { base: base.into(), patterns: patterns.iter().map(|p| p.to_string()).collect() }
    }
}

/// Fatal step error; aborts the current pipeline run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError {
    #[error("{step}: {source}")]
    Discovery {
        step: StepId,
        #[source]
        source: DiscoveryError,
    },
    #[error("{step}: I/O error on {}: {source}", .path.display())]
    Io {
        step: StepId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one successful step run.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// Number of input files that passed the filters
    pub processed: usize,
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Per-file compile errors
    pub errors: Vec<CompileError>,
    /// Non-fatal warnings
    pub warnings: Vec<String>,
}

/// A named unit of work transforming source files into destination files.
pub struct TransformStep {
    pub id: StepId,
    pub input: InputSpec,
    pub destination: PathBuf,
    pub transforms: Vec<Box<dyn Transform>>,
    /// Only process files modified since this step's last successful run
    pub incremental: bool,
    /// Skip files whose output already exists and is at least as new
    pub skip_unchanged_outputs: bool,
    pub notifies_reload: bool,
    pub reload_kind: ReloadKind,
    /// Steps that must complete before this one
    pub depends_on: Vec<StepId>,
}

impl fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transforms: Vec<_> = self.transforms.iter().map(|t| t.name()).collect();
        f.debug_struct("TransformStep")
            .field("id", &self.id)
            .field("input", &self.input)
            .field("destination", &self.destination)
            .field("transforms", &transforms)
            .field("incremental", &self.incremental)
            .field("skip_unchanged_outputs", &self.skip_unchanged_outputs)
            .field("depends_on", &self.depends_on)
            .finish()
    }
}

impl TransformStep {
    /// Create a plain copy step from `input` to `destination`.
    pub fn new(id: StepId, input: InputSpec, destination: impl Into<PathBuf>) -> Self {
        Self {
            id,
            input,
            destination: destination.into(),
            transforms: vec![],
            incremental: false,
            skip_unchanged_outputs: false,
            notifies_reload: true,
            reload_kind: ReloadKind::Reload,
            depends_on: vec![],
        }
    }

    /// Append a transformation.
    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transforms.push(Box::new(transform));
        self
    }

    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn skip_unchanged_outputs(mut self, skip: bool) -> Self {
        self.skip_unchanged_outputs = skip;
        self
    }

    pub fn with_reload(mut self, notifies: bool, kind: ReloadKind) -> Self {
        self.notifies_reload = notifies;
        self.reload_kind = kind;
        self
    }

    pub fn depends_on(mut self, dep: StepId) -> Self {
        self.depends_on.push(dep);
        self
    }

    /// Select the inputs for this run after applying the incremental filters.
    pub fn select_inputs(&self, last_run: Option<SystemTime>) -> Result<Vec<SourceFile>, StepError> {
        let mut files = discover_files(&self.input.base, &self.input.patterns)
            .map_err(|source| StepError::Discovery { step: self.id, source })?;

        if self.incremental {
            files = filter_since(files, last_run);
        }
        if self.skip_unchanged_outputs {
            files = filter_newer_than_output(files, &self.destination);
        }
        Ok(files)
    }

    /// Run the step once.
    ///
    /// `last_run` is this step's last successful completion time, if any.
    pub fn run(&self, last_run: Option<SystemTime>) -> Result<StepOutcome, StepError> {
        let files = self.select_inputs(last_run)?;
        let mut outcome = StepOutcome { processed: files.len(), ..Default::default() };

        if files.is_empty() {
            log::debug!("[{}] no matching inputs", self.id);
            return Ok(outcome);
        }

        let mut assets = Vec::with_capacity(files.len());
        for file in files {
            let contents = fs::read(&file.path).map_err(|source| StepError::Io {
                step: self.id,
                path: file.path.clone(),
                source,
            })?;
            assets.push(Asset::from_source(file.path, file.relative, contents));
        }

        let mut diagnostics = Diagnostics::default();
        for transform in &self.transforms {
            assets = transform.apply(assets, &mut diagnostics);
            log::trace!("[{}] {} -> {} assets", self.id, transform.name(), assets.len());
        }

        for asset in assets {
            let path = asset.output_path(&self.destination);
            write_output(&path, &asset.contents)
                .map_err(|source| StepError::Io { step: self.id, path: path.clone(), source })?;
            outcome.outputs.push(path);
        }

        outcome.errors = diagnostics.errors;
        outcome.warnings = diagnostics.warnings;
        Ok(outcome)
    }
}

/// Write a whole file, creating parent directories.
fn write_output(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Upper;

    impl Transform for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn apply(&self, assets: Vec<Asset>, diagnostics: &mut Diagnostics) -> Vec<Asset> {
            map_each(assets, diagnostics, |mut asset| {
                if asset.text().contains("bad") {
                    return Err(CompileError::new(asset.display_path(), "bad input"));
                }
                asset.contents = asset.text().to_uppercase().into_bytes();
                Ok(asset)
            })
        }
    }

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_step_id_display() {
        assert_eq!(StepId::SpriteGenerate.to_string(), "sprite");
        assert_eq!(StepId::SpriteCopy.to_string(), "sprite-copy");
        assert_eq!(StepId::ALL.len(), 8);
    }

    #[test]
    fn test_empty_input_is_noop() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");
        let step = TransformStep::new(StepId::Js, InputSpec::new(temp.path().join("src"), &["*.js"]), &dest)
            .with_transform(Upper);

        let outcome = step.run(None).unwrap();
        assert_eq!(outcome.processed, 0);
        assert!(outcome.outputs.is_empty());
        assert!(!dest.exists());
    }

    #[test]
    fn test_copy_step_preserves_structure() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "a.txt", "a");
        write(&src, "deep/b.txt", "b");
        let dest = temp.path().join("out");

        let step = TransformStep::new(StepId::Common, InputSpec::new(&src, &["**/*.*"]), &dest);
        let outcome = step.run(None).unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dest.join("deep/b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_compile_error_skips_only_that_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src, "good.js", "good");
        write(&src, "broken.js", "bad");
        let dest = temp.path().join("out");

        let step = TransformStep::new(StepId::Js, InputSpec::new(&src, &["*.js"]), &dest)
            .with_transform(Upper);
        let outcome = step.run(None).unwrap();

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].file.ends_with("broken.js"));
        assert_eq!(fs::read_to_string(dest.join("good.js")).unwrap(), "GOOD");
        assert!(!dest.join("broken.js").exists());
    }

    #[test]
    fn test_asset_root_override() {
        let asset = Asset::generated("_sprite.css", vec![]).with_root("/src/scss/sprite");
        assert_eq!(
            asset.output_path(Path::new("/dist/images")),
            PathBuf::from("/src/scss/sprite/_sprite.css")
        );
    }

    #[test]
    fn test_compile_error_display() {
        let error = CompileError::new("scss/main.scss", "expected \"}\"");
        assert_eq!(error.to_string(), "scss/main.scss: expected \"}\"");
    }
}
