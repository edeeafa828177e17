//! Configuration schema types for `frontpipe.toml`
//!
//! Defines the structure and validation rules for pipeline configuration.
//! Every section is optional; a missing file yields the default layout
//! (`sources/` in, `dist/` out).

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Source and destination roots for every asset category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of all source trees
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// HTML templates and partials
    #[serde(default = "default_html_src")]
    pub html_src: PathBuf,
    /// SCSS/CSS entry points
    #[serde(default = "default_css_src")]
    pub css_src: PathBuf,
    /// JavaScript sources
    #[serde(default = "default_js_src")]
    pub js_src: PathBuf,
    /// Images copied (and optimized) into the output
    #[serde(default = "default_img_src")]
    pub img_src: PathBuf,
    /// Individual sprite icons
    #[serde(default = "default_sprite_input_src")]
    pub sprite_input_src: PathBuf,
    /// Sprite stylesheet fragments and layout resources
    #[serde(default = "default_sprite_layout_src")]
    pub sprite_layout_src: PathBuf,
    /// Shared static resources (fonts, vendor files)
    #[serde(default = "default_shared_src")]
    pub shared_src: PathBuf,
    /// Output root, owned by the pipeline
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    #[serde(default = "default_html_out")]
    pub html_out: PathBuf,
    #[serde(default = "default_css_out")]
    pub css_out: PathBuf,
    #[serde(default = "default_js_out")]
    pub js_out: PathBuf,
    #[serde(default = "default_img_out")]
    pub img_out: PathBuf,
    #[serde(default = "default_sprite_out")]
    pub sprite_out: PathBuf,
    #[serde(default = "default_shared_out")]
    pub shared_out: PathBuf,
}

fn default_source_root() -> PathBuf {
    PathBuf::from("sources")
}

fn default_html_src() -> PathBuf {
    PathBuf::from("sources/html")
}

fn default_css_src() -> PathBuf {
    PathBuf::from("sources/resources/assets/scss")
}

fn default_js_src() -> PathBuf {
    PathBuf::from("sources/resources/assets/js")
}

fn default_img_src() -> PathBuf {
    PathBuf::from("sources/resources/assets/images")
}

fn default_sprite_input_src() -> PathBuf {
    PathBuf::from("sources/resources/assets/ir")
}

fn default_sprite_layout_src() -> PathBuf {
    PathBuf::from("sources/resources/assets/scss/sprite")
}

fn default_shared_src() -> PathBuf {
    PathBuf::from("sources/resources/common")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("dist")
}

fn default_html_out() -> PathBuf {
    PathBuf::from("dist/html")
}

fn default_css_out() -> PathBuf {
    PathBuf::from("dist/resources/assets/css")
}

fn default_js_out() -> PathBuf {
    PathBuf::from("dist/resources/assets/js")
}

fn default_img_out() -> PathBuf {
    PathBuf::from("dist/resources/assets/images")
}

fn default_sprite_out() -> PathBuf {
    PathBuf::from("dist/resources/assets/css/sprite")
}

fn default_shared_out() -> PathBuf {
    PathBuf::from("dist/resources/common")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            html_src: default_html_src(),
            css_src: default_css_src(),
            js_src: default_js_src(),
            img_src: default_img_src(),
            sprite_input_src: default_sprite_input_src(),
            sprite_layout_src: default_sprite_layout_src(),
            shared_src: default_shared_src(),
            output_root: default_output_root(),
            html_out: default_html_out(),
            css_out: default_css_out(),
            js_out: default_js_out(),
            img_out: default_img_out(),
            sprite_out: default_sprite_out(),
            shared_out: default_shared_out(),
        }
    }
}

impl PathsConfig {
    /// All output directories paired with their config field names.
    pub fn outputs(&self) -> [(&'static str, &Path); 6] {
        [
            ("paths.html_out", &self.html_out),
            ("paths.css_out", &self.css_out),
            ("paths.js_out", &self.js_out),
            ("paths.img_out", &self.img_out),
            ("paths.sprite_out", &self.sprite_out),
            ("paths.shared_out", &self.shared_out),
        ]
    }
}

/// Development server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Sprite sheet generation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Pixels between packed icons
    #[serde(default = "default_sprite_padding")]
    pub padding: u32,
    /// Standard density sheet filename
    #[serde(default = "default_img_name")]
    pub img_name: String,
    /// High density sheet filename
    #[serde(default = "default_retina_img_name")]
    pub retina_img_name: String,
    /// Stylesheet fragment filename, written into `paths.sprite_layout_src`
    #[serde(default = "default_css_name")]
    pub css_name: String,
    /// URL of the standard sheet as seen from compiled CSS
    #[serde(default = "default_img_path")]
    pub img_path: String,
    /// URL of the high density sheet as seen from compiled CSS
    #[serde(default = "default_retina_img_path")]
    pub retina_img_path: String,
    /// Selector prefix for generated icon classes
    #[serde(default = "default_class_prefix")]
    pub class_prefix: String,
}

fn default_sprite_padding() -> u32 {
    10
}

fn default_img_name() -> String {
    "sprite.png".to_string()
}

fn default_retina_img_name() -> String {
    "sprite@2x.png".to_string()
}

fn default_css_name() -> String {
    "_sprite.css".to_string()
}

fn default_img_path() -> String {
    "../images/sprite/sprite.png".to_string()
}

fn default_retina_img_path() -> String {
    "../images/sprite/sprite@2x.png".to_string()
}

fn default_class_prefix() -> String {
    "icon-".to_string()
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            padding: default_sprite_padding(),
            img_name: default_img_name(),
            retina_img_name: default_retina_img_name(),
            css_name: default_css_name(),
            img_path: default_img_path(),
            retina_img_path: default_retina_img_path(),
            class_prefix: default_class_prefix(),
        }
    }
}

/// HTML include settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlConfig {
    /// Directive prefix (`@@include`, `@@var`)
    #[serde(default = "default_include_prefix")]
    pub include_prefix: String,
    /// Directory name marking partials that are never written to output
    #[serde(default = "default_partial_dir")]
    pub partial_dir: String,
}

fn default_include_prefix() -> String {
    "@@".to_string()
}

fn default_partial_dir() -> String {
    "__include".to_string()
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self { include_prefix: default_include_prefix(), partial_dir: default_partial_dir() }
    }
}

/// Browser targets used for vendor prefixing (by major version) and source map output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CssConfig {
    #[serde(default)]
    pub android: Option<u32>,
    #[serde(default)]
    pub chrome: Option<u32>,
    #[serde(default)]
    pub edge: Option<u32>,
    #[serde(default)]
    pub firefox: Option<u32>,
    #[serde(default)]
    pub ios_saf: Option<u32>,
    #[serde(default)]
    pub safari: Option<u32>,
    #[serde(default)]
    pub samsung: Option<u32>,
    /// Append an inline source map to every stylesheet
    #[serde(default = "default_true")]
    pub source_maps: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CssConfig {
    fn default() -> Self {
        Self {
            android: Some(81),
            chrome: Some(80),
            edge: Some(80),
            firefox: Some(78),
            ios_saf: Some(12),
            safari: Some(12),
            samsung: Some(12),
            source_maps: true,
        }
    }
}

/// Step scheduling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildConfig {
    /// Worker threads per dependency level (defaults to available parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

/// Complete frontpipe.toml configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FrontConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub html: HtmlConfig,
    #[serde(default)]
    pub css: CssConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "paths.css_out")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frontpipe.toml: '{}' {}", self.field, self.message)
    }
}

impl FrontConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        validate_paths(&self.paths, &mut errors);

        if self.server.port == 0 {
            errors.push(ConfigValidationError {
                field: "server.port".to_string(),
                message: "must be a positive port number".to_string(),
            });
        }

        if self.html.include_prefix.is_empty() {
            errors.push(ConfigValidationError {
                field: "html.include_prefix".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if self.sprite.img_name.is_empty() || self.sprite.css_name.is_empty() {
            errors.push(ConfigValidationError {
                field: "sprite".to_string(),
                message: "img_name and css_name must be non-empty".to_string(),
            });
        }

        if self.build.jobs == Some(0) {
            errors.push(ConfigValidationError {
                field: "build.jobs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        errors
    }
}

/// Output paths stay inside the project and clear of the source tree.
fn validate_paths(paths: &PathsConfig, errors: &mut Vec<ConfigValidationError>) {
    let Some(out_root) = normalize(&paths.output_root) else {
        errors.push(ConfigValidationError {
            field: "paths.output_root".to_string(),
            message: "must be a relative path inside the project".to_string(),
        });
        return;
    };

    if out_root.as_os_str().is_empty() {
        errors.push(ConfigValidationError {
            field: "paths.output_root".to_string(),
            message: "must not be the project root".to_string(),
        });
    } else if let Some(src_root) = normalize(&paths.source_root) {
        if out_root.starts_with(&src_root) || src_root.starts_with(&out_root) {
            errors.push(ConfigValidationError {
                field: "paths.output_root".to_string(),
                message: format!(
                    "must not overlap paths.source_root ({})",
                    paths.source_root.display()
                ),
            });
        }
    }

    for (field, out) in paths.outputs() {
        if !normalize(out).is_some_and(|out| out.starts_with(&out_root)) {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                message: format!("must be inside paths.output_root ({})", out_root.display()),
            });
        }
    }
}

/// Lexically normalize a relative config path (drops `.` and resolves `..`).
///
/// Returns `None` for absolute paths and for paths that climb above the
/// project root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
