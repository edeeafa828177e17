//! Stylesheet transforms: Sass compilation and vendor prefixing.

use crate::build::step::{map_each, Asset, CompileError, Diagnostics, Transform};
use crate::config::CssConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::{Path, PathBuf};

/// Compiles `.scss` and `.css` sources with grass.
///
/// Files whose name starts with `_` are Sass partials: they are only reached
/// through `@import`/`@use` and produce no output of their own.
#[derive(Debug, Clone, Default)]
pub struct SassCompile {
    load_paths: Vec<PathBuf>,
}

impl SassCompile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory searched by `@import` and `@use`.
    pub fn with_load_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.load_paths.push(path.into());
        self
    }

    fn options(&self, dir: Option<&Path>) -> grass::Options<'static> {
        let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
        if let Some(dir) = dir {
            options = options.load_path(dir);
        }
        for path in &self.load_paths {
            options = options.load_path(path);
        }
        options
    }

    /// Compile one asset to CSS text.
    pub fn compile(&self, asset: &Asset) -> Result<String, CompileError> {
        let result = match &asset.source {
            Some(path) => grass::from_path(path, &self.options(path.parent())),
            None => grass::from_string(asset.text().into_owned(), &self.options(None)),
        };
        result.map_err(|e| CompileError::new(asset.display_path(), e.to_string()))
    }
}

/// True for Sass partials such as `_variables.scss`.
pub fn is_sass_partial(relative: &Path) -> bool {
    relative
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

impl Transform for SassCompile {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn apply(&self, assets: Vec<Asset>, diagnostics: &mut Diagnostics) -> Vec<Asset> {
        let assets = assets.into_iter().filter(|a| !is_sass_partial(&a.relative)).collect();
        map_each(assets, diagnostics, |mut asset| {
            let css = self.compile(&asset)?;
            asset.contents = css.into_bytes();
            asset.set_extension("css");
            Ok(asset)
        })
    }
}

/// Adds vendor prefixes for the configured browser targets.
///
/// With source maps on, each stylesheet ends in an inline
/// `sourceMappingURL` comment that maps back to its Sass output.
#[derive(Debug, Clone, Copy)]
pub struct Autoprefix {
    targets: Targets,
    source_maps: bool,
}

/// Encode a major version the way browserslist data does (`major << 16`).
fn version(major: Option<u32>) -> Option<u32> {
    major.map(|m| m << 16)
}

impl Autoprefix {
    pub fn new(config: &CssConfig) -> Self {
        let browsers = Browsers {
            android: version(config.android),
            chrome: version(config.chrome),
            edge: version(config.edge),
            firefox: version(config.firefox),
            ios_saf: version(config.ios_saf),
            safari: version(config.safari),
            samsung: version(config.samsung),
            ..Browsers::default()
        };
        Self { targets: Targets::from(browsers), source_maps: config.source_maps }
    }

    /// Parse, prefix and re-print one stylesheet.
    pub fn prefix(&self, css: &str, filename: &str) -> Result<String, String> {
        let options = ParserOptions { filename: filename.to_string(), ..ParserOptions::default() };
        let mut sheet = StyleSheet::parse(css, options).map_err(|e| e.to_string())?;
        sheet
            .minify(MinifyOptions { targets: self.targets, ..MinifyOptions::default() })
            .map_err(|e| e.to_string())?;

        if !self.source_maps {
            let printed = sheet
                .to_css(PrinterOptions { targets: self.targets, ..PrinterOptions::default() })
                .map_err(|e| e.to_string())?;
            return Ok(printed.code);
        }

        let mut map = SourceMap::new("/");
        let source = map.add_source(filename);
        map.set_source_content(source as usize, css)
            .map_err(|e| format!("source map: {:?}", e))?;
        let printed = sheet
            .to_css(PrinterOptions {
                targets: self.targets,
                source_map: Some(&mut map),
                ..PrinterOptions::default()
            })
            .map_err(|e| e.to_string())?;
        let json = map.to_json(None).map_err(|e| format!("source map: {:?}", e))?;
        Ok(with_inline_map(printed.code, &json))
    }
}

/// Append `json` to `css` as a base64 `sourceMappingURL` comment.
fn with_inline_map(mut css: String, json: &str) -> String {
    if !css.ends_with('\n') {
        css.push('\n');
    }
    css.push_str("/*# sourceMappingURL=data:application/json;base64,");
    css.push_str(&STANDARD.encode(json));
    css.push_str(" */\n");
    css
}

impl Transform for Autoprefix {
    fn name(&self) -> &'static str {
        "autoprefix"
    }

    fn apply(&self, assets: Vec<Asset>, diagnostics: &mut Diagnostics) -> Vec<Asset> {
        map_each(assets, diagnostics, |mut asset| {
            let filename = asset.relative.to_string_lossy().into_owned();
            let css = self
                .prefix(&asset.text(), &filename)
                .map_err(|message| CompileError::new(asset.display_path(), message))?;
            asset.contents = css.into_bytes();
            Ok(asset)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source_asset(dir: &Path, rel: &str, contents: &str) -> Asset {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        Asset::from_source(path, PathBuf::from(rel), contents.as_bytes().to_vec())
    }

    #[test]
    fn test_partial_detection() {
        assert!(is_sass_partial(Path::new("_variables.scss")));
        assert!(is_sass_partial(Path::new("sprite/_sprite.css")));
        assert!(!is_sass_partial(Path::new("main.scss")));
    }

    #[test]
    fn test_compile_with_import() {
        let temp = TempDir::new().unwrap();
        source_asset(temp.path(), "_colors.scss", "$brand: #ff0000;");
        let main = source_asset(temp.path(), "main.scss", "@import 'colors';\n.a { .b { color: $brand; } }");

        let sass = SassCompile::new();
        let mut diagnostics = Diagnostics::default();
        let out = sass.apply(vec![main], &mut diagnostics);

        assert!(diagnostics.errors.is_empty());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relative, PathBuf::from("main.css"));
        let css = out[0].text();
        assert!(css.contains(".a .b"));
        assert!(css.contains("red") || css.contains("#ff0000"));
    }

    #[test]
    fn test_partials_produce_no_output() {
        let temp = TempDir::new().unwrap();
        let partial = source_asset(temp.path(), "_mixins.scss", "@mixin x { color: red; }");

        let out = SassCompile::new().apply(vec![partial], &mut Diagnostics::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_compile_error_drops_file() {
        let temp = TempDir::new().unwrap();
        let bad = source_asset(temp.path(), "bad.scss", ".a { color: red;");
        let good = source_asset(temp.path(), "good.scss", ".a { color: red; }");

        let mut diagnostics = Diagnostics::default();
        let out = SassCompile::new().apply(vec![bad, good], &mut diagnostics);

        assert_eq!(diagnostics.errors.len(), 1);
        assert!(diagnostics.errors[0].file.ends_with("bad.scss"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].relative, PathBuf::from("good.css"));
    }

    #[test]
    fn test_autoprefix_adds_vendor_prefix() {
        let config = CssConfig {
            android: None,
            chrome: None,
            edge: None,
            firefox: None,
            ios_saf: Some(8),
            safari: Some(8),
            samsung: None,
            source_maps: false,
        };
        let out = Autoprefix::new(&config).prefix(".a { user-select: none; }", "a.css").unwrap();
        assert!(out.contains("-webkit-user-select"));
        assert!(out.contains("user-select: none"));
    }

    #[test]
    fn test_inline_source_map_appended() {
        let out = Autoprefix::new(&CssConfig::default()).prefix(".a { color: red; }\n", "main.css").unwrap();

        let (code, comment) = out.split_once("/*# sourceMappingURL=").unwrap();
        assert!(code.contains(".a"));
        let encoded = comment
            .strip_prefix("data:application/json;base64,")
            .and_then(|rest| rest.strip_suffix(" */\n"))
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["sources"][0], "main.css");
        assert_eq!(json["sourcesContent"][0], ".a { color: red; }\n");
        assert!(!json["mappings"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_source_maps_can_be_disabled() {
        let config = CssConfig { source_maps: false, ..CssConfig::default() };
        let out = Autoprefix::new(&config).prefix(".a { color: red; }", "main.css").unwrap();
        assert!(!out.contains("sourceMappingURL"));
    }

    #[test]
    fn test_autoprefix_reports_parse_errors() {
        let asset = Asset::generated("broken.css", b".a { color: red; } }}".to_vec());
        let mut diagnostics = Diagnostics::default();
        let out = Autoprefix::new(&CssConfig::default()).apply(vec![asset], &mut diagnostics);

        // lightningcss recovers from some errors; either way nothing panics and
        // a failed file never reaches the output.
        assert_eq!(out.len() + diagnostics.errors.len(), 1);
    }
}
