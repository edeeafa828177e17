//! HTML include expansion.
//!
//! Supports the `@@include("path", { "json": "context" })` directive and
//! `@@name` / `@@a.b` variable substitution from the active context.
//! Include paths are resolved relative to the including file's directory.
//! Includes nest; every included file sees its parent's context merged with
//! the object passed to it.

use crate::build::step::{map_each, Asset, CompileError, Diagnostics, Transform};
use regex::Regex;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error type for include resolution failures.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IncludeError {
    /// Circular include detected
    #[error("Circular include detected: {}", .0.display())]
    CircularInclude(PathBuf),
    /// Include target could not be read
    #[error("Include file not found '{}': {1}", .0.display())]
    FileNotFound(PathBuf, String),
    /// Malformed directive
    #[error("Malformed include directive: {0}")]
    Syntax(String),
    /// Context argument is not a JSON object
    #[error("Include context must be a JSON object: {0}")]
    Context(String),
}

/// Expands `@@include` directives and `@@var` references.
#[derive(Debug, Clone)]
pub struct FileInclude {
    include_re: Regex,
    var_re: Regex,
}

impl FileInclude {
    /// Create an include expander for directives starting with `prefix`.
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let escaped = regex::escape(prefix);
        let include_re = Regex::new(&format!(r"{}include\s*\(", escaped))?;
        let var_re = Regex::new(&format!(r"{}([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)", escaped))?;
        Ok(Self { include_re, var_re })
    }

    /// Expand every directive in `text`, which was read from `file`.
    pub fn expand(&self, text: &str, file: &Path) -> Result<String, IncludeError> {
        let mut stack = vec![normalize(file)];
        self.expand_with(text, file, &Value::Object(Map::new()), &mut stack)
    }

    fn expand_with(
        &self,
        text: &str,
        file: &Path,
        context: &Value,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String, IncludeError> {
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;

        while let Some(m) = self.include_re.find_at(text, pos) {
            out.push_str(&self.substitute(&text[pos..m.start()], context));

            let (include_path, include_context, end) = parse_arguments(text, m.end())?;
            let base = file.parent().unwrap_or_else(|| Path::new(""));
            let target = normalize(&base.join(&include_path));

            if stack.contains(&target) {
                return Err(IncludeError::CircularInclude(target));
            }

            let contents = fs::read_to_string(&target)
                .map_err(|e| IncludeError::FileNotFound(target.clone(), e.to_string()))?;
            let merged = merge_context(context, include_context);

            stack.push(target.clone());
            let expanded = self.expand_with(&contents, &target, &merged, stack)?;
            stack.pop();

            out.push_str(&expanded);
            pos = end;
        }

        out.push_str(&self.substitute(&text[pos..], context));
        Ok(out)
    }

    /// Replace `@@name` references that resolve in `context`; leave others.
    fn substitute(&self, text: &str, context: &Value) -> String {
        self.var_re
            .replace_all(text, |caps: &regex::Captures<'_>| match lookup(context, &caps[1]) {
                Some(value) => value,
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

impl Transform for FileInclude {
    fn name(&self) -> &'static str {
        "file-include"
    }

    fn apply(&self, assets: Vec<Asset>, diagnostics: &mut Diagnostics) -> Vec<Asset> {
        map_each(assets, diagnostics, |mut asset| {
            let file = asset.display_path().to_path_buf();
            let expanded = self
                .expand(&asset.text(), &file)
                .map_err(|e| CompileError::new(&file, e.to_string()))?;
            asset.contents = expanded.into_bytes();
            Ok(asset)
        })
    }
}

/// Drops partials: assets with a path component equal to the partial dir.
#[derive(Debug, Clone)]
pub struct DropPartials {
    dir_name: String,
}

impl DropPartials {
    pub fn new(dir_name: impl Into<String>) -> Self {
        Self { dir_name: dir_name.into() }
    }

    pub fn is_partial(&self, relative: &Path) -> bool {
        relative.components().any(|c| c.as_os_str() == self.dir_name.as_str())
    }
}

impl Transform for DropPartials {
    fn name(&self) -> &'static str {
        "drop-partials"
    }

    fn apply(&self, assets: Vec<Asset>, _diagnostics: &mut Diagnostics) -> Vec<Asset> {
        assets.into_iter().filter(|a| !self.is_partial(&a.relative)).collect()
    }
}

/// Parse `"path" [, {json}] )` starting at `start`.
///
/// Returns the path, the optional context object and the offset just past
/// the closing parenthesis.
fn parse_arguments(text: &str, start: usize) -> Result<(String, Option<Value>, usize), IncludeError> {
    let mut pos = skip_ws(text, start);
    let quote = text[pos..]
        .chars()
        .next()
        .filter(|c| *c == '"' || *c == '\'')
        .ok_or_else(|| IncludeError::Syntax("expected quoted path".to_string()))?;
    pos += 1;

    let close = text[pos..]
        .find(quote)
        .ok_or_else(|| IncludeError::Syntax("unterminated path string".to_string()))?;
    let path = text[pos..pos + close].to_string();
    pos = skip_ws(text, pos + close + 1);

    let mut context = None;
    if text[pos..].starts_with(',') {
        pos = skip_ws(text, pos + 1);
        let mut stream = serde_json::Deserializer::from_str(&text[pos..]).into_iter::<Value>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            Some(Err(e)) => return Err(IncludeError::Context(e.to_string())),
            None => return Err(IncludeError::Syntax("expected context object".to_string())),
        };
        if !value.is_object() {
            return Err(IncludeError::Context(value.to_string()));
        }
        pos = skip_ws(text, pos + stream.byte_offset());
        context = Some(value);
    }

    if !text[pos..].starts_with(')') {
        return Err(IncludeError::Syntax(format!("expected ')' after include of '{}'", path)));
    }

    Ok((path, context, pos + 1))
}

fn skip_ws(text: &str, pos: usize) -> usize {
    pos + (text[pos..].len() - text[pos..].trim_start().len())
}

/// Parent context overlaid with the include's own object.
fn merge_context(parent: &Value, own: Option<Value>) -> Value {
    let mut merged = match parent {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(Value::Object(map)) = own {
        merged.extend(map);
    }
    Value::Object(merged)
}

/// Resolve a dotted key in the context as display text.
fn lookup(context: &Value, key: &str) -> Option<String> {
    let mut current = context;
    for part in key.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Lexically normalize a path so `a/../b` and `b` compare equal.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
