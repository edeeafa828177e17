//! Lightweight JavaScript minifier.
//!
//! Removes comments and collapses whitespace while leaving string, template
//! and regular expression literals untouched. Line breaks are kept (one per
//! run) so automatic semicolon insertion still sees them. No renaming.

use crate::build::step::{Asset, Diagnostics, Transform};

/// Keywords after which a `/` starts a regular expression literal.
const REGEX_KEYWORDS: &[&str] = &["return", "typeof", "case", "do", "else", "in", "instanceof", "new", "void", "delete", "throw"];

fn is_ident(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Whether a `/` following `out` begins a regex literal rather than a division.
fn regex_allowed(out: &str) -> bool {
    let trimmed = out.trim_end();
    match trimmed.chars().last() {
        None => true,
        Some(c) if is_ident(c) => {
            let word: String = trimmed.chars().rev().take_while(|c| is_ident(*c)).collect();
            let word: String = word.chars().rev().collect();
            REGEX_KEYWORDS.contains(&word.as_str())
        }
        Some(c) => !matches!(c, ')' | ']' | '}'),
    }
}

/// Whether whitespace between `prev` and `next` must survive as a space.
fn needs_space(prev: char, next: char) -> bool {
    (is_ident(prev) && is_ident(next))
        || (prev == '+' && next == '+')
        || (prev == '-' && next == '-')
        || (prev == '/' && next == '/')
        // `1 .toString()` must not become the number `1.`
        || (prev.is_ascii_digit() && next == '.')
}

/// Minify JavaScript source.
pub fn minify_js(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    // Pending whitespace: None, Some(false) for spaces, Some(true) for a newline
    let mut pending: Option<bool> = None;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c.is_whitespace() {
            let newline = c == '\n' || c == '\r';
            pending = Some(pending.unwrap_or(false) || newline);
            i += 1;
            continue;
        }

        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '/' && next == Some('*') {
            let mut newline = false;
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                newline |= chars[i] == '\n';
                i += 1;
            }
            i = (i + 2).min(chars.len());
            pending = Some(pending.unwrap_or(false) || newline);
            continue;
        }

        if let Some(newline) = pending.take() {
            if let Some(prev) = out.chars().last() {
                if newline {
                    out.push('\n');
                } else if needs_space(prev, c) {
                    out.push(' ');
                }
            }
        }

        match c {
            '"' | '\'' | '`' => i = copy_literal(&chars, i, c, &mut out),
            '/' if regex_allowed(&out) => i = copy_regex(&chars, i, &mut out),
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Copy a quoted literal starting at `start`; returns the index after it.
fn copy_literal(chars: &[char], start: usize, quote: char, out: &mut String) -> usize {
    out.push(quote);
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        i += 1;
        if c == '\\' {
            if let Some(escaped) = chars.get(i) {
                out.push(*escaped);
                i += 1;
            }
        } else if c == quote {
            break;
        }
    }
    i
}

/// Copy a regex literal (including character classes and flags).
fn copy_regex(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('/');
    let mut i = start + 1;
    let mut in_class = false;
    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            break;
        }
        out.push(c);
        i += 1;
        match c {
            '\\' => {
                if let Some(escaped) = chars.get(i) {
                    out.push(*escaped);
                    i += 1;
                }
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => break,
            _ => {}
        }
    }
    while i < chars.len() && is_ident(chars[i]) {
        out.push(chars[i]);
        i += 1;
    }
    i
}

/// Minifies every asset in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct Minify;

impl Transform for Minify {
    fn name(&self) -> &'static str {
        "minify-js"
    }

    fn apply(&self, mut assets: Vec<Asset>, _diagnostics: &mut Diagnostics) -> Vec<Asset> {
        for asset in &mut assets {
            let minified = minify_js(&asset.text());
            log::trace!("{}: {} -> {} bytes", asset.relative.display(), asset.contents.len(), minified.len());
            asset.contents = minified.into_bytes();
        }
        assets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_comments_and_whitespace() {
        let src = "// header\nfunction add ( a, b ) {\n    /* sum */\n    return a + b;\n}\n";
        assert_eq!(minify_js(src), "function add(a,b){\nreturn a+b;\n}");
    }

    #[test]
    fn test_keeps_strings() {
        let src = "var s = \"a  // not a comment\";\nvar t = 'it\\'s  /* kept */';";
        assert_eq!(minify_js(src), "var s=\"a  // not a comment\";\nvar t='it\\'s  /* kept */';");
    }

    #[test]
    fn test_keeps_template_literal() {
        let src = "const html = `<div>\n  ${ name }\n</div>`;";
        assert_eq!(minify_js(src), src.replace("const html = ", "const html=").as_str());
    }

    #[test]
    fn test_keeps_regex_literal() {
        let src = "var re = /https?:\\/\\//g;\nvar x = a / b / c;";
        assert_eq!(minify_js(src), "var re=/https?:\\/\\//g;\nvar x=a/b/c;");
    }

    #[test]
    fn test_regex_after_return() {
        let src = "function f() { return /[/]+/.test(x); }";
        assert_eq!(minify_js(src), "function f(){return/[/]+/.test(x);}");
    }

    #[test]
    fn test_does_not_merge_operators() {
        assert_eq!(minify_js("a + +b; c - -d;"), "a+ +b;c- -d;");
    }

    #[test]
    fn test_member_access_on_number_keeps_space() {
        assert_eq!(minify_js("var s = 1 .toString();"), "var s=1 .toString();");
        assert_eq!(minify_js("var t = obj . name;"), "var t=obj.name;");
    }

    #[test]
    fn test_line_breaks_survive_for_asi() {
        assert_eq!(minify_js("let a = 1\n\n\nlet b = 2"), "let a=1\nlet b=2");
    }

    #[test]
    fn test_block_comment_spanning_lines_keeps_break() {
        assert_eq!(minify_js("a = 1 /* x\n y */ b = 2"), "a=1\nb=2");
    }
}
