//! Line-oriented recognizer for `@weft:include` directives.
//!
//! A directive is only recognized when the trimmed line is exactly one
//! block comment holding the token and a quoted path:
//!
//! ```text
//! /* @weft:include "acme/json/json.mqh" */
//! ```
//!
//! Anything else on the line disables recognition. The recognizer knows
//! nothing about the host language.

use std::path::{Path, PathBuf};

pub const DIRECTIVE_TOKEN: &str = "@weft:include";

/// One recognized directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub file: PathBuf,
    /// 1-based.
    pub line: usize,
    /// `<organization>/<name>/<path>` as written.
    pub target: String,
}

/// The referenced path if `line` is a directive.
pub fn recognize(line: &str) -> Option<&str> {
    let inner = line
        .trim()
        .strip_prefix("/*")?
        .strip_suffix("*/")?
        .trim();
    if inner.contains("/*") || inner.contains("*/") {
        return None;
    }

    let rest = inner.strip_prefix(DIRECTIVE_TOKEN)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let path = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
    if path.is_empty() || path.contains('"') {
        return None;
    }
    Some(path)
}

/// All directives in `text`, warning about lines that mention the token
/// without being valid directives.
pub fn scan(file: &Path, text: &str) -> Vec<IncludeDirective> {
    let mut found = Vec::new();
    for (i, line) in text.lines().enumerate() {
        match recognize(line) {
            Some(target) => found.push(IncludeDirective {
                file: file.to_path_buf(),
                line: i + 1,
                target: target.to_string(),
            }),
            None if line.contains(DIRECTIVE_TOKEN) => {
                tracing::warn!(
                    "{}:{}: ignoring malformed {DIRECTIVE_TOKEN} line",
                    file.display(),
                    i + 1
                );
            }
            None => {}
        }
    }
    found
}
