//! Summary, detail and category extraction from member documentation.
//!
//! Documentation strings follow a loose convention:
//!
//! ```text
//! Generate a code review prompt for a given file.
//! Categories: code, review
//! Args:
//!     filename: Name of the file being reviewed
//! ```
//!
//! The first non-empty line is the summary. Category declarations may appear
//! on any line, in one of four case-insensitive forms:
//!
//! - `Category: <token>`
//! - `Categories: <token>, <token>, ...`
//! - `[category: <token>]`
//! - `[categories: <token>, <token>, ...]`
//!
//! Declaration lines are removed from both summary and detail.

use std::sync::OnceLock;

use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;

/// Matches one category declaration line.
fn category_line() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(?:\[\s*categor(?:y|ies)\s*:\s*(?P<bracketed>[^\]]*)\]|categor(?:y|ies)\s*:\s*(?P<plain>.*))\s*$",
        )
        .expect("category pattern is valid")
    })
}

/// Lower-cased, de-duplicated category tokens in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Categories(IndexSet<String>);

impl Categories {
    /// Creates an empty category set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token after trimming and lower-casing it.
    ///
    /// Returns `false` for empty tokens and for tokens already present.
    pub fn insert(&mut self, token: &str) -> bool {
        let token = token.trim().to_lowercase();
        if token.is_empty() {
            return false;
        }
        self.0.insert(token)
    }

    /// Whether `token` (compared case-insensitively) is present.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(&token.trim().to_lowercase())
    }

    /// Iterates over the categories in order of first appearance.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of distinct categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no category was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Categories {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut categories = Self::new();
        for token in iter {
            categories.insert(token.as_ref());
        }
        categories
    }
}

/// Metadata extracted from a documentation string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocMetadata {
    /// First non-empty, non-declaration line, trimmed.
    pub summary: String,
    /// Everything after the summary, dedented and trimmed.
    pub detail: String,
    /// Declared categories.
    pub categories: Categories,
}

/// Returns the comma-separated token list of a declaration line.
fn declared_tokens(line: &str) -> Option<&str> {
    let caps = category_line().captures(line)?;
    caps.name("bracketed")
        .or_else(|| caps.name("plain"))
        .map(|m| m.as_str())
}

/// Parses a documentation string. An empty string yields empty metadata.
#[must_use]
pub fn parse(doc: &str) -> DocMetadata {
    let mut categories = Categories::new();
    let mut body = Vec::new();

    for line in doc.lines() {
        match declared_tokens(line) {
            Some(tokens) => tokens.split(',').for_each(|t| {
                categories.insert(t);
            }),
            None => body.push(line.trim_end()),
        }
    }

    let mut lines = body.into_iter().skip_while(|l| l.trim().is_empty());
    let summary = lines.next().map(str::trim).unwrap_or_default().to_string();
    let detail = dedent(&lines.collect::<Vec<_>>()).trim().to_string();

    DocMetadata {
        summary,
        detail,
        categories,
    }
}

/// Strips the indentation shared by every non-blank line.
fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or_else(|| l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
