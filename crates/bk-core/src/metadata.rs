//! Metadata header codec.
//!
//! Every outline file starts with a block of `key:<padding>value` lines,
//! followed by one blank line and the free-form body. Values spanning
//! several lines continue on lines indented with whitespace.

use crate::error::{BkError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::warn;

pub const TITLE: &str = "title";
pub const ID: &str = "ID";
pub const TYPE: &str = "type";
pub const COMPILE: &str = "compile";
pub const LEVEL: &str = "level";
pub const STRUCTURE: &str = "structure";

/// `compile` value meaning "include in compiled output".
pub const COMPILE_SENTINEL: &str = "2";
pub const DEFAULT_TAB_WIDTH: usize = 15;

/// Stand-in for `:` inside keys, so a key never splits on re-parse.
pub const KEY_COLON_ESCAPE: &str = "_.._";
const EMPTY_KEY: &str = "None";

/// Ordered key/value header of an outline file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(IndexMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// The header written for every newly created node.
    pub fn default_template() -> Self {
        [
            (TITLE, "title"),
            (ID, "0"),
            (TYPE, "md"),
            (COMPILE, COMPILE_SENTINEL),
        ]
        .into_iter()
        .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `ID` as an integer; 0 when absent or unparsable.
    pub fn primary_key(&self) -> i64 {
        self.get(ID)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Whether `compile` carries the sentinel.
    pub fn compile_flag(&self) -> bool {
        self.get(COMPILE).map(str::trim) == Some(COMPILE_SENTINEL)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Parse a header block. Lines that cannot be split into key and value are
/// skipped with a warning; the rest of the header is still read.
pub fn parse(text: &str) -> Metadata {
    let (metadata, malformed) = parse_lines(text);
    for (line_no, line) in malformed {
        warn!(line_no, line = %line, "skipping malformed metadata line");
    }
    metadata
}

/// Like [`parse`], but the first malformed line is an error.
pub fn parse_strict(text: &str) -> Result<Metadata> {
    let (metadata, malformed) = parse_lines(text);
    match malformed.into_iter().next() {
        Some((line_no, line)) => Err(BkError::MalformedMetadata { line_no, line }),
        None => Ok(metadata),
    }
}

fn parse_lines(text: &str) -> (Metadata, Vec<(usize, String)>) {
    let mut metadata = Metadata::new();
    let mut malformed = Vec::new();
    let mut current: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            let value = current.as_ref().and_then(|key| metadata.0.get_mut(key));
            match value {
                Some(value) => {
                    value.push('\n');
                    value.push_str(line.trim());
                }
                None => malformed.push((idx + 1, line.to_string())),
            }
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) => {
                let key = key.trim().replace(KEY_COLON_ESCAPE, ":");
                metadata.insert(key.clone(), value.trim());
                current = Some(key);
            }
            None => {
                malformed.push((idx + 1, line.to_string()));
                current = None;
            }
        }
    }
    (metadata, malformed)
}

/// Format one entry, padding the key to `tab_width` and aligning
/// continuation lines under the value column.
pub fn format_entry(key: &str, value: &str, tab_width: usize) -> String {
    let indent = " ".repeat(tab_width + 1);
    let value = value.split('\n').collect::<Vec<_>>().join(&format!("\n{indent}"));

    let key = if key.is_empty() { EMPTY_KEY } else { key };
    let key = key.replace(':', KEY_COLON_ESCAPE);
    let spaces = " ".repeat(tab_width.saturating_sub(key.chars().count()));
    format!("{key}:{spaces}{value}\n")
}

/// Serialize a header. Entries with empty values are dropped.
pub fn serialize(metadata: &Metadata, tab_width: usize) -> String {
    metadata
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format_entry(k, v, tab_width))
        .collect()
}

/// Fold `\r\n` line endings to `\n`. Apply before `split_document`.
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Split raw file text at the first blank line into header and body.
pub fn split_document(text: &str) -> (&str, &str) {
    if let Some(body) = text.strip_prefix('\n') {
        return ("", body);
    }
    text.split_once("\n\n").unwrap_or((text, ""))
}

/// Header, one blank line, body.
pub fn compose_document(metadata: &Metadata, body: &str, tab_width: usize) -> String {
    let mut text = serialize(metadata, tab_width);
    text.push('\n');
    text.push_str(body);
    text
}
