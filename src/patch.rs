//! File changes and the raw model output they are extracted from.
//!
//! Generated code arrives as free-form text that may or may not be JSON.
//! [`normalize`] turns it into a non-empty list of [`FileChange`]s,
//! [`sanitize`] guards each path before it reaches a git tree, and [`clean`]
//! strips the code fences models like to wrap file bodies in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content cleanup for generated file bodies.
pub mod clean;

/// Conversion of raw model output into file changes.
pub mod normalize;

/// Path validation for tree entries.
pub mod sanitize;

/// Path used when model output cannot be parsed into file changes.
pub const FALLBACK_FILE_PATH: &str = "ai-output.txt";

/// A single file to write into the commit tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    /// Relative path to the file starting from repo root
    pub path: String,
    /// Full contents of the file. Existing files at the same path are
    /// replaced, never patched.
    pub content: String,
}

impl FileChange {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Untyped model output, classified by its top-level JSON shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPatch {
    /// An object, expected to carry a `files` array
    StructuredObject(Map<String, Value>),
    /// A bare array, expected to hold `{path, content}` objects
    StructuredArray(Vec<Value>),
    /// Text, possibly JSON wrapped in Markdown fences
    PlainText(String),
    /// Any other JSON scalar
    Unparseable(Value),
}

impl From<Value> for RawPatch {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::StructuredObject(map),
            Value::Array(items) => Self::StructuredArray(items),
            Value::String(text) => Self::PlainText(text),
            other => Self::Unparseable(other),
        }
    }
}

impl From<String> for RawPatch {
    fn from(text: String) -> Self {
        Self::PlainText(text)
    }
}

impl From<&str> for RawPatch {
    fn from(text: &str) -> Self {
        Self::PlainText(text.to_string())
    }
}

impl<'de> Deserialize<'de> for RawPatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(RawPatch::from)
    }
}

/// Renders a JSON value as file text: strings verbatim, everything else
/// pretty-printed. Missing or null content becomes an empty file.
pub fn content_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => pretty_json(other),
    }
}

pub(crate) fn pretty_json(value: &Value) -> String {
    // serializing an in-memory Value cannot fail
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
