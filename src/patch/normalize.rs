use log::*;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::patch::{
    FALLBACK_FILE_PATH, FileChange, RawPatch, content_text, pretty_json,
};

static LEADING_FENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*```[A-Za-z0-9_+-]*").unwrap());

static FENCE_MARKER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?").unwrap());

/// Convert raw model output into file changes.
///
/// Never fails: output that matches neither the `{"files": [...]}` shape
/// nor a bare array of `{path, content}` objects is kept as a single
/// `ai-output.txt` file so nothing the model produced is lost.
pub fn normalize(raw: impl Into<RawPatch>) -> Vec<FileChange> {
    let files = match raw.into() {
        RawPatch::StructuredObject(map) => from_value(&Value::Object(map)),
        RawPatch::StructuredArray(items) => from_value(&Value::Array(items)),
        RawPatch::PlainText(text) => from_text(&text),
        RawPatch::Unparseable(value) => {
            warn!("model output is a bare {value}: keeping as raw text");
            fallback(strip_fences(&pretty_json(&value)))
        }
    };

    unwrap_double_wrapped(files)
}

/// Unpack a lone fallback file whose content is itself a structured patch.
///
/// Earlier stages sometimes wrap an already structured response in the
/// `ai-output.txt` fallback; when that happens the inner file list wins.
pub fn unwrap_double_wrapped(files: Vec<FileChange>) -> Vec<FileChange> {
    if let [single] = files.as_slice()
        && single.path.to_lowercase().contains("ai-output")
        && let Ok(value) =
            serde_json::from_str::<Value>(&strip_fences(&single.content))
        && let Some(unwrapped) = extract(&value)
    {
        info!(
            "unwrapped {} file(s) nested inside {}",
            unwrapped.len(),
            single.path
        );
        return unwrapped;
    }

    files
}

/// Remove Markdown fence markers (a leading ```` ```lang ```` plus every
/// ```` ```json ```` / ```` ``` ````) and trim surrounding whitespace.
pub fn strip_fences(text: &str) -> String {
    let without_opener = LEADING_FENCE_REGEX.replace(text, "");
    FENCE_MARKER_REGEX
        .replace_all(&without_opener, "")
        .trim()
        .to_string()
}

fn from_value(value: &Value) -> Vec<FileChange> {
    extract(value).unwrap_or_else(|| {
        warn!("structured model output has no usable files: keeping as raw text");
        fallback(strip_fences(&pretty_json(value)))
    })
}

fn from_text(text: &str) -> Vec<FileChange> {
    let cleaned = strip_fences(text);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => extract(&value).unwrap_or_else(|| {
            warn!("model output JSON has no usable files: keeping as raw text");
            fallback(cleaned)
        }),
        Err(err) => {
            warn!("model output is not valid JSON ({err}): keeping as raw text");
            fallback(cleaned)
        }
    }
}

/// Pull file changes out of either accepted JSON shape. Empty lists match
/// neither shape.
fn extract(value: &Value) -> Option<Vec<FileChange>> {
    let items = match value {
        Value::Object(map) => match map.get("files") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        Value::Array(items) if items.iter().all(has_string_path) => items,
        _ => return None,
    };

    if items.is_empty() {
        return None;
    }

    let files = items
        .iter()
        .enumerate()
        .map(|(index, item)| FileChange {
            path: item
                .get("path")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("ai-file-{index}.txt")),
            content: content_text(item.get("content")),
        })
        .collect::<Vec<FileChange>>();

    debug!("extracted {} file(s) from model output", files.len());

    Some(files)
}

fn has_string_path(item: &Value) -> bool {
    item.get("path").is_some_and(Value::is_string)
}

fn fallback(content: String) -> Vec<FileChange> {
    vec![FileChange {
        path: FALLBACK_FILE_PATH.to_string(),
        content,
    }]
}
