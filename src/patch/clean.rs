use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::patch::pretty_json;

static FENCE_OPEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[a-zA-Z]*\n?").unwrap());

static FENCE_CLOSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```$").unwrap());

/// Strip one leading fenced-code-block opener and one trailing closer from
/// generated text. Non-string values are pretty-printed as JSON.
pub fn clean(content: impl Into<Value>) -> String {
    match content.into() {
        Value::String(text) => {
            let opened = FENCE_OPEN_REGEX.replace(&text, "");
            FENCE_CLOSE_REGEX.replace(&opened, "").into_owned()
        }
        other => pretty_json(&other),
    }
}
