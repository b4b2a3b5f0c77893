//! Response parsing: pull the single JSON object out of free-form model text.
//!
//! Vision models wrap their answer in prose, markdown fences or both. A
//! fenced block that decodes to an object wins, so braces in trailing prose
//! do not spoil it. Otherwise the object span runs from the first `{` to the
//! last `}`; a page that carries several objects outside a fence therefore
//! fails to decode and is reported as malformed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// A ```` ```json ```` (or bare ```` ``` ````) block holding one object.
static FENCED_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));

/// The three shapes a model answer can take.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// A non-empty JSON object.
    Object(Map<String, Value>),
    /// No object in the text, or `{}`: the page carries no settlement data.
    Empty,
    /// An object was attempted but does not decode.
    Malformed(String),
}

/// Parse a raw model answer. Never panics.
pub fn parse_response(text: &str) -> ModelResponse {
    if let Some(map) = fenced_object(text) {
        return object_or_empty(map);
    }

    let Some(start) = text.find('{') else {
        return ModelResponse::Empty;
    };

    let end = match text.rfind('}') {
        Some(end) if end > start => end,
        _ => return ModelResponse::Malformed("unterminated JSON object".to_string()),
    };

    match serde_json::from_str::<Map<String, Value>>(&text[start..=end]) {
        Ok(map) => object_or_empty(map),
        Err(e) => ModelResponse::Malformed(e.to_string()),
    }
}

/// First fenced block that decodes to an object.
fn fenced_object(text: &str) -> Option<Map<String, Value>> {
    FENCED_OBJECT
        .captures_iter(text)
        .find_map(|caps| serde_json::from_str(caps.get(1)?.as_str()).ok())
}

fn object_or_empty(map: Map<String, Value>) -> ModelResponse {
    if map.is_empty() {
        ModelResponse::Empty
    } else {
        ModelResponse::Object(map)
    }
}
