//! Record decoding and content filtering.
//!
//! Each raw line is expected to be a JSON session event. Lines that are
//! not messages, carry an unaccepted role, or fail to parse are dropped
//! silently — logs and metadata lines are expected noise in the stream,
//! not errors. Decoded text is cleaned of injected markup and embedded
//! structured-data fences before the noise checks run.

use crate::config::FilterConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// One decoded, filtered unit of content. Ephemeral: exists only inside
/// a batch artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Event timestamp as carried by the source line, if any.
    pub ts: Option<String>,
    pub role: String,
    pub text: String,
}

/// Decode one raw line into a record, applying the full filter policy.
///
/// Returns `None` for anything that should not reach a batch: parse
/// failures, non-message events, unaccepted roles, and cleaned text
/// that the noise rules reject.
#[must_use]
pub fn decode_line(line: &str, filter: &FilterConfig) -> Option<Record> {
    let value: Value = serde_json::from_str(line).ok()?;
    if value.get("type").and_then(Value::as_str) != Some("message") {
        return None;
    }

    let message = value.get("message")?.as_object()?;
    let role = message.get("role").and_then(Value::as_str)?;
    if !filter.roles.iter().any(|r| r == role) {
        return None;
    }

    let text = message
        .get("content")
        .map(extract_text_blocks)
        .unwrap_or_default();
    let text = clean_text(&text);
    if is_noise(&text, filter) {
        return None;
    }

    let ts = value
        .get("timestamp")
        .or_else(|| message.get("timestamp"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(Record {
        ts,
        role: role.to_string(),
        text,
    })
}

/// Concatenate the `text` blocks of a message content value.
///
/// Content is either a plain string or a list of typed blocks; only
/// `{"type": "text"}` blocks contribute.
fn extract_text_blocks(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(blocks) => {
            let parts: Vec<&str> = blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .filter(|t| !t.is_empty())
                .collect();
            parts.join("\n")
        }
        _ => String::new(),
    }
}

/// Strip injected markup and fenced structured-data blocks, then
/// collapse runs of blank lines.
fn clean_text(s: &str) -> String {
    static MEMORIES: OnceLock<Regex> = OnceLock::new();
    static JSON_FENCE: OnceLock<Regex> = OnceLock::new();
    static BLANK_RUNS: OnceLock<Regex> = OnceLock::new();

    let s = s.trim();
    if s.is_empty() {
        return String::new();
    }

    let memories = MEMORIES.get_or_init(|| {
        Regex::new(r"(?s)<relevant-memories>.*?</relevant-memories>").expect("static pattern")
    });
    let json_fence =
        JSON_FENCE.get_or_init(|| Regex::new(r"(?s)```json.*?```").expect("static pattern"));
    let blank_runs = BLANK_RUNS.get_or_init(|| Regex::new(r"\n{3,}").expect("static pattern"));

    let s = memories.replace_all(s, "");
    let s = json_fence.replace_all(&s, "");
    let s = blank_runs.replace_all(&s, "\n\n");
    s.trim().to_string()
}

/// Noise rules applied after cleanup.
fn is_noise(s: &str, filter: &FilterConfig) -> bool {
    if s.is_empty() {
        return true;
    }
    if filter.noise_prefixes.iter().any(|p| s.starts_with(p.as_str())) {
        return true;
    }
    // Oversized dumps are deferred to a later, coarser summarization.
    if s.len() > filter.max_record_len {
        return true;
    }
    // A record that is entirely one fenced block is raw tool output.
    if s.starts_with("```") && s.ends_with("```") {
        return true;
    }
    false
}
