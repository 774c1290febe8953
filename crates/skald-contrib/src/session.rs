use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skald_core::hash::sha256_hex;
use skald_core::{SkaldConfig, TranscriptRecord};
use skald_correlate::CorrelatedConversation;
use skald_sanitize::{RedactionReport, Sanitizer};
use time::OffsetDateTime;

use crate::quality::{composite_score, score_text, QualitySignals};

/// Entry-type bucket for lines that are not valid JSON.
pub const PARSE_ERROR_KIND: &str = "parse_error";

/// One conversation's transcript, parsed, scored, and redacted for export.
///
/// `data` and `preview` hold the original content and never leave the
/// machine; bundles carry `sanitized` and `preview_redacted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContribSession {
    pub session_id: String,
    pub source: String,
    pub raw_sha256: String,
    #[serde(with = "skald_core::ts")]
    pub mtime_utc: OffsetDateTime,
    pub data: Vec<Value>,
    pub preview: String,
    pub score: u32,
    pub preview_score: u32,
    pub signals: QualitySignals,
    pub approx_chars: usize,
    pub source_path_hint: String,
    pub file_path: String,
    pub entry_types: BTreeMap<String, usize>,
    pub sanitized: Vec<Value>,
    pub preview_redacted: String,
    pub redactions: RedactionReport,
}

/// Build a [`ContribSession`] from a transcript's raw bytes.
///
/// Non-UTF-8 bytes are replaced, blank lines ignored, and lines that fail to
/// parse are counted under [`PARSE_ERROR_KIND`] and dropped from `data`.
pub fn prepare_session(
    conversation: &CorrelatedConversation,
    transcript: &TranscriptRecord,
    raw: &[u8],
    sanitizer: &Sanitizer,
    config: &SkaldConfig,
) -> ContribSession {
    let session_id = conversation
        .hook_session
        .as_ref()
        .map(|h| h.session_id.clone())
        .unwrap_or_else(|| transcript.id.clone());
    let source = conversation.agent.clone();
    let text = String::from_utf8_lossy(raw);

    let mut data = Vec::new();
    let mut entry_types: BTreeMap<String, usize> = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(entry) => {
                *entry_types.entry(entry_kind(&entry).to_string()).or_insert(0) += 1;
                data.push(entry);
            }
            Err(_) => *entry_types.entry(PARSE_ERROR_KIND.to_string()).or_insert(0) += 1,
        }
    }

    let first_user_text = data
        .iter()
        .filter(|e| entry_kind(e) == "user")
        .find_map(message_text)
        .unwrap_or_default();
    let preview_chars = config.bundle.preview_chars;
    let preview = truncate_chars(&first_user_text, preview_chars);
    // The preview repeats text already counted in `data`.
    let preview_redacted = truncate_chars(&sanitizer.scan_text(&first_user_text).0, preview_chars);

    let mut redactions = RedactionReport::default();
    let sanitized: Vec<Value> = data
        .iter()
        .map(|entry| {
            let (clean, report) = sanitizer.scan_value(entry);
            redactions.merge(&report);
            clean
        })
        .collect();
    let (source_path_hint, report) = sanitizer.scan_text(&transcript.path);
    redactions.merge(&report);

    let signals = QualitySignals::from_entries(&data, &preview);
    let score = composite_score(&signals, &config.quality);
    let preview_score = score_text(&preview);

    let file_path = format!(
        "sessions/{}/{}.jsonl",
        file_component(&source),
        file_component(&session_id)
    );

    tracing::debug!(
        session_id = %session_id,
        entries = data.len(),
        parse_errors = entry_types.get(PARSE_ERROR_KIND).copied().unwrap_or(0),
        redactions = redactions.total_redactions,
        score,
        "prepared session"
    );

    ContribSession {
        session_id,
        source,
        raw_sha256: sha256_hex(raw),
        mtime_utc: transcript.modified_at,
        data,
        preview,
        score,
        preview_score,
        signals,
        approx_chars: text.chars().count(),
        source_path_hint,
        file_path,
        entry_types,
        sanitized,
        preview_redacted,
        redactions,
    }
}

/// The `type` of a transcript entry, or `"unknown"`.
pub(crate) fn entry_kind(entry: &Value) -> &str {
    entry.get("type").and_then(|t| t.as_str()).unwrap_or("unknown")
}

/// Content blocks of `message.content` when it is an array.
pub(crate) fn message_blocks(entry: &Value) -> &[Value] {
    entry
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Text of `message.content`: the string itself, or its `text` blocks joined.
pub(crate) fn message_text(entry: &Value) -> Option<String> {
    let content = entry.get("message").and_then(|m| m.get("content"))?;
    if let Some(s) = content.as_str() {
        return (!s.trim().is_empty()).then(|| s.to_string());
    }
    let texts: Vec<&str> = message_blocks(entry)
        .iter()
        .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn file_component(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "session".to_string()
    } else {
        cleaned
    }
}
