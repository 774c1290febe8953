//! Heuristic quality scoring.
//!
//! [`score_text`] is a cheap preview score used for listings. The bundle score
//! is [`composite_score`] over [`QualitySignals`], weighted by the operator's
//! [`QualityWeights`] table.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skald_core::config::QualityWeights;

use crate::session::{entry_kind, message_blocks, message_text};

const LENGTH_SATURATION: f64 = 20_000.0;
const MESSAGE_SATURATION: f64 = 40.0;
const CODE_BLOCK_SATURATION: f64 = 5.0;
const TOOL_USE_SATURATION: f64 = 20.0;
const TURN_SATURATION: f64 = 10.0;

const CODE_MARKERS: &[&str] = &[
    "```", "fn ", "def ", "=>", "::", "();", "{", "import ", "const ", "let ", "#include",
];

/// Preview score in `0..=100`. Blank text scores 0.
pub fn score_text(text: &str) -> u32 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let chars = trimmed.chars().count() as f64;
    let words = trimmed.split_whitespace().count() as f64;
    let markers = CODE_MARKERS.iter().filter(|m| trimmed.contains(*m)).count() as f64;
    let structured = trimmed.contains('?') || trimmed.contains('\n');

    let score = 40.0 * (chars / 240.0).min(1.0)
        + 20.0 * (words / 40.0).min(1.0)
        + 30.0 * (markers / 3.0).min(1.0)
        + if structured { 10.0 } else { 0.0 };
    to_percent(score / 100.0)
}

/// Normalized (0..1) inputs to the composite score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitySignals {
    pub length: f64,
    pub message_count: f64,
    pub code_blocks: f64,
    pub tool_use: f64,
    pub user_turns: f64,
    pub assistant_turns: f64,
    pub preview: f64,
}

impl QualitySignals {
    /// Derive signals from parsed transcript entries and the session preview.
    pub fn from_entries(entries: &[Value], preview: &str) -> Self {
        let mut text_chars = 0usize;
        let mut fences = 0usize;
        let mut tool_uses = 0usize;
        let mut user_turns = 0usize;
        let mut assistant_turns = 0usize;

        for entry in entries {
            let text = message_text(entry);
            if let Some(text) = &text {
                text_chars += text.chars().count();
                fences += text.matches("```").count();
            }
            tool_uses += message_blocks(entry)
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
                .count();
            match entry_kind(entry) {
                // Tool results arrive as user entries without text.
                "user" if text.is_some() => user_turns += 1,
                "assistant" => assistant_turns += 1,
                _ => {}
            }
        }

        Self {
            length: saturate(text_chars as f64, LENGTH_SATURATION),
            message_count: saturate((user_turns + assistant_turns) as f64, MESSAGE_SATURATION),
            code_blocks: saturate((fences / 2) as f64, CODE_BLOCK_SATURATION),
            tool_use: saturate(tool_uses as f64, TOOL_USE_SATURATION),
            user_turns: saturate(user_turns as f64, TURN_SATURATION),
            assistant_turns: saturate(assistant_turns as f64, TURN_SATURATION),
            preview: f64::from(score_text(preview)) / 100.0,
        }
    }

    /// Signal value by config name. Unknown names are 0.
    pub fn get(&self, name: &str) -> f64 {
        match name {
            "length" => self.length,
            "message_count" => self.message_count,
            "code_blocks" => self.code_blocks,
            "tool_use" => self.tool_use,
            "user_turns" => self.user_turns,
            "assistant_turns" => self.assistant_turns,
            "preview" => self.preview,
            _ => 0.0,
        }
    }
}

/// Weighted composite in `0..=100`.
///
/// Each dimension is the weight-normalized mean of its signals; dimensions are
/// then combined by `dimension_weights`. A dimension with no signal table
/// still counts toward the total, contributing 0.
pub fn composite_score(signals: &QualitySignals, weights: &QualityWeights) -> u32 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (dimension, &dim_weight) in &weights.dimension_weights {
        if dim_weight <= 0.0 {
            continue;
        }
        let value = weights
            .signal_weights
            .get(dimension)
            .map(|table| {
                let sum: f64 = table.values().map(|w| w.max(0.0)).sum();
                if sum <= 0.0 {
                    return 0.0;
                }
                table
                    .iter()
                    .map(|(name, w)| w.max(0.0) * signals.get(name))
                    .sum::<f64>()
                    / sum
            })
            .unwrap_or(0.0);
        weighted += dim_weight * value;
        total += dim_weight;
    }
    if total <= 0.0 {
        return 0;
    }
    to_percent(weighted / total)
}

fn saturate(value: f64, at: f64) -> f64 {
    (value / at).clamp(0.0, 1.0)
}

fn to_percent(fraction: f64) -> u32 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u32
}
