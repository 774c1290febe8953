use serde::{Deserialize, Serialize};
use serde_json::Value;
use skald_core::config::SanitizerConfig;

use crate::entropy::looks_random;
use crate::patterns::{
    replace_counted, replace_counted_unless, EMAIL, ENTROPY_TOKEN, IPV4, IPV6, IP_ALLOWLIST,
    SECRET_PATTERNS, UNIX_HOME, WINDOWS_HOME,
};

pub const HOME_PLACEHOLDER: &str = "[HOME]";
const EMAIL_PLACEHOLDER: &str = "[REDACTED_EMAIL]";
const IP_PLACEHOLDER: &str = "[REDACTED_IP]";
const ENTROPY_PLACEHOLDER: &str = "[REDACTED_HIGH_ENTROPY]";
/// High-entropy tokens at least this long are also counted as secrets.
const ENTROPY_SECRET_MIN_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionCategory {
    Secrets,
    Pii,
    Paths,
    HighEntropy,
}

/// Per-category redaction counts.
///
/// A long high-entropy token counts under both `secrets` and `highEntropy`;
/// `totalRedactions` counts each replacement once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactionReport {
    pub secrets: usize,
    pub pii: usize,
    pub paths: usize,
    pub high_entropy: usize,
    pub total_redactions: usize,
}

impl RedactionReport {
    pub fn record(&mut self, category: RedactionCategory, count: usize) {
        match category {
            RedactionCategory::Secrets => self.secrets += count,
            RedactionCategory::Pii => self.pii += count,
            RedactionCategory::Paths => self.paths += count,
            RedactionCategory::HighEntropy => self.high_entropy += count,
        }
        self.total_redactions += count;
    }

    /// Count `count` already-recorded high-entropy hits as secrets too.
    fn record_entropy_secrets(&mut self, count: usize) {
        self.secrets += count;
    }

    pub fn merge(&mut self, other: &RedactionReport) {
        self.secrets += other.secrets;
        self.pii += other.pii;
        self.paths += other.paths;
        self.high_entropy += other.high_entropy;
        self.total_redactions += other.total_redactions;
    }

    pub fn count(&self, category: RedactionCategory) -> usize {
        match category {
            RedactionCategory::Secrets => self.secrets,
            RedactionCategory::Pii => self.pii,
            RedactionCategory::Paths => self.paths,
            RedactionCategory::HighEntropy => self.high_entropy,
        }
    }
}

/// Redacts text and JSON trees, keeping a running report across calls.
///
/// `scan_text` / `scan_value` are pure: they return the redacted copy and the
/// counts for that one input. `redact_text` / `redact_object` do the same and
/// fold the counts into [`Sanitizer::report`].
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    config: SanitizerConfig,
    report: RedactionReport,
}

impl Sanitizer {
    pub fn new(config: SanitizerConfig) -> Self {
        Self {
            config,
            report: RedactionReport::default(),
        }
    }

    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Cumulative counts for every call made on this instance.
    pub fn report(&self) -> &RedactionReport {
        &self.report
    }

    pub fn redact_text(&mut self, text: &str) -> String {
        let (out, report) = self.scan_text(text);
        self.report.merge(&report);
        out
    }

    pub fn redact_object(&mut self, value: &Value) -> Value {
        let (out, report) = self.scan_value(value);
        self.report.merge(&report);
        out
    }

    pub fn scan_text(&self, text: &str) -> (String, RedactionReport) {
        let mut report = RedactionReport::default();
        let out = self.redact_str(text, &mut report);
        (out, report)
    }

    pub fn scan_value(&self, value: &Value) -> (Value, RedactionReport) {
        let mut report = RedactionReport::default();
        let out = self.redact_value(value, 0, &mut report);
        (out, report)
    }

    fn redact_value(&self, value: &Value, depth: usize, report: &mut RedactionReport) -> Value {
        if depth > self.config.max_depth {
            tracing::warn!(
                depth,
                max_depth = self.config.max_depth,
                "content nested too deeply, passing subtree through unredacted"
            );
            return value.clone();
        }
        match value {
            Value::String(s) => Value::String(self.redact_str(s, report)),
            Value::Object(map) => {
                let mut new_map = serde_json::Map::new();
                for (k, v) in map {
                    new_map.insert(k.clone(), self.redact_value(v, depth + 1, report));
                }
                Value::Object(new_map)
            }
            Value::Array(arr) => Value::Array(
                arr.iter()
                    .map(|v| self.redact_value(v, depth + 1, report))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn redact_str(&self, input: &str, report: &mut RedactionReport) -> String {
        let mut output = input.to_string();

        if self.config.secrets {
            for (pat, replacement) in SECRET_PATTERNS.iter() {
                let (next, n) = replace_counted(pat, &output, replacement);
                report.record(RedactionCategory::Secrets, n);
                output = next;
            }
        }

        if self.config.pii {
            let (next, n) = replace_counted(&EMAIL, &output, EMAIL_PLACEHOLDER);
            report.record(RedactionCategory::Pii, n);
            output = next;
            let (next, n) = replace_counted_unless(&IPV4, &output, IP_PLACEHOLDER, |m| {
                IP_ALLOWLIST.contains(&m)
            });
            report.record(RedactionCategory::Pii, n);
            output = next;
            let (next, n) = replace_counted(&IPV6, &output, IP_PLACEHOLDER);
            report.record(RedactionCategory::Pii, n);
            output = next;
        }

        if self.config.paths {
            let (next, n) = replace_counted(&UNIX_HOME, &output, "${1}[HOME]");
            report.record(RedactionCategory::Paths, n);
            output = next;
            let (next, n) = replace_counted(&WINDOWS_HOME, &output, HOME_PLACEHOLDER);
            report.record(RedactionCategory::Paths, n);
            output = next;
        }

        if self.config.high_entropy {
            let min_len = self.config.entropy_min_len;
            let threshold = self.config.entropy_threshold;
            let long = ENTROPY_TOKEN
                .find_iter(&output)
                .map(|m| m.as_str())
                .filter(|t| t.len() >= ENTROPY_SECRET_MIN_LEN && looks_random(t, min_len, threshold))
                .count();
            let (next, n) = replace_counted_unless(&ENTROPY_TOKEN, &output, ENTROPY_PLACEHOLDER, |m| {
                !looks_random(m, min_len, threshold)
            });
            report.record(RedactionCategory::HighEntropy, n);
            report.record_entropy_secrets(long);
            output = next;
        }

        output
    }
}
