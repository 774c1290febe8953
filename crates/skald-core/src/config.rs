//! Tunable thresholds and weight tables.
//!
//! Every field has a default, so an empty YAML document is a valid config.
//! Operators retune match tiers, redaction sensitivity, and quality scoring
//! here instead of in code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkaldConfig {
    pub correlation: CorrelationConfig,
    pub sanitizer: SanitizerConfig,
    pub quality: QualityWeights,
    pub bundle: BundleConfig,
}

impl SkaldConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: SkaldConfig = if yaml.trim().is_empty() {
            SkaldConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.correlation.weights;
        for (name, value) in [
            ("path", w.path),
            ("time", w.time),
            ("cwd", w.cwd),
            ("tool_count", w.tool_count),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "correlation.weights.{name} must be >= 0, got {value}"
                )));
            }
        }
        let t = &self.correlation.thresholds;
        if !(t.uncertain <= t.confident && t.confident <= t.exact) {
            return Err(ConfigError::Invalid(format!(
                "correlation.thresholds must satisfy uncertain <= confident <= exact (got {} / {} / {})",
                t.uncertain, t.confident, t.exact
            )));
        }
        let r = &self.correlation.message_ratio;
        if r.min > r.max {
            return Err(ConfigError::Invalid(format!(
                "correlation.message_ratio.min ({}) exceeds max ({})",
                r.min, r.max
            )));
        }
        for (dim, weight) in &self.quality.dimension_weights {
            if !(*weight >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "quality.dimension_weights.{dim} must be >= 0"
                )));
            }
        }
        for (dim, signals) in &self.quality.signal_weights {
            for (signal, weight) in signals {
                if !(*weight >= 0.0) {
                    return Err(ConfigError::Invalid(format!(
                        "quality.signal_weights.{dim}.{signal} must be >= 0"
                    )));
                }
            }
        }
        if self.sanitizer.entropy_min_len == 0 {
            return Err(ConfigError::Invalid(
                "sanitizer.entropy_min_len must be > 0".into(),
            ));
        }
        Ok(())
    }
}

// ── Correlation ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrelationConfig {
    pub weights: MatchWeights,
    pub thresholds: MatchThresholds,
    /// Slack allowed between two intervals before they stop overlapping.
    pub time_tolerance_secs: i64,
    /// Accepted band for `messageCount / toolCount`.
    pub message_ratio: MessageRatio,
    /// Slack around a conversation window when attaching managed runs.
    pub managed_tolerance_secs: i64,
    /// Default listing window, in days back from now.
    pub window_days: u32,
    /// Only pair when the directory agrees (path or cwd) or the hook named the transcript.
    pub require_location_match: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            thresholds: MatchThresholds::default(),
            time_tolerance_secs: 300,
            message_ratio: MessageRatio::default(),
            managed_tolerance_secs: 120,
            window_days: 7,
            require_location_match: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchWeights {
    pub path: f64,
    pub time: f64,
    pub cwd: f64,
    pub tool_count: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            path: 0.35,
            time: 0.35,
            cwd: 0.20,
            tool_count: 0.10,
        }
    }
}

/// Tier cut-offs. `exact` is inclusive, the other two are strict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchThresholds {
    pub exact: f64,
    pub confident: f64,
    pub uncertain: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        Self {
            exact: 0.9,
            confident: 0.6,
            uncertain: 0.35,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MessageRatio {
    pub min: f64,
    pub max: f64,
}

impl Default for MessageRatio {
    fn default() -> Self {
        Self { min: 0.5, max: 6.0 }
    }
}

// ── Sanitizer ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SanitizerConfig {
    pub secrets: bool,
    pub pii: bool,
    pub paths: bool,
    pub high_entropy: bool,
    /// Shannon entropy in bits per character.
    pub entropy_threshold: f64,
    pub entropy_min_len: usize,
    /// Nesting depth past which structured content is passed through as-is.
    pub max_depth: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            secrets: true,
            pii: true,
            paths: true,
            high_entropy: true,
            entropy_threshold: 4.0,
            entropy_min_len: 24,
            max_depth: 128,
        }
    }
}

// ── Quality ─────────────────────────────────────────────────────────

/// Two-layer weight table for the composite quality score.
///
/// `dimension_weights` weighs top-level dimensions against each other;
/// `signal_weights[dimension]` weighs the signals inside one dimension.
/// A table given in YAML replaces the default table wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QualityWeights {
    pub dimension_weights: BTreeMap<String, f64>,
    pub signal_weights: BTreeMap<String, BTreeMap<String, f64>>,
}

impl Default for QualityWeights {
    fn default() -> Self {
        let dimensions = [("substance", 0.40), ("technical", 0.35), ("interaction", 0.25)];
        let signals: [(&str, &[(&str, f64)]); 3] = [
            ("substance", &[("length", 0.6), ("message_count", 0.4)]),
            ("technical", &[("code_blocks", 0.5), ("tool_use", 0.5)]),
            (
                "interaction",
                &[("user_turns", 0.4), ("assistant_turns", 0.3), ("preview", 0.3)],
            ),
        ];
        Self {
            dimension_weights: dimensions
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            signal_weights: signals
                .iter()
                .map(|(dim, table)| {
                    let inner = table.iter().map(|(s, w)| (s.to_string(), *w)).collect();
                    (dim.to_string(), inner)
                })
                .collect(),
        }
    }
}

// ── Bundle ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BundleConfig {
    /// `auto` format picks line-delimited at or below this session count.
    pub auto_line_delimited_max: usize,
    pub preview_chars: usize,
    pub schema_version: u32,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            auto_line_delimited_max: 3,
            preview_chars: 280,
            schema_version: crate::types::BUNDLE_SCHEMA_VERSION,
        }
    }
}
