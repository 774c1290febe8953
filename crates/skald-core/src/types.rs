use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Schema version written into every export manifest.
pub const BUNDLE_SCHEMA_VERSION: u32 = 1;

/// Canonicalization scheme name recorded next to bundle digests.
pub const CANON_SKALD_V1: &str = "skald-canon-v1";

/// Session emitted by agent-side hooks. Immutable once the session ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HookSessionRecord {
    pub session_id: String,
    pub cwd: String,
    #[serde(with = "crate::ts")]
    pub start_time: OffsetDateTime,
    #[serde(
        default,
        with = "crate::ts::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<OffsetDateTime>,
    #[serde(default)]
    pub tool_count: u32,
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Agent name, e.g. "claude".
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
}

/// Transcript file discovered on disk, metadata only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRecord {
    pub id: String,
    pub agent: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<String>,
    #[serde(with = "crate::ts")]
    pub modified_at: OffsetDateTime,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,
    #[serde(
        default,
        with = "crate::ts::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "crate::ts::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<OffsetDateTime>,
}

/// Lifecycle state reported by the run launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagedStatus {
    Running,
    Completed,
    Failed,
    Stopped,
    #[serde(other)]
    Unknown,
}

/// Session started and tracked by the local run launcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSessionRecord {
    pub id: String,
    pub agent: String,
    pub cwd: String,
    #[serde(with = "crate::ts")]
    pub started_at: OffsetDateTime,
    #[serde(
        default,
        with = "crate::ts::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub ended_at: Option<OffsetDateTime>,
    pub status: ManagedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// User-defined mapping of directories to a named project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub paths: Vec<String>,
}
