//! Common shape for per-source records: normalized paths and time intervals.

use skald_core::{HookSessionRecord, ManagedSessionRecord, TranscriptRecord};
use time::{Duration, OffsetDateTime};

/// Session time span. `end == None` means the session is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: OffsetDateTime,
    pub end: Option<OffsetDateTime>,
}

impl Interval {
    /// True if the two spans overlap once each is widened by `tolerance`.
    pub fn overlaps(&self, other: &Interval, tolerance: Duration) -> bool {
        let self_starts_in_time = widened_end(other.end, tolerance).map_or(true, |end| self.start <= end);
        let other_starts_in_time = widened_end(self.end, tolerance).map_or(true, |end| other.start <= end);
        self_starts_in_time && other_starts_in_time
    }

    /// True if `at` falls inside the span widened by `tolerance`.
    pub fn contains(&self, at: OffsetDateTime, tolerance: Duration) -> bool {
        let after_start = self.start.checked_sub(tolerance).map_or(true, |start| at >= start);
        after_start && widened_end(self.end, tolerance).map_or(true, |end| at <= end)
    }
}

/// `end + tolerance`; `None` for an open span or one pushed past the calendar's range.
fn widened_end(end: Option<OffsetDateTime>, tolerance: Duration) -> Option<OffsetDateTime> {
    end.and_then(|end| end.checked_add(tolerance))
}

pub fn hook_interval(hook: &HookSessionRecord) -> Interval {
    Interval {
        start: hook.start_time,
        end: hook.end_time.map(|end| end.max(hook.start_time)),
    }
}

/// Transcripts fall back to their modification time when the parser found no timestamps.
pub fn transcript_interval(transcript: &TranscriptRecord) -> Interval {
    let start = transcript.start_time.unwrap_or(transcript.modified_at);
    let end = transcript.end_time.unwrap_or(transcript.modified_at).max(start);
    Interval {
        start,
        end: Some(end),
    }
}

pub fn managed_interval(managed: &ManagedSessionRecord) -> Interval {
    Interval {
        start: managed.started_at,
        end: managed.ended_at.map(|end| end.max(managed.started_at)),
    }
}

/// Normalize a filesystem path for comparison: forward slashes, no trailing separator.
pub fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let slashed = trimmed.replace('\\', "/");
    let stripped = slashed.trim_end_matches('/');
    if stripped.is_empty() {
        Some("/".to_string())
    } else {
        Some(stripped.to_string())
    }
}

/// Encode a directory the way agents name their per-project transcript folders:
/// every non-alphanumeric character becomes `-`.
pub fn encode_project_dir(path: &str) -> String {
    let normalized = normalize_path(path).unwrap_or_default();
    normalized
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// A dash-encoded directory name has no separators and starts with `-` (or a drive letter).
pub fn is_encoded_project_dir(dir: &str) -> bool {
    !dir.contains('/') && !dir.contains('\\') && (dir.starts_with('-') || dir.contains("--"))
}

/// Number of leading bytes of `path` covered by `ancestor`, or `None` when
/// `ancestor` is not `path` itself or one of its parents.
pub fn ancestor_match_len(ancestor: &str, path: &str) -> Option<usize> {
    if is_encoded_project_dir(ancestor) || is_encoded_project_dir(path) {
        let a = if is_encoded_project_dir(ancestor) {
            ancestor.to_string()
        } else {
            encode_project_dir(ancestor)
        };
        let p = if is_encoded_project_dir(path) {
            path.to_string()
        } else {
            encode_project_dir(path)
        };
        return (p == a || p.starts_with(&format!("{a}-"))).then_some(a.len());
    }

    let a = normalize_path(ancestor)?;
    let p = normalize_path(path)?;
    if a == "/" || p == a || p.starts_with(&format!("{a}/")) {
        Some(a.len())
    } else {
        None
    }
}

/// Transcript project directory equals or contains the session's cwd.
pub fn project_dir_contains(project_dir: &str, cwd: &str) -> bool {
    ancestor_match_len(project_dir, cwd).is_some()
}

/// Same directory after normalization (both plain, both encoded, or mixed).
pub fn same_dir(a: &str, b: &str) -> bool {
    ancestor_match_len(a, b).is_some() && ancestor_match_len(b, a).is_some()
}
