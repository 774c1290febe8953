use serde::{Deserialize, Serialize};
use skald_core::{HookSessionRecord, ManagedSessionRecord, ProjectRecord, TranscriptRecord};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::normalize::{hook_interval, managed_interval, transcript_interval, Interval};

/// Fixed namespace UUID for correlation ids.
const CORRELATION_NS: Uuid = Uuid::from_bytes([
    0x5c, 0xa1, 0xd0, 0xc0, 0x00, 0x00, 0x40, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
]);

/// Confidence tier of a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Unmatched,
    Uncertain,
    Confident,
    Exact,
}

/// Which sub-signals agreed for the chosen hook/transcript pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    pub path_match: bool,
    pub time_match: bool,
    pub cwd_match: bool,
    pub tool_count_match: bool,
    pub score: f64,
}

/// One coding session as seen through up to three sources.
///
/// Each source record is owned by at most one conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelatedConversation {
    pub correlation_id: String,
    pub match_type: MatchType,
    pub match_details: MatchDetails,
    #[serde(with = "skald_core::ts")]
    pub start_time: OffsetDateTime,
    pub cwd: String,
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_session: Option<HookSessionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_session: Option<ManagedSessionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRecord>,
}

impl CorrelatedConversation {
    pub(crate) fn from_hook(
        hook: HookSessionRecord,
        transcript: Option<TranscriptRecord>,
        match_type: MatchType,
        match_details: MatchDetails,
    ) -> Self {
        Self {
            correlation_id: String::new(),
            match_type,
            match_details,
            start_time: hook.start_time,
            cwd: hook.cwd.clone(),
            agent: hook.source.clone(),
            hook_session: Some(hook),
            transcript,
            managed_session: None,
            project: None,
        }
    }

    pub(crate) fn from_transcript(transcript: TranscriptRecord) -> Self {
        Self {
            correlation_id: String::new(),
            match_type: MatchType::Unmatched,
            match_details: MatchDetails::default(),
            start_time: transcript_interval(&transcript).start,
            cwd: transcript.project_dir.clone().unwrap_or_default(),
            agent: transcript.agent.clone(),
            hook_session: None,
            transcript: Some(transcript),
            managed_session: None,
            project: None,
        }
    }

    pub(crate) fn from_managed(managed: ManagedSessionRecord) -> Self {
        Self {
            correlation_id: String::new(),
            match_type: MatchType::Unmatched,
            match_details: MatchDetails::default(),
            start_time: managed.started_at,
            cwd: managed.cwd.clone(),
            agent: managed.agent.clone(),
            hook_session: None,
            transcript: None,
            managed_session: Some(managed),
            project: None,
        }
    }

    /// Time span covered by the primary source (hook, else transcript, else managed run).
    pub fn interval(&self) -> Interval {
        if let Some(h) = &self.hook_session {
            hook_interval(h)
        } else if let Some(t) = &self.transcript {
            transcript_interval(t)
        } else if let Some(m) = &self.managed_session {
            managed_interval(m)
        } else {
            Interval {
                start: self.start_time,
                end: Some(self.start_time),
            }
        }
    }

    pub fn is_hook_only(&self) -> bool {
        self.hook_session.is_some() && self.transcript.is_none()
    }

    pub fn is_transcript_only(&self) -> bool {
        self.transcript.is_some() && self.hook_session.is_none()
    }

    pub fn is_managed_only(&self) -> bool {
        self.managed_session.is_some() && self.hook_session.is_none() && self.transcript.is_none()
    }

    /// Stable identifier derived from the ids of the attached source records.
    pub(crate) fn assign_correlation_id(&mut self) {
        let key = format!(
            "h:{}|t:{}|m:{}",
            self.hook_session
                .as_ref()
                .map(|h| h.session_id.as_str())
                .unwrap_or(""),
            self.transcript.as_ref().map(|t| t.id.as_str()).unwrap_or(""),
            self.managed_session
                .as_ref()
                .map(|m| m.id.as_str())
                .unwrap_or(""),
        );
        self.correlation_id = Uuid::new_v5(&CORRELATION_NS, key.as_bytes()).to_string();
    }
}
