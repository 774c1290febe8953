//! Read accessors for the record sources.
//!
//! Collectors own these stores; correlation and export only read. Each trait
//! is object-safe so callers can hand in real stores or [`MemoryStore`].

use anyhow::Result;
use skald_core::{HookSessionRecord, ManagedSessionRecord, ProjectRecord, TranscriptRecord};
use std::collections::HashMap;
use skald_core::config::CorrelationConfig;
use time::{Duration, OffsetDateTime, PrimitiveDateTime};

use crate::normalize::transcript_interval;

/// Lower bound on record timestamps for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelationWindow {
    pub since: OffsetDateTime,
}

impl CorrelationWindow {
    /// `days` back from `now`, clamped to the earliest representable instant.
    pub fn last_days(now: OffsetDateTime, days: u32) -> Self {
        let since = now
            .checked_sub(Duration::days(i64::from(days)))
            .unwrap_or(PrimitiveDateTime::MIN.assume_utc());
        Self { since }
    }

    /// The configured `window_days` back from `now`.
    pub fn from_config(now: OffsetDateTime, config: &CorrelationConfig) -> Self {
        Self::last_days(now, config.window_days)
    }
}

#[async_trait::async_trait]
pub trait HookSessionStore: Send + Sync {
    /// Hook sessions still running or ended at or after `since`.
    async fn hook_sessions(&self, since: OffsetDateTime) -> Result<Vec<HookSessionRecord>>;
}

#[async_trait::async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Transcripts active at or after `since`.
    async fn transcripts(&self, since: OffsetDateTime) -> Result<Vec<TranscriptRecord>>;

    /// Full raw content of one transcript file.
    async fn read_content(&self, transcript: &TranscriptRecord) -> Result<Vec<u8>>;
}

#[async_trait::async_trait]
pub trait ManagedSessionStore: Send + Sync {
    async fn managed_sessions(&self, since: OffsetDateTime) -> Result<Vec<ManagedSessionRecord>>;
}

#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn projects(&self) -> Result<Vec<ProjectRecord>>;
}

/// The four sources handed to correlation and export.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub hooks: &'a dyn HookSessionStore,
    pub transcripts: &'a dyn TranscriptStore,
    pub managed: &'a dyn ManagedSessionStore,
    pub projects: &'a dyn ProjectStore,
}

impl<'a> Stores<'a> {
    /// Use one value that implements every store.
    pub fn from_single<S>(store: &'a S) -> Self
    where
        S: HookSessionStore + TranscriptStore + ManagedSessionStore + ProjectStore,
    {
        Self {
            hooks: store,
            transcripts: store,
            managed: store,
            projects: store,
        }
    }
}

/// In-memory implementation of every store, keyed by transcript path for content.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    hooks: Vec<HookSessionRecord>,
    transcripts: Vec<TranscriptRecord>,
    managed: Vec<ManagedSessionRecord>,
    projects: Vec<ProjectRecord>,
    contents: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hooks(mut self, hooks: Vec<HookSessionRecord>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_transcripts(mut self, transcripts: Vec<TranscriptRecord>) -> Self {
        self.transcripts = transcripts;
        self
    }

    pub fn with_managed(mut self, managed: Vec<ManagedSessionRecord>) -> Self {
        self.managed = managed;
        self
    }

    pub fn with_projects(mut self, projects: Vec<ProjectRecord>) -> Self {
        self.projects = projects;
        self
    }

    pub fn with_content(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.contents.insert(path.to_string(), content.into());
        self
    }
}

#[async_trait::async_trait]
impl HookSessionStore for MemoryStore {
    async fn hook_sessions(&self, since: OffsetDateTime) -> Result<Vec<HookSessionRecord>> {
        Ok(self
            .hooks
            .iter()
            .filter(|h| h.end_time.map_or(true, |end| end >= since))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl TranscriptStore for MemoryStore {
    async fn transcripts(&self, since: OffsetDateTime) -> Result<Vec<TranscriptRecord>> {
        Ok(self
            .transcripts
            .iter()
            .filter(|t| transcript_interval(t).end.map_or(true, |end| end >= since))
            .cloned()
            .collect())
    }

    async fn read_content(&self, transcript: &TranscriptRecord) -> Result<Vec<u8>> {
        self.contents
            .get(&transcript.path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("transcript content not found: {}", transcript.path))
    }
}

#[async_trait::async_trait]
impl ManagedSessionStore for MemoryStore {
    async fn managed_sessions(&self, since: OffsetDateTime) -> Result<Vec<ManagedSessionRecord>> {
        Ok(self
            .managed
            .iter()
            .filter(|m| m.ended_at.map_or(true, |end| end >= since))
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryStore {
    async fn projects(&self) -> Result<Vec<ProjectRecord>> {
        Ok(self.projects.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn transcript(path: &str, modified: OffsetDateTime) -> TranscriptRecord {
        TranscriptRecord {
            id: path.into(),
            agent: "claude".into(),
            path: path.into(),
            project_dir: None,
            modified_at: modified,
            size_bytes: 0,
            message_count: None,
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn window_last_days() {
        let w = CorrelationWindow::last_days(datetime!(2026-03-08 00:00 UTC), 7);
        assert_eq!(w.since, datetime!(2026-03-01 00:00 UTC));

        let config = CorrelationConfig {
            window_days: 2,
            ..Default::default()
        };
        let w = CorrelationWindow::from_config(datetime!(2026-03-08 00:00 UTC), &config);
        assert_eq!(w.since, datetime!(2026-03-06 00:00 UTC));
    }

    #[tokio::test]
    async fn memory_store_filters_by_window() {
        let since = datetime!(2026-03-01 00:00 UTC);
        let store = MemoryStore::new().with_transcripts(vec![
            transcript("/old.jsonl", datetime!(2026-02-01 00:00 UTC)),
            transcript("/new.jsonl", datetime!(2026-03-02 00:00 UTC)),
        ]);
        let found = store.transcripts(since).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "/new.jsonl");
    }

    #[tokio::test]
    async fn read_content_by_path() {
        let t = transcript("/a.jsonl", datetime!(2026-03-02 00:00 UTC));
        let store = MemoryStore::new().with_content("/a.jsonl", "{\"type\":\"user\"}\n");
        assert_eq!(store.read_content(&t).await.unwrap(), b"{\"type\":\"user\"}\n");

        let missing = transcript("/b.jsonl", datetime!(2026-03-02 00:00 UTC));
        assert!(store.read_content(&missing).await.is_err());
    }

    #[tokio::test]
    async fn stores_from_single_dispatches() {
        let store = MemoryStore::new().with_projects(vec![ProjectRecord {
            id: "p".into(),
            name: "P".into(),
            paths: vec!["/w".into()],
        }]);
        let stores = Stores::from_single(&store);
        assert_eq!(stores.projects.projects().await.unwrap().len(), 1);
        assert!(stores
            .hooks
            .hook_sessions(datetime!(2026-01-01 00:00 UTC))
            .await
            .unwrap()
            .is_empty());
    }
}
