//! Correlation of independently collected session records.
//!
//! Hook telemetry, transcript files, and launcher-managed runs each describe
//! the same coding session from a different angle. This crate reconciles them
//! into [`CorrelatedConversation`]s with a confidence tier, then attaches the
//! owning project.

mod attach;
mod conversation;
mod matcher;
pub mod normalize;
mod stats;
pub mod store;

pub use attach::{attach_managed_sessions, attach_projects};
pub use conversation::{CorrelatedConversation, MatchDetails, MatchType};
pub use matcher::{classify_score, correlate_sessions};
pub use stats::{get_correlation_stats, CorrelationStats};
pub use store::{
    CorrelationWindow, HookSessionStore, ManagedSessionStore, MemoryStore, ProjectStore, Stores,
    TranscriptStore,
};

use serde::Serialize;
use skald_core::config::CorrelationConfig;
use skald_core::{HookSessionRecord, ManagedSessionRecord, ProjectRecord, TranscriptRecord};

/// Everything the correlator needs for one request window.
#[derive(Debug, Clone, Default)]
pub struct CorrelationInput {
    pub hooks: Vec<HookSessionRecord>,
    pub transcripts: Vec<TranscriptRecord>,
    pub managed: Vec<ManagedSessionRecord>,
    pub projects: Vec<ProjectRecord>,
}

/// Listing payload handed to the route layer.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationListing {
    pub conversations: Vec<CorrelatedConversation>,
    pub stats: CorrelationStats,
}

/// Run the full pipeline: pair hooks with transcripts, attach managed runs,
/// attach projects, assign ids, and order newest first.
///
/// Pure and deterministic: identical input yields identical output.
pub fn correlate(input: &CorrelationInput, config: &CorrelationConfig) -> Vec<CorrelatedConversation> {
    let mut conversations = correlate_sessions(&input.hooks, &input.transcripts, config);
    attach_managed_sessions(&mut conversations, &input.managed, config);
    attach_projects(&mut conversations, &input.projects);
    for conv in &mut conversations {
        conv.assign_correlation_id();
    }
    conversations.sort_by(|a, b| {
        b.start_time
            .cmp(&a.start_time)
            .then_with(|| a.correlation_id.cmp(&b.correlation_id))
    });
    conversations
}

/// Read every source for `window` and correlate. Without an explicit window
/// the last `window_days` up to now are listed.
pub async fn list_conversations(
    stores: &Stores<'_>,
    window: Option<CorrelationWindow>,
    config: &CorrelationConfig,
) -> anyhow::Result<ConversationListing> {
    let window = window
        .unwrap_or_else(|| CorrelationWindow::from_config(time::OffsetDateTime::now_utc(), config));
    let input = CorrelationInput {
        hooks: stores.hooks.hook_sessions(window.since).await?,
        transcripts: stores.transcripts.transcripts(window.since).await?,
        managed: stores.managed.managed_sessions(window.since).await?,
        projects: stores.projects.projects().await?,
    };

    let conversations = correlate(&input, config);
    let stats = get_correlation_stats(&conversations);
    tracing::info!(
        hooks = input.hooks.len(),
        transcripts = input.transcripts.len(),
        managed = input.managed.len(),
        total = stats.total,
        exact = stats.exact,
        confident = stats.confident,
        uncertain = stats.uncertain,
        unmatched = stats.unmatched,
        "correlated sessions"
    );

    Ok(ConversationListing {
        conversations,
        stats,
    })
}
