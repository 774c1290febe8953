use serde::{Deserialize, Serialize};

use crate::conversation::{CorrelatedConversation, MatchType};

/// Counts over a correlated set, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationStats {
    pub total: usize,
    pub exact: usize,
    pub confident: usize,
    pub uncertain: usize,
    pub unmatched: usize,
    pub hook_only: usize,
    pub transcript_only: usize,
    pub managed_only: usize,
    pub with_managed_session: usize,
}

pub fn get_correlation_stats(conversations: &[CorrelatedConversation]) -> CorrelationStats {
    let mut stats = CorrelationStats {
        total: conversations.len(),
        ..Default::default()
    };
    for conv in conversations {
        match conv.match_type {
            MatchType::Exact => stats.exact += 1,
            MatchType::Confident => stats.confident += 1,
            MatchType::Uncertain => stats.uncertain += 1,
            MatchType::Unmatched => stats.unmatched += 1,
        }
        if conv.is_hook_only() {
            stats.hook_only += 1;
        }
        if conv.is_transcript_only() {
            stats.transcript_only += 1;
        }
        if conv.is_managed_only() {
            stats.managed_only += 1;
        } else if conv.managed_session.is_some() {
            stats.with_managed_session += 1;
        }
    }
    stats
}
