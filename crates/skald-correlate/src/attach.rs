use skald_core::config::CorrelationConfig;
use skald_core::{ManagedSessionRecord, ProjectRecord};
use time::Duration;

use crate::conversation::CorrelatedConversation;
use crate::normalize::{ancestor_match_len, same_dir};

/// Attach launcher-managed runs to conversations.
///
/// A run attaches when its cwd is the conversation's directory and its start
/// falls inside the conversation window (widened by `managed_tolerance_secs`).
/// Each run attaches at most once; leftovers become managed-only conversations.
pub fn attach_managed_sessions(
    conversations: &mut Vec<CorrelatedConversation>,
    managed: &[ManagedSessionRecord],
    config: &CorrelationConfig,
) {
    let tolerance = Duration::seconds(config.managed_tolerance_secs);

    let mut runs: Vec<&ManagedSessionRecord> = managed.iter().collect();
    runs.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
    let mut claimed = vec![false; runs.len()];

    let mut order: Vec<usize> = (0..conversations.len()).collect();
    order.sort_by(|&a, &b| {
        conversations[a]
            .start_time
            .cmp(&conversations[b].start_time)
            .then_with(|| conversations[a].cwd.cmp(&conversations[b].cwd))
    });

    for idx in order {
        let conv = &conversations[idx];
        if conv.managed_session.is_some() || conv.cwd.is_empty() {
            continue;
        }
        let window = conv.interval();

        let best = runs
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .filter(|(_, run)| same_dir(&run.cwd, &conv.cwd))
            .filter(|(_, run)| window.contains(run.started_at, tolerance))
            .min_by_key(|(i, run)| ((run.started_at - conv.start_time).abs(), *i))
            .map(|(i, _)| i);

        if let Some(i) = best {
            claimed[i] = true;
            tracing::debug!(managed_id = %runs[i].id, cwd = %conv.cwd, "attached managed session");
            conversations[idx].managed_session = Some(runs[i].clone());
        }
    }

    for (i, run) in runs.iter().enumerate() {
        if !claimed[i] {
            conversations.push(CorrelatedConversation::from_managed((*run).clone()));
        }
    }
}

/// Attach the project whose declared path is the longest prefix of the
/// conversation cwd. Equal-length matches keep the first declared project.
pub fn attach_projects(conversations: &mut [CorrelatedConversation], projects: &[ProjectRecord]) {
    for conv in conversations.iter_mut() {
        if conv.cwd.is_empty() {
            continue;
        }
        let mut best: Option<(usize, &ProjectRecord)> = None;
        for project in projects {
            for path in &project.paths {
                if let Some(len) = ancestor_match_len(path, &conv.cwd) {
                    if best.map_or(true, |(best_len, _)| len > best_len) {
                        best = Some((len, project));
                    }
                }
            }
        }
        conv.project = best.map(|(_, p)| p.clone());
    }
}
