//! Greedy hook ↔ transcript pairing.
//!
//! Hooks are visited in `(startTime, sessionId)` order. Each hook claims its
//! best-scoring unclaimed transcript; a claimed transcript leaves the pool.
//! There is no backtracking.

use skald_core::config::{CorrelationConfig, MatchThresholds};
use skald_core::{HookSessionRecord, TranscriptRecord};
use time::Duration;

use crate::conversation::{CorrelatedConversation, MatchDetails, MatchType};
use crate::normalize::{hook_interval, normalize_path, project_dir_contains, transcript_interval};

/// Map a weighted score onto a tier. `None` means too weak to pair.
pub fn classify_score(score: f64, thresholds: &MatchThresholds) -> Option<MatchType> {
    if score >= thresholds.exact {
        Some(MatchType::Exact)
    } else if score > thresholds.confident {
        Some(MatchType::Confident)
    } else if score > thresholds.uncertain {
        Some(MatchType::Uncertain)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    details: MatchDetails,
    tier: MatchType,
    delta_secs: i64,
}

/// Pair hooks with transcripts. Every input record ends up in exactly one
/// returned conversation.
pub fn correlate_sessions(
    hooks: &[HookSessionRecord],
    transcripts: &[TranscriptRecord],
    config: &CorrelationConfig,
) -> Vec<CorrelatedConversation> {
    let mut hook_order: Vec<&HookSessionRecord> = hooks.iter().collect();
    hook_order.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });

    let mut pool: Vec<&TranscriptRecord> = transcripts.iter().collect();
    pool.sort_by(|a, b| {
        transcript_interval(a)
            .start
            .cmp(&transcript_interval(b).start)
            .then_with(|| a.id.cmp(&b.id))
    });
    let mut claimed = vec![false; pool.len()];

    let mut conversations = Vec::with_capacity(hooks.len() + transcripts.len());

    for hook in hook_order {
        let best = pool
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .filter_map(|(i, t)| evaluate(hook, t, i, config))
            .fold(None::<Candidate>, |best, c| match best {
                None => Some(c),
                Some(b) if better(&c, &b) => Some(c),
                keep => keep,
            });

        match best {
            Some(c) => {
                claimed[c.index] = true;
                let transcript = pool[c.index];
                tracing::debug!(
                    session_id = %hook.session_id,
                    transcript_id = %transcript.id,
                    score = c.details.score,
                    tier = ?c.tier,
                    "paired hook session with transcript"
                );
                conversations.push(CorrelatedConversation::from_hook(
                    hook.clone(),
                    Some(transcript.clone()),
                    c.tier,
                    c.details,
                ));
            }
            None => {
                tracing::debug!(session_id = %hook.session_id, "hook session has no transcript candidate");
                conversations.push(CorrelatedConversation::from_hook(
                    hook.clone(),
                    None,
                    MatchType::Unmatched,
                    MatchDetails::default(),
                ));
            }
        }
    }

    for (i, transcript) in pool.iter().enumerate() {
        if !claimed[i] {
            conversations.push(CorrelatedConversation::from_transcript((*transcript).clone()));
        }
    }

    conversations
}

/// Higher score wins; ties go to the smaller start-time delta, then to pool order.
fn better(a: &Candidate, b: &Candidate) -> bool {
    match a.details.score.total_cmp(&b.details.score) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => (a.delta_secs, a.index) < (b.delta_secs, b.index),
    }
}

fn evaluate(
    hook: &HookSessionRecord,
    transcript: &TranscriptRecord,
    index: usize,
    config: &CorrelationConfig,
) -> Option<Candidate> {
    let direct = is_direct_link(hook, transcript);
    let mut details = match_details(hook, transcript, config);
    if direct {
        details.score = 1.0;
    } else if config.require_location_match && !details.path_match && !details.cwd_match {
        return None;
    }

    let tier = classify_score(details.score, &config.thresholds)?;
    let delta_secs = (transcript_interval(transcript).start - hook.start_time)
        .whole_seconds()
        .abs();
    Some(Candidate {
        index,
        details,
        tier,
        delta_secs,
    })
}

/// The hook recorded the transcript's path itself.
fn is_direct_link(hook: &HookSessionRecord, transcript: &TranscriptRecord) -> bool {
    match hook.transcript_path.as_deref().and_then(normalize_path) {
        Some(p) => normalize_path(&transcript.path).as_deref() == Some(p.as_str()),
        None => false,
    }
}

/// Compute the four sub-matches and their weighted score in `[0, 1]`.
pub(crate) fn match_details(
    hook: &HookSessionRecord,
    transcript: &TranscriptRecord,
    config: &CorrelationConfig,
) -> MatchDetails {
    let project_dir = transcript.project_dir.as_deref();

    let path_match = project_dir.is_some_and(|dir| project_dir_contains(dir, &hook.cwd));
    let time_match = hook_interval(hook).overlaps(
        &transcript_interval(transcript),
        Duration::seconds(config.time_tolerance_secs),
    );
    let cwd_match = project_dir.is_some_and(|dir| !dir.is_empty() && dir == hook.cwd);
    let tool_count_match = match transcript.message_count {
        Some(messages) if hook.tool_count > 0 => {
            let ratio = f64::from(messages) / f64::from(hook.tool_count);
            ratio >= config.message_ratio.min && ratio <= config.message_ratio.max
        }
        _ => false,
    };

    let w = &config.weights;
    let total = w.path + w.time + w.cwd + w.tool_count;
    let raw = [
        (path_match, w.path),
        (time_match, w.time),
        (cwd_match, w.cwd),
        (tool_count_match, w.tool_count),
    ]
    .iter()
    .filter(|(hit, _)| *hit)
    .map(|(_, weight)| weight)
    .sum::<f64>();
    let score = if total > 0.0 { raw / total } else { 0.0 };

    MatchDetails {
        path_match,
        time_match,
        cwd_match,
        tool_count_match,
        score: (score * 1000.0).round() / 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use time::macros::datetime;
    use time::OffsetDateTime;

    fn hook(id: &str, cwd: &str, start: OffsetDateTime, mins: i64, tools: u32) -> HookSessionRecord {
        HookSessionRecord {
            session_id: id.into(),
            cwd: cwd.into(),
            start_time: start,
            end_time: Some(start + Duration::minutes(mins)),
            tool_count: tools,
            tools_used: vec![],
            source: "claude".into(),
            transcript_path: None,
        }
    }

    fn transcript(
        id: &str,
        dir: Option<&str>,
        start: OffsetDateTime,
        mins: i64,
        messages: Option<u32>,
    ) -> TranscriptRecord {
        TranscriptRecord {
            id: id.into(),
            agent: "claude".into(),
            path: format!("/t/{id}.jsonl"),
            project_dir: dir.map(String::from),
            modified_at: start + Duration::minutes(mins),
            size_bytes: 0,
            message_count: messages,
            start_time: Some(start),
            end_time: Some(start + Duration::minutes(mins)),
        }
    }

    const T0: OffsetDateTime = datetime!(2026-03-01 10:00 UTC);

    #[test]
    fn classify_boundaries() {
        let t = MatchThresholds::default();
        assert_eq!(classify_score(0.9, &t), Some(MatchType::Exact));
        assert_eq!(classify_score(0.7, &t), Some(MatchType::Confident));
        assert_eq!(classify_score(0.6, &t), Some(MatchType::Uncertain));
        assert_eq!(classify_score(0.45, &t), Some(MatchType::Uncertain));
        assert_eq!(classify_score(0.35, &t), None);
        assert_eq!(classify_score(0.0, &t), None);
    }

    #[test]
    fn same_cwd_and_overlap_is_exact_or_confident() {
        let cfg = CorrelationConfig::default();
        // No message count: tool-count corroboration is unavailable.
        let hooks = vec![hook("h", "/w/app", T0, 30, 0)];
        let ts = vec![transcript("t", Some("/w/app"), T0 + Duration::minutes(10), 60, None)];
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        assert_eq!(convs.len(), 1);
        assert!(matches!(
            convs[0].match_type,
            MatchType::Exact | MatchType::Confident
        ));
        assert!(convs[0].match_details.cwd_match);
        assert!(convs[0].match_details.time_match);
    }

    #[test]
    fn no_shared_signal_is_hook_only() {
        let cfg = CorrelationConfig::default();
        let hooks = vec![hook("h", "/w/app", T0, 30, 5)];
        let ts = vec![transcript(
            "t",
            Some("/elsewhere"),
            T0 + Duration::days(3),
            10,
            Some(500),
        )];
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        assert_eq!(convs.len(), 2);
        let h = convs.iter().find(|c| c.hook_session.is_some()).unwrap();
        assert!(h.is_hook_only());
        assert_eq!(h.match_type, MatchType::Unmatched);
        let t = convs.iter().find(|c| c.transcript.is_some()).unwrap();
        assert!(t.is_transcript_only());
    }

    #[test]
    fn subdirectory_cwd_matches_by_path_only() {
        let cfg = CorrelationConfig::default();
        let hooks = vec![hook("h", "/w/app/crates/core", T0, 30, 10)];
        let ts = vec![transcript("t", Some("/w/app"), T0, 30, Some(20))];
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        let d = convs[0].match_details;
        assert!(d.path_match && d.time_match && d.tool_count_match);
        assert!(!d.cwd_match);
        assert_eq!(d.score, 0.8);
        assert_eq!(convs[0].match_type, MatchType::Confident);
    }

    #[test]
    fn encoded_project_dir_matches() {
        let cfg = CorrelationConfig::default();
        let hooks = vec![hook("h", "/Users/ann/dev/app", T0, 30, 10)];
        let ts = vec![transcript("t", Some("-Users-ann-dev-app"), T0, 30, Some(30))];
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        assert_eq!(convs.len(), 1);
        assert!(convs[0].match_details.path_match);
        assert!(!convs[0].match_details.cwd_match);
    }

    #[test]
    fn direct_transcript_path_link_is_exact() {
        let cfg = CorrelationConfig::default();
        let mut h = hook("h", "/w/app", T0, 30, 10);
        h.transcript_path = Some("/t/t.jsonl".into());
        // Directory and time disagree, but the hook named the file.
        let ts = vec![transcript("t", Some("/other"), T0 + Duration::days(2), 5, None)];
        let convs = correlate_sessions(&[h], &ts, &cfg);
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].match_type, MatchType::Exact);
        assert_eq!(convs[0].match_details.score, 1.0);
    }

    #[test]
    fn best_score_wins_then_smallest_delta() {
        let cfg = CorrelationConfig::default();
        let hooks = vec![hook("h", "/w/app", T0, 60, 10)];
        let ts = vec![
            // Same score as `near`, further away in time.
            transcript("far", Some("/w/app"), T0 + Duration::minutes(40), 10, Some(30)),
            transcript("near", Some("/w/app"), T0 + Duration::minutes(2), 10, Some(30)),
            // Weaker: no message count.
            transcript("weak", Some("/w/app"), T0, 10, None),
        ];
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        let paired = convs.iter().find(|c| c.hook_session.is_some()).unwrap();
        assert_eq!(paired.transcript.as_ref().unwrap().id, "near");
        assert_eq!(convs.len(), 3);
    }

    #[test]
    fn claimed_transcript_leaves_pool() {
        let cfg = CorrelationConfig::default();
        let hooks = vec![
            hook("h1", "/w/app", T0, 30, 10),
            hook("h2", "/w/app", T0 + Duration::minutes(1), 30, 10),
        ];
        let ts = vec![transcript("t", Some("/w/app"), T0, 30, Some(30))];
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        assert_eq!(convs.len(), 2);
        let with_t: Vec<_> = convs.iter().filter(|c| c.transcript.is_some()).collect();
        assert_eq!(with_t.len(), 1);
        assert_eq!(with_t[0].hook_session.as_ref().unwrap().session_id, "h1");
    }

    /// Greedy assignment is order-dependent: the earlier hook takes its best
    /// transcript even when a globally better pairing would leave nobody alone.
    #[test]
    fn ambiguous_candidates_resolved_greedily() {
        let cfg = CorrelationConfig::default();
        let hooks = vec![
            hook("early", "/w/app", T0, 120, 10),
            hook("late", "/w/lib", T0 + Duration::minutes(90), 10, 10),
        ];
        let ts = vec![
            transcript("t-a", Some("/w"), T0 + Duration::minutes(88), 5, Some(30)),
            transcript("t-b", Some("/w"), T0 + Duration::minutes(110), 5, None),
        ];
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        let pair_of = |id: &str| {
            convs
                .iter()
                .find(|c| c.hook_session.as_ref().map(|h| h.session_id.as_str()) == Some(id))
                .and_then(|c| c.transcript.as_ref().map(|t| t.id.clone()))
        };
        // early scores 0.8 on t-a and 0.7 on t-b, so it claims t-a.
        assert_eq!(pair_of("early").as_deref(), Some("t-a"));
        // late only overlaps t-a; t-b alone is a bare path match (0.35).
        assert_eq!(pair_of("late"), None);
        assert!(convs
            .iter()
            .any(|c| c.is_transcript_only() && c.transcript.as_ref().unwrap().id == "t-b"));
    }

    #[test]
    fn location_gate_can_be_disabled() {
        let mut cfg = CorrelationConfig::default();
        let hooks = vec![hook("h", "/w/app", T0, 30, 10)];
        let ts = vec![transcript("t", Some("/elsewhere"), T0, 30, Some(30))];
        assert_eq!(correlate_sessions(&hooks, &ts, &cfg).len(), 2);

        cfg.require_location_match = false;
        let convs = correlate_sessions(&hooks, &ts, &cfg);
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].match_type, MatchType::Uncertain);
    }

    #[test]
    fn never_assigns_a_record_twice() {
        let cfg = CorrelationConfig::default();
        let mut hooks = Vec::new();
        let mut ts = Vec::new();
        for i in 0..12i64 {
            let dir = if i % 3 == 0 { "/w/a" } else { "/w/b" };
            hooks.push(hook(&format!("h{i}"), dir, T0 + Duration::minutes(i * 7), 20, 5));
            ts.push(transcript(
                &format!("t{i}"),
                Some(if i % 2 == 0 { "/w/a" } else { "/w/b" }),
                T0 + Duration::minutes(i * 5),
                15,
                Some(12),
            ));
        }
        let convs = correlate_sessions(&hooks, &ts, &cfg);

        let mut seen_h = HashSet::new();
        let mut seen_t = HashSet::new();
        for c in &convs {
            if let Some(h) = &c.hook_session {
                assert!(seen_h.insert(h.session_id.clone()), "hook reused");
            }
            if let Some(t) = &c.transcript {
                assert!(seen_t.insert(t.id.clone()), "transcript reused");
            }
        }
        assert_eq!(seen_h.len(), hooks.len());
        assert_eq!(seen_t.len(), ts.len());
    }

    #[test]
    fn custom_weights_are_normalized() {
        let mut cfg = CorrelationConfig::default();
        cfg.weights.path = 2.0;
        cfg.weights.time = 2.0;
        cfg.weights.cwd = 0.0;
        cfg.weights.tool_count = 0.0;
        let h = hook("h", "/w/app", T0, 30, 0);
        let t = transcript("t", Some("/w/app"), T0, 30, None);
        assert_eq!(match_details(&h, &t, &cfg).score, 1.0);
    }
}
