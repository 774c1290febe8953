//! Export pipeline: selected conversations in, published bundle out.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skald_core::paths::exports_dir;
use skald_core::SkaldConfig;
use skald_correlate::{CorrelatedConversation, Stores};
use skald_sanitize::Sanitizer;

use crate::bundle::{build_bundle, BundleFormat, BundleRequest, ContributorMeta, SkippedSessions};
use crate::error::ContribError;
use crate::output::write_bundle;
use crate::session::{prepare_session, ContribSession};
use crate::upload::{BundleUploader, UploadRequest};

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub contributor: ContributorMeta,
    pub format: BundleFormat,
    pub repo: String,
    pub create_pull_request: bool,
    pub app_version: String,
    /// Also keep a local copy of the bundle here.
    pub output_dir: Option<PathBuf>,
}

impl ExportRequest {
    /// Pull-request upload in `auto` format, with a local copy under the
    /// store's exports directory.
    pub fn new(
        contributor: ContributorMeta,
        repo: impl Into<String>,
        app_version: impl Into<String>,
    ) -> Self {
        Self {
            contributor,
            format: BundleFormat::Auto,
            repo: repo.into(),
            create_pull_request: true,
            app_version: app_version.into(),
            output_dir: Some(exports_dir()),
        }
    }
}

/// Result handed back to the route layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOutcome {
    pub bundle_id: String,
    pub session_count: usize,
    pub redaction_count: usize,
    pub skipped: SkippedSessions,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    pub is_pull_request: bool,
    pub was_fallback: bool,
}

/// Sanitize, score, bundle, and upload `conversations`.
///
/// Conversations without a transcript, or whose transcript cannot be read,
/// are skipped with a warning and counted in [`ExportOutcome::skipped`]. The upload is attempted once; its failure is
/// returned as [`ContribError::Upload`] with the uploader's message intact.
pub async fn export_conversations(
    stores: &Stores<'_>,
    conversations: &[CorrelatedConversation],
    request: &ExportRequest,
    uploader: &dyn BundleUploader,
    config: &SkaldConfig,
) -> Result<ExportOutcome, ContribError> {
    request.contributor.check_attestation()?;

    let sanitizer = Sanitizer::new(config.sanitizer.clone());
    let mut sessions: Vec<ContribSession> = Vec::new();
    let mut skipped = SkippedSessions::default();

    for conv in conversations {
        let Some(transcript) = &conv.transcript else {
            tracing::warn!(correlation_id = %conv.correlation_id, "no transcript, skipping");
            skipped.no_transcript += 1;
            continue;
        };
        let raw = match stores.transcripts.read_content(transcript).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    correlation_id = %conv.correlation_id,
                    path = %transcript.path,
                    error = %e,
                    "failed to read transcript, skipping"
                );
                skipped.unreadable += 1;
                continue;
            }
        };
        sessions.push(prepare_session(conv, transcript, &raw, &sanitizer, config));
    }

    if sessions.is_empty() {
        return Err(ContribError::NoValidSessions);
    }

    let bundle = build_bundle(&BundleRequest {
        sessions: &sessions,
        contributor: &request.contributor,
        app_version: &request.app_version,
        skipped,
        format: request.format,
        weights: &config.quality,
        config: &config.bundle,
    })?;

    if let Some(dir) = &request.output_dir {
        write_bundle(dir, &bundle)?;
    }

    let upload = UploadRequest {
        bytes: bundle.bundle_bytes.clone(),
        format: bundle.bundle_format,
        file_name: bundle.file_name(),
        repo: request.repo.clone(),
        create_pull_request: request.create_pull_request,
        title: format!("Add session bundle {}", bundle.bundle_id),
        message: format!(
            "Bundle {}: {} session(s), {} redaction(s)",
            bundle.bundle_id,
            bundle.session_count(),
            bundle.redactions.total_redactions
        ),
    };
    let result = uploader
        .upload(&upload)
        .await
        .map_err(|e| ContribError::Upload(e.to_string()))?;
    if !result.success {
        return Err(ContribError::Upload(
            result.error.unwrap_or_else(|| "upload failed".to_string()),
        ));
    }
    if result.was_fallback {
        tracing::warn!(bundle_id = %bundle.bundle_id, "pull request unavailable, committed directly");
    }

    tracing::info!(
        bundle_id = %bundle.bundle_id,
        sessions = bundle.session_count(),
        redactions = bundle.redactions.total_redactions,
        url = %result.url,
        "export complete"
    );

    Ok(ExportOutcome {
        bundle_id: bundle.bundle_id,
        session_count: bundle.session_ids.len(),
        redaction_count: bundle.redactions.total_redactions,
        skipped: bundle.skipped,
        url: result.url,
        pr_number: result.pr_number,
        commit_sha: result.commit_sha,
        is_pull_request: result.is_pull_request,
        was_fallback: result.was_fallback,
    })
}
