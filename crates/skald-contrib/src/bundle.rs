//! Content-addressed export bundles.
//!
//! A bundle is either line-delimited JSON (one session per line) or a gzip'd
//! tar holding `manifest.json` plus one `sessions/<source>/<id>.jsonl` per
//! session. Both encodings are byte-for-byte reproducible, and the bundle id
//! depends only on what is being contributed and by whom.

use std::collections::{BTreeMap, HashSet};

use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skald_core::canon::canonical_json_bytes;
use skald_core::config::{BundleConfig, QualityWeights};
use skald_core::hash::sha256_hex;
use skald_core::CANON_SKALD_V1;
use skald_sanitize::RedactionReport;
use time::OffsetDateTime;

use crate::error::ContribError;
use crate::quality::composite_score;
use crate::session::ContribSession;

pub const MANIFEST_NAME: &str = "manifest.json";
const BUNDLE_ID_PREFIX: &str = "bnd_";
const BUNDLE_ID_HEX_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleFormat {
    Archive,
    LineDelimited,
    Auto,
}

impl BundleFormat {
    /// Resolve `Auto` by batch size; concrete formats pass through.
    pub fn resolve(self, session_count: usize, config: &BundleConfig) -> BundleFormat {
        match self {
            BundleFormat::Auto if session_count <= config.auto_line_delimited_max => {
                BundleFormat::LineDelimited
            }
            BundleFormat::Auto => BundleFormat::Archive,
            other => other,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            BundleFormat::LineDelimited => "jsonl",
            BundleFormat::Archive | BundleFormat::Auto => "tar.gz",
        }
    }
}

/// Who is contributing, under which terms. The two attestation flags are
/// set by the user and never inferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorMeta {
    pub contributor_id: String,
    pub license: String,
    pub ai_preference: String,
    pub rights_confirmed: bool,
    pub reviewed_confirmed: bool,
}

impl ContributorMeta {
    pub fn check_attestation(&self) -> Result<(), ContribError> {
        if !self.rights_confirmed {
            return Err(ContribError::AttestationMissing {
                field: "rightsConfirmed",
            });
        }
        if !self.reviewed_confirmed {
            return Err(ContribError::AttestationMissing {
                field: "reviewedConfirmed",
            });
        }
        Ok(())
    }
}

/// Sessions left out of a bundle, by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSessions {
    /// No transcript was correlated with the conversation.
    pub no_transcript: usize,
    /// The transcript store failed to return the content.
    pub unreadable: usize,
    /// Nothing parseable survived sanitization.
    pub empty: usize,
    /// Same `rawSha256` as an earlier session in the batch.
    pub duplicate: usize,
}

impl SkippedSessions {
    pub fn total(&self) -> usize {
        self.no_transcript + self.unreadable + self.empty + self.duplicate
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub bundle_id: String,
    pub bundle_bytes: Vec<u8>,
    /// Always concrete, never `Auto`.
    pub bundle_format: BundleFormat,
    pub session_ids: Vec<String>,
    pub skipped: SkippedSessions,
    pub redactions: RedactionReport,
}

impl Bundle {
    pub fn session_count(&self) -> usize {
        self.session_ids.len()
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.bundle_id, self.bundle_format.extension())
    }
}

pub struct BundleRequest<'a> {
    pub sessions: &'a [ContribSession],
    pub contributor: &'a ContributorMeta,
    pub app_version: &'a str,
    /// Sessions already dropped before preparation; carried into the manifest.
    pub skipped: SkippedSessions,
    pub format: BundleFormat,
    pub weights: &'a QualityWeights,
    pub config: &'a BundleConfig,
}

/// Per-session fields shared by JSONL lines and the archive manifest.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionSummary<'a> {
    session_id: &'a str,
    source: &'a str,
    file_path: String,
    source_path_hint: &'a str,
    #[serde(with = "skald_core::ts")]
    mtime_utc: OffsetDateTime,
    raw_sha256: &'a str,
    sanitized_sha256: String,
    approx_chars: usize,
    entry_types: &'a BTreeMap<String, usize>,
    preview: &'a str,
    score: u32,
    preview_score: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BundleLine<'a> {
    bundle_id: &'a str,
    schema_version: u32,
    contributor_id: &'a str,
    license: &'a str,
    #[serde(flatten)]
    session: &'a SessionSummary<'a>,
    data: &'a [Value],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    bundle_id: &'a str,
    schema_version: u32,
    canon: &'static str,
    app_version: &'a str,
    contributor: &'a ContributorMeta,
    redactions: RedactionReport,
    session_count: usize,
    skipped: SkippedSessions,
    sessions: Vec<&'a SessionSummary<'a>>,
}

struct Included<'a> {
    session: &'a ContribSession,
    summary: SessionSummary<'a>,
    body: Vec<u8>,
}

/// Assemble a bundle from prepared sessions.
///
/// Sessions with no sanitized entries or a `rawSha256` already seen in this
/// batch are skipped and counted. The redaction report covers only the
/// sessions that made it in. If nothing remains the result is
/// [`ContribError::NoValidSessions`].
pub fn build_bundle(request: &BundleRequest<'_>) -> Result<Bundle, ContribError> {
    let mut skipped = request.skipped;
    let mut seen: HashSet<&str> = HashSet::new();
    let mut paths: HashSet<String> = HashSet::new();
    let mut redactions = RedactionReport::default();
    let mut included: Vec<Included<'_>> = Vec::new();

    for session in request.sessions {
        if session.sanitized.is_empty() {
            tracing::warn!(session_id = %session.session_id, "skipping session with no content");
            skipped.empty += 1;
            continue;
        }
        if !seen.insert(session.raw_sha256.as_str()) {
            tracing::warn!(session_id = %session.session_id, "skipping duplicate session content");
            skipped.duplicate += 1;
            continue;
        }
        let body = session_body(&session.sanitized)?;
        redactions.merge(&session.redactions);
        let summary = SessionSummary {
            session_id: &session.session_id,
            source: &session.source,
            file_path: unique_path(&mut paths, &session.file_path, &session.raw_sha256),
            source_path_hint: &session.source_path_hint,
            mtime_utc: session.mtime_utc,
            raw_sha256: &session.raw_sha256,
            sanitized_sha256: sha256_hex(&body),
            approx_chars: session.approx_chars,
            entry_types: &session.entry_types,
            preview: &session.preview_redacted,
            score: composite_score(&session.signals, request.weights),
            preview_score: session.preview_score,
        };
        included.push(Included {
            session,
            summary,
            body,
        });
    }

    if included.is_empty() {
        return Err(ContribError::NoValidSessions);
    }

    let schema_version = request.config.schema_version;
    let format = request.format.resolve(included.len(), request.config);
    let bundle_id = compute_bundle_id(schema_version, request.app_version, request.contributor, &included)?;

    let bundle_bytes = match format {
        BundleFormat::LineDelimited => {
            line_delimited(&bundle_id, schema_version, request.contributor, &included)?
        }
        _ => {
            let manifest = Manifest {
                bundle_id: &bundle_id,
                schema_version,
                canon: CANON_SKALD_V1,
                app_version: request.app_version,
                contributor: request.contributor,
                redactions,
                session_count: included.len(),
                skipped,
                sessions: included.iter().map(|i| &i.summary).collect(),
            };
            let mut entries = vec![(MANIFEST_NAME.to_string(), serde_json::to_vec_pretty(&manifest)?)];
            entries.extend(
                included
                    .iter()
                    .map(|i| (i.summary.file_path.clone(), i.body.clone())),
            );
            tar_gz(&entries)?
        }
    };

    tracing::info!(
        bundle_id = %bundle_id,
        format = format.extension(),
        sessions = included.len(),
        skipped = skipped.total(),
        bytes = bundle_bytes.len(),
        "built bundle"
    );

    Ok(Bundle {
        bundle_id,
        bundle_bytes,
        bundle_format: format,
        session_ids: included
            .iter()
            .map(|i| i.session.session_id.clone())
            .collect(),
        skipped,
        redactions,
    })
}

/// `path` itself, or `path` with a content-hash suffix when an earlier
/// session in the batch already claimed that name.
fn unique_path(taken: &mut HashSet<String>, path: &str, raw_sha256: &str) -> String {
    let stem = path.strip_suffix(".jsonl").unwrap_or(path);
    let short = &raw_sha256[..raw_sha256.len().min(8)];
    let mut candidate = path.to_string();
    let mut n = 1;
    while !taken.insert(candidate.clone()) {
        candidate = if n == 1 {
            format!("{stem}-{short}.jsonl")
        } else {
            format!("{stem}-{short}-{n}.jsonl")
        };
        n += 1;
    }
    candidate
}

/// Sanitized entries as JSONL.
fn session_body(entries: &[Value]) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut out, entry)?;
        out.push(b'\n');
    }
    Ok(out)
}

fn compute_bundle_id(
    schema_version: u32,
    app_version: &str,
    contributor: &ContributorMeta,
    included: &[Included<'_>],
) -> Result<String, ContribError> {
    let sessions: Vec<Value> = included
        .iter()
        .map(|i| {
            json!({
                "sessionId": i.summary.session_id,
                "rawSha256": i.summary.raw_sha256,
                "sanitizedSha256": i.summary.sanitized_sha256,
            })
        })
        .collect();
    let identity = json!({
        "schemaVersion": schema_version,
        "appVersion": app_version,
        "contributor": contributor,
        "sessions": sessions,
    });
    let digest = sha256_hex(&canonical_json_bytes(&identity)?);
    Ok(format!("{BUNDLE_ID_PREFIX}{}", &digest[..BUNDLE_ID_HEX_LEN]))
}

fn line_delimited(
    bundle_id: &str,
    schema_version: u32,
    contributor: &ContributorMeta,
    included: &[Included<'_>],
) -> Result<Vec<u8>, ContribError> {
    let mut out = Vec::new();
    for i in included {
        let line = BundleLine {
            bundle_id,
            schema_version,
            contributor_id: &contributor.contributor_id,
            license: &contributor.license,
            session: &i.summary,
            data: &i.session.sanitized,
        };
        serde_json::to_writer(&mut out, &line)?;
        out.push(b'\n');
    }
    Ok(out)
}

/// Gzip'd tar with fixed headers: mtime 0, mode 0644, uid/gid 0.
fn tar_gz(entries: &[(String, Vec<u8>)]) -> std::io::Result<Vec<u8>> {
    let encoder = GzBuilder::new()
        .mtime(0)
        .write(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(encoder);
    for (path, bytes) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        tar.append_data(&mut header, path, bytes.as_slice())?;
    }
    tar.into_inner()?.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::prepare_session;
    use crate::session::tests::{conversation, TRANSCRIPT};
    use flate2::read::GzDecoder;
    use skald_core::SkaldConfig;
    use skald_sanitize::Sanitizer;
    use std::io::Read;

    fn contributor() -> ContributorMeta {
        ContributorMeta {
            contributor_id: "ann".into(),
            license: "CC-BY-4.0".into(),
            ai_preference: "allow-training".into(),
            rights_confirmed: true,
            reviewed_confirmed: true,
        }
    }

    fn session(hook_id: &str, transcript_id: &str, raw: &str) -> ContribSession {
        let conv = conversation(Some(hook_id), transcript_id);
        let t = conv.transcript.clone().unwrap();
        prepare_session(
            &conv,
            &t,
            raw.as_bytes(),
            &Sanitizer::default(),
            &SkaldConfig::default(),
        )
    }

    fn sessions(n: usize) -> Vec<ContribSession> {
        (0..n)
            .map(|i| {
                let raw = format!(
                    "{}{{\"type\":\"user\",\"message\":{{\"content\":\"turn {i}\"}}}}\n",
                    TRANSCRIPT
                );
                session(&format!("h{i}"), &format!("t{i}"), &raw)
            })
            .collect()
    }

    fn build(sessions: &[ContribSession], format: BundleFormat) -> Result<Bundle, ContribError> {
        build_with(sessions, &contributor(), format)
    }

    fn build_with(
        sessions: &[ContribSession],
        contributor: &ContributorMeta,
        format: BundleFormat,
    ) -> Result<Bundle, ContribError> {
        let config = SkaldConfig::default();
        build_bundle(&BundleRequest {
            sessions,
            contributor,
            app_version: "0.1.1",
            skipped: SkippedSessions::default(),
            format,
            weights: &config.quality,
            config: &config.bundle,
        })
    }

    fn unpack(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));
        let mut out = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            assert_eq!(entry.header().mode().unwrap(), 0o644);
            assert_eq!(entry.header().mtime().unwrap(), 0);
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            out.push((path, data));
        }
        out
    }

    #[test]
    fn single_session_line_round_trips() {
        let s = sessions(1);
        let bundle = build(&s, BundleFormat::LineDelimited).unwrap();
        let text = String::from_utf8(bundle.bundle_bytes.clone()).unwrap();
        let records: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["sessionId"], "h0");
        assert_eq!(record["bundleId"], bundle.bundle_id.as_str());
        assert_eq!(record["filePath"], "sessions/claude/h0.jsonl");
        assert_eq!(record["rawSha256"], s[0].raw_sha256.as_str());
        assert_eq!(record["preview"], s[0].preview_redacted.as_str());
        assert_eq!(record["data"].as_array().unwrap().len(), s[0].sanitized.len());
        assert!(!text.contains("sk-abc123456789012345678901"));
    }

    #[test]
    fn skipped_sessions_are_counted_not_fatal() {
        let mut s = sessions(3);
        s.push(s[1].clone());
        s.push(session("h-empty", "t-empty", "not json\n"));
        let bundle = build(&s, BundleFormat::LineDelimited).unwrap();
        assert_eq!(bundle.skipped.duplicate, 1);
        assert_eq!(bundle.skipped.empty, 1);
        assert_eq!(bundle.session_count(), 3);
        assert_eq!(bundle.session_count(), s.len() - bundle.skipped.total());
        let lines = String::from_utf8(bundle.bundle_bytes).unwrap().lines().count();
        assert_eq!(lines, 3);
    }

    #[test]
    fn redactions_cover_included_sessions_only() {
        let s = sessions(1);
        let once = build(&s, BundleFormat::LineDelimited).unwrap();
        assert_eq!(once.redactions, s[0].redactions);

        let twice = build(&[s[0].clone(), s[0].clone()], BundleFormat::LineDelimited).unwrap();
        assert_eq!(twice.bundle_id, once.bundle_id);
        assert_eq!(twice.redactions, once.redactions);
        assert_eq!(twice.skipped.duplicate, 1);
    }

    #[test]
    fn colliding_file_names_stay_distinct() {
        let mut s = sessions(2);
        s[0].session_id = "a/b".into();
        s[0].file_path = "sessions/claude/a_b.jsonl".into();
        s[1].session_id = "a_b".into();
        s[1].file_path = "sessions/claude/a_b.jsonl".into();

        let bundle = build(&s, BundleFormat::Archive).unwrap();
        let entries = unpack(&bundle.bundle_bytes);
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        let renamed = format!("sessions/claude/a_b-{}.jsonl", &s[1].raw_sha256[..8]);
        assert_eq!(names, vec![MANIFEST_NAME, "sessions/claude/a_b.jsonl", renamed.as_str()]);

        let manifest: Value = serde_json::from_slice(&entries[0].1).unwrap();
        assert_eq!(manifest["sessions"][1]["filePath"], renamed.as_str());
    }

    #[test]
    fn nothing_valid_is_an_error() {
        let s = vec![session("h", "t", "")];
        assert!(matches!(
            build(&s, BundleFormat::Auto),
            Err(ContribError::NoValidSessions)
        ));
        assert!(matches!(
            build(&[], BundleFormat::Archive),
            Err(ContribError::NoValidSessions)
        ));
    }

    #[test]
    fn bundle_id_is_content_addressed() {
        let s = sessions(2);
        let a = build(&s, BundleFormat::Archive).unwrap();
        let b = build(&s, BundleFormat::Archive).unwrap();
        assert_eq!(a.bundle_id, b.bundle_id);
        assert_eq!(a.bundle_bytes, b.bundle_bytes);
        assert!(a.bundle_id.starts_with("bnd_"));
        assert_eq!(a.bundle_id.len(), 4 + 24);

        let mut other = contributor();
        other.contributor_id = "bob".into();
        let c = build_with(&s, &other, BundleFormat::Archive).unwrap();
        assert_ne!(a.bundle_id, c.bundle_id);

        let d = build(&s[..1], BundleFormat::Archive).unwrap();
        assert_ne!(a.bundle_id, d.bundle_id);
    }

    #[test]
    fn auto_picks_format_by_batch_size() {
        let config = BundleConfig::default();
        assert_eq!(BundleFormat::Auto.resolve(3, &config), BundleFormat::LineDelimited);
        assert_eq!(BundleFormat::Auto.resolve(4, &config), BundleFormat::Archive);
        assert_eq!(BundleFormat::Archive.resolve(1, &config), BundleFormat::Archive);

        assert_eq!(
            build(&sessions(3), BundleFormat::Auto).unwrap().bundle_format,
            BundleFormat::LineDelimited
        );
        assert_eq!(
            build(&sessions(4), BundleFormat::Auto).unwrap().bundle_format,
            BundleFormat::Archive
        );
    }

    #[test]
    fn archive_holds_manifest_and_session_files() {
        let s = sessions(2);
        let bundle = build(&s, BundleFormat::Archive).unwrap();
        assert_eq!(bundle.file_name(), format!("{}.tar.gz", bundle.bundle_id));
        let entries = unpack(&bundle.bundle_bytes);
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![MANIFEST_NAME, "sessions/claude/h0.jsonl", "sessions/claude/h1.jsonl"]
        );

        let manifest: Value = serde_json::from_slice(&entries[0].1).unwrap();
        assert_eq!(manifest["bundleId"], bundle.bundle_id.as_str());
        assert_eq!(manifest["sessionCount"], 2);
        assert_eq!(manifest["appVersion"], "0.1.1");
        assert_eq!(manifest["canon"], CANON_SKALD_V1);
        assert_eq!(manifest["contributor"]["contributorId"], "ann");
        assert_eq!(manifest["redactions"]["secrets"], 2);
        assert_eq!(manifest["sessions"][1]["sessionId"], "h1");

        let body = String::from_utf8(entries[1].1.clone()).unwrap();
        assert_eq!(body.lines().count(), s[0].sanitized.len());
        assert_eq!(
            manifest["sessions"][0]["sanitizedSha256"],
            sha256_hex(&entries[1].1).as_str()
        );
    }

    #[test]
    fn attestation_flags_required() {
        assert!(contributor().check_attestation().is_ok());
        let mut c = contributor();
        c.reviewed_confirmed = false;
        assert!(matches!(
            c.check_attestation(),
            Err(ContribError::AttestationMissing {
                field: "reviewedConfirmed"
            })
        ));
        c.rights_confirmed = false;
        assert!(matches!(
            c.check_attestation(),
            Err(ContribError::AttestationMissing {
                field: "rightsConfirmed"
            })
        ));
    }

    #[test]
    fn format_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(BundleFormat::LineDelimited).unwrap(),
            "line-delimited"
        );
        let f: BundleFormat = serde_json::from_value(json!("auto")).unwrap();
        assert_eq!(f, BundleFormat::Auto);
    }
}
