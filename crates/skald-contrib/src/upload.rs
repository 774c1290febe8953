//! Hand-off to the service that publishes bundles.

use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::bundle::BundleFormat;

/// Everything an uploader needs to publish one bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub format: BundleFormat,
    pub file_name: String,
    /// Destination repository, e.g. `owner/name`.
    pub repo: String,
    /// Ask for a pull request instead of a direct commit.
    pub create_pull_request: bool,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
    pub is_pull_request: bool,
    /// A pull request was requested but the uploader committed directly.
    pub was_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Publishes bundles. Implemented by MockUploader (tests) and by the
/// embedding application's transport.
///
/// Implementations own any retry policy; callers surface failures as-is.
#[async_trait::async_trait]
pub trait BundleUploader: Send + Sync {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadResult>;
}

/// Records every request and answers with a preset result.
pub struct MockUploader {
    response: Mutex<std::result::Result<UploadResult, String>>,
    requests: Mutex<Vec<UploadRequest>>,
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUploader {
    /// Succeeds with a direct commit.
    pub fn new() -> Self {
        Self {
            response: Mutex::new(Ok(UploadResult {
                success: true,
                url: "https://example.invalid/commit/0000000".into(),
                commit_sha: Some("0000000".into()),
                ..Default::default()
            })),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_result(&self, result: UploadResult) {
        *self.response.lock().unwrap_or_else(|e| e.into_inner()) = Ok(result);
    }

    /// Make the next uploads fail at the transport level.
    pub fn set_error(&self, message: &str) {
        *self.response.lock().unwrap_or_else(|e| e.into_inner()) = Err(message.to_string());
    }

    pub fn requests(&self) -> Vec<UploadRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl BundleUploader for MockUploader {
    async fn upload(&self, request: &UploadRequest) -> Result<UploadResult> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request.clone());
        match &*self.response.lock().unwrap_or_else(|e| e.into_inner()) {
            Ok(result) => Ok(result.clone()),
            Err(message) => Err(anyhow::anyhow!("{message}")),
        }
    }
}
