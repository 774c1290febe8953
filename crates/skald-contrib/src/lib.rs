//! Contribution pipeline: turn selected conversations into a sanitized,
//! scored, content-addressed bundle and hand it to an uploader.

pub mod bundle;
mod error;
pub mod export;
pub mod output;
pub mod quality;
pub mod session;
pub mod upload;

pub use bundle::{build_bundle, Bundle, BundleFormat, BundleRequest, ContributorMeta, SkippedSessions};
pub use error::ContribError;
pub use export::{export_conversations, ExportOutcome, ExportRequest};
pub use output::{write_bundle, WrittenBundle};
pub use quality::{composite_score, score_text, QualitySignals};
pub use session::{prepare_session, ContribSession};
pub use upload::{BundleUploader, MockUploader, UploadRequest, UploadResult};
