#[derive(Debug, thiserror::Error)]
pub enum ContribError {
    #[error("no valid sessions to export")]
    NoValidSessions,

    #[error("contributor attestation missing: {field} must be confirmed before export")]
    AttestationMissing { field: &'static str },

    #[error("{0}")]
    Upload(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}
