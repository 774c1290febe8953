use std::path::{Path, PathBuf};

use skald_core::paths::write_atomic;

use crate::bundle::Bundle;
use crate::error::ContribError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBundle {
    pub path: PathBuf,
    /// A file with this bundle id already existed and was left untouched.
    pub already_exported: bool,
}

/// Persist `bundle` under `dir` as `<bundleId>.<ext>`.
///
/// Bundle ids are content-addressed, so an existing file means the same
/// export was written before.
pub fn write_bundle(dir: &Path, bundle: &Bundle) -> Result<WrittenBundle, ContribError> {
    let path = dir.join(bundle.file_name());
    if path.exists() {
        tracing::info!(path = %path.display(), "bundle already exported");
        return Ok(WrittenBundle {
            path,
            already_exported: true,
        });
    }
    write_atomic(&path, &bundle.bundle_bytes)?;
    tracing::info!(path = %path.display(), bytes = bundle.bundle_bytes.len(), "wrote bundle");
    Ok(WrittenBundle {
        path,
        already_exported: false,
    })
}
