use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Root for everything Skald persists locally.
///
/// Uses the platform data dir when available, then `~/.skald`.
pub fn store_root() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("skald")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".skald")
    } else {
        PathBuf::from(".skald-store")
    }
}

/// Default directory for exported bundles: `store_root/exports/`.
pub fn exports_dir() -> PathBuf {
    store_root().join("exports")
}

/// Write data atomically: temp file in the same directory, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no parent dir for {}", path.display()),
        )
    })?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
