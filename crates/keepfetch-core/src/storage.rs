//! Disk output for completed bodies.
//!
//! Bodies are written verbatim: missing parent directories are created, then
//! the file is replaced in one write. No checksum or transformation.

use std::path::Path;

use crate::error::TaskError;

/// Create `destination`'s parent directories, then write `body` to it.
pub async fn write_body(destination: &Path, body: &[u8]) -> Result<(), TaskError> {
    let write_err = |source| TaskError::Write {
        path: destination.to_path_buf(),
        source,
    };
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }
    tokio::fs::write(destination, body).await.map_err(write_err)?;
    Ok(())
}
