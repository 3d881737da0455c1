//! Scratch storage for engine output.
//!
//! A [`Workspace`] owns a temporary directory where ffmpeg writes each part
//! before the bytes are read back into memory. The directory is removed when
//! the workspace is dropped or [`Workspace::remove`] is called. A workspace
//! held in a static is never dropped, so its owner must call `remove`.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::TempDir;

/// Temporary directory holding in-flight engine output.
#[derive(Debug)]
pub struct Workspace {
    temp_dir: TempDir,
}

impl Workspace {
    /// Create a fresh scratch directory.
    pub fn new() -> sf_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("splitforge-")
            .tempdir()
            .map_err(|e| sf_core::Error::tool("workspace", format!("failed to create temp dir: {e}")))?;

        Ok(Self { temp_dir })
    }

    /// Path to the temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path for a named scratch file. Only the final path component of
    /// `name` is used so a part name cannot escape the directory.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "output".into());
        self.temp_dir.path().join(file_name)
    }

    /// Read a scratch file into memory and delete it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or empty.
    pub async fn take(&self, path: &Path) -> sf_core::Result<Bytes> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            sf_core::Error::tool("workspace", format!("failed to read {}: {e}", path.display()))
        })?;
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!("failed to remove scratch file {}: {e}", path.display());
        }
        if data.is_empty() {
            return Err(sf_core::Error::tool(
                "workspace",
                format!("{} is empty", path.display()),
            ));
        }
        Ok(Bytes::from(data))
    }

    /// Delete the scratch directory and everything in it.
    pub fn remove(&self) {
        match std::fs::remove_dir_all(self.temp_dir.path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "failed to remove scratch dir {}: {e}",
                self.temp_dir.path().display()
            ),
        }
    }

    /// Delete a scratch file if it exists.
    pub async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove scratch file {}: {e}", path.display()),
        }
    }
}
