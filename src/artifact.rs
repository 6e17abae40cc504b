//! On-disk storage for QR code images.

use crate::error::{Error, Result};
use crate::verifier::QrArtifact;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes QR code PNGs into a directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store images under `dir`; the directory is created on first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode `artifact` and write it as `{prefix}_{timestamp}.png`.
    ///
    /// The prefix is reduced to its final path component so it cannot
    /// escape the directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be decoded or written.
    pub fn save(&self, artifact: &QrArtifact, prefix: &str) -> Result<PathBuf> {
        let bytes = artifact.png_bytes()?;
        let prefix = sanitize_prefix(prefix)?;

        std::fs::create_dir_all(&self.dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let path = self.dir.join(format!("{prefix}_{timestamp}.png"));
        std::fs::write(&path, &bytes)?;

        debug!("Saved QR code image to {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

fn sanitize_prefix(prefix: &str) -> Result<String> {
    Path::new(prefix)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Artifact(format!("unusable file name prefix: {prefix:?}")))
}
