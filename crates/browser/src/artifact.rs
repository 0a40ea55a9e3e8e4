//! Screenshots attached to notifications.

use std::path::{Path, PathBuf};

use {tracing::warn, vendorwatch_common::BeneficiaryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Expanded vendor list proving availability.
    Availability,
    /// Page state at the time of a failure.
    Diagnostic,
}

impl ArtifactKind {
    /// File name for `id`, e.g. `screenshot_MT4420500385456.png`.
    pub fn file_name(self, id: &BeneficiaryId) -> String {
        match self {
            Self::Availability => format!("screenshot_{id}.png"),
            Self::Diagnostic => format!("error_{id}.png"),
        }
    }
}

/// A captured PNG on disk, owned by whoever holds this value.
///
/// Call [`Artifact::discard`] once it has been sent (or is no longer needed).
#[derive(Debug, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
    kind: ArtifactKind,
}

impl Artifact {
    pub fn new(path: PathBuf, kind: ArtifactKind) -> Self {
        Self { path, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Give up ownership without deleting the file.
    pub fn keep(self) -> PathBuf {
        self.path
    }

    /// Delete the file. Failures are logged, never returned.
    pub async fn discard(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(
                path = %self.path.display(),
                kind = ?self.kind,
                error = %e,
                "failed to delete artifact"
            ),
        }
    }
}
