use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Kind of stored document; also selects the storage folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Resume,
    CoverLetter,
}

impl ArtifactKind {
    pub fn folder(&self) -> &'static str {
        match self {
            ArtifactKind::Resume => "resumes",
            ArtifactKind::CoverLetter => "cover_letters",
        }
    }
}

/// A generated document on disk. Created only after the file was persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentArtifact {
    pub kind: ArtifactKind,
    pub source_path: Option<PathBuf>,
    pub generated_path: PathBuf,
    pub linked_application_id: Option<i64>,
}

impl DocumentArtifact {
    /// File name used by the download routes.
    pub fn file_name(&self) -> String {
        self.generated_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
