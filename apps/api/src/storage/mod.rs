//! Artifact Store: uploaded and generated documents on local disk.
//!
//! Files are named `{YYYYMMDD_HHMMSS}_{sanitized name}` under one folder per
//! artifact kind. Every write goes to a temporary file in the destination
//! folder and is renamed into place, so readers never see a partial file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::ArtifactKind;

/// Fallback name when sanitizing leaves nothing usable.
const DEFAULT_FILE_NAME: &str = "document.docx";
/// Attempts at finding a free name before giving up.
const MAX_NAME_ATTEMPTS: usize = 4;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens (and creates, if needed) the store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        for kind in [ArtifactKind::Resume, ArtifactKind::CoverLetter] {
            fs::create_dir_all(root.join(kind.folder()))?;
        }
        info!("Artifact store ready at {}", root.display());
        Ok(Self { root })
    }

    pub fn folder(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.folder())
    }

    /// Persists `bytes` and returns the final path.
    pub async fn save(
        &self,
        bytes: Vec<u8>,
        kind: ArtifactKind,
        original_name: &str,
    ) -> Result<PathBuf, AppError> {
        let store = self.clone();
        let original_name = original_name.to_string();
        tokio::task::spawn_blocking(move || {
            store.save_blocking(&bytes, kind, &original_name, Local::now().naive_local())
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("artifact write task failed: {e}")))?
    }

    /// Synchronous core of [`save`](Self::save) with an injectable clock.
    ///
    /// On a name collision the file gets a short random suffix instead of
    /// overwriting the existing artifact.
    pub fn save_blocking(
        &self,
        bytes: &[u8],
        kind: ArtifactKind,
        original_name: &str,
        now: NaiveDateTime,
    ) -> Result<PathBuf, AppError> {
        let dir = self.folder(kind);
        fs::create_dir_all(&dir)?;

        // Dropping `tmp` on any early return removes the temporary file.
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        let stamp = now.format("%Y%m%d_%H%M%S").to_string();
        let name = sanitize_file_name(original_name);
        let mut target = dir.join(format!("{stamp}_{name}"));

        for _ in 0..MAX_NAME_ATTEMPTS {
            match tmp.persist_noclobber(&target) {
                Ok(_) => {
                    info!("Stored {:?} artifact at {}", kind, target.display());
                    return Ok(target);
                }
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                    warn!("Artifact name collision at {}", target.display());
                    tmp = e.file;
                    let suffix = &Uuid::new_v4().simple().to_string()[..8];
                    target = dir.join(format!("{stamp}_{suffix}_{name}"));
                }
                Err(e) => return Err(AppError::Storage(e.error.to_string())),
            }
        }

        Err(AppError::Storage(format!(
            "no free file name for {name} after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    /// Resolves a stored file by name, rejecting anything that is not a plain
    /// file name inside the kind's folder.
    pub fn resolve(&self, kind: ArtifactKind, file_name: &str) -> Result<PathBuf, AppError> {
        if file_name.is_empty()
            || file_name.starts_with('.')
            || file_name.contains(['/', '\\'])
            || file_name.contains("..")
        {
            return Err(AppError::Validation(format!("Invalid file name '{file_name}'")));
        }

        let path = self.folder(kind).join(file_name);
        if !path.is_file() {
            return Err(AppError::NotFound(format!(
                "{} '{file_name}' not found",
                kind.folder()
            )));
        }
        Ok(path)
    }

    pub async fn read(&self, kind: ArtifactKind, file_name: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(kind, file_name)?;
        Ok(tokio::fs::read(path).await?)
    }
}

/// Keeps the final path component and replaces anything outside
/// `[A-Za-z0-9._-]` with `_`. Leading dots are stripped so stored files are
/// never hidden and never look like in-flight temporaries.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_' || c == '.') {
        DEFAULT_FILE_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Atomically replaces `path` with `bytes` (temp file in the same directory,
/// then rename). Used for small state files such as settings.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
