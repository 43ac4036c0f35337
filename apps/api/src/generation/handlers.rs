//! Axum route handlers for the résumé and cover-letter APIs.

use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::info;

use crate::document::docx::MIME_TYPE;
use crate::document::{extract, flatten};
use crate::errors::AppError;
use crate::generation::form::{ensure_docx_name, parse_form, GenerationForm};
use crate::generation::pipeline::{
    customize_resume, generate_cover_letter, CoverLetterJob, GenerationOutcome, ResumeJob,
    SourceDocument,
};
use crate::models::ArtifactKind;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub path: String,
    pub file_name: String,
    pub paragraph_count: usize,
    pub preview_text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resumes/upload
///
/// Stores a résumé after checking that it is a readable Word document.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let form = parse_form(multipart).await?;
    let upload = form
        .resume
        .ok_or_else(|| AppError::Validation("resume file is required".to_string()))?;
    ensure_docx_name(&upload.file_name)?;

    let data = upload.data;
    let (data, paragraphs) = tokio::task::spawn_blocking(move || {
        let paragraphs = extract(&data)?;
        Ok::<_, AppError>((data, paragraphs))
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("document task failed: {e}")))??;

    let path = state
        .store
        .save(data, ArtifactKind::Resume, &upload.file_name)
        .await?;
    info!("Uploaded résumé stored at {}", path.display());

    Ok(Json(UploadResponse {
        file_name: file_name_of(&path),
        path: path.to_string_lossy().into_owned(),
        paragraph_count: paragraphs.len(),
        preview_text: flatten(&paragraphs),
    }))
}

/// POST /api/v1/resumes/customize
///
/// Multipart: `job_description` plus either a `resume` file or a
/// `resume_path` naming a stored résumé. Provider errors do not fail the
/// request; the stored document then carries a "no suggestions" note.
pub async fn handle_customize_resume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerationOutcome>, AppError> {
    let form = parse_form(multipart).await?;
    let selection = form.provider_override()?;
    let source = load_source(&state, &form)
        .await?
        .ok_or_else(|| AppError::Validation("resume or resume_path is required".to_string()))?;

    let job = ResumeJob {
        job_description: form.job_description,
        company_name: form.company_name,
        position: form.position,
        source,
        linked_application_id: form.linked_application_id,
    };
    let outcome = customize_resume(&state.registry, &state.store, job, &selection).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/cover-letters/generate
///
/// Multipart: `job_description`, `company_name`, `position`, optional
/// applicant fields and an optional résumé to ground the letter.
pub async fn handle_generate_cover_letter(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<GenerationOutcome>, AppError> {
    let form = parse_form(multipart).await?;
    let selection = form.provider_override()?;
    let source = load_source(&state, &form).await?;
    let applicant = form.applicant_profile();

    let job = CoverLetterJob {
        job_description: form.job_description,
        company_name: form.company_name,
        position: form.position,
        applicant,
        source,
        linked_application_id: form.linked_application_id,
    };
    let outcome = generate_cover_letter(&state.registry, &state.store, job, &selection).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/resumes/:filename
pub async fn handle_download_resume(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    download(&state, ArtifactKind::Resume, &filename).await
}

/// GET /api/v1/cover-letters/:filename
pub async fn handle_download_cover_letter(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    download(&state, ArtifactKind::CoverLetter, &filename).await
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn download(
    state: &AppState,
    kind: ArtifactKind,
    filename: &str,
) -> Result<impl IntoResponse, AppError> {
    let bytes = state.store.read(kind, filename).await?;
    let disposition = format!("attachment; filename=\"{filename}\"");
    Ok((
        [
            (header::CONTENT_TYPE, MIME_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

/// The résumé for a request: a fresh upload, which the pipeline stores once
/// the request validates, or a résumé already in the store.
async fn load_source(
    state: &AppState,
    form: &GenerationForm,
) -> Result<Option<SourceDocument>, AppError> {
    if let Some(upload) = &form.resume {
        ensure_docx_name(&upload.file_name)?;
        return Ok(Some(SourceDocument {
            file_name: upload.file_name.clone(),
            bytes: upload.data.clone(),
            path: None,
        }));
    }

    let Some(stored) = form.resume_path.as_deref() else {
        return Ok(None);
    };
    // Accept either the bare stored name or the full path a previous response returned.
    let file_name = FsPath::new(stored)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path = state.store.resolve(ArtifactKind::Resume, &file_name)?;
    let bytes = tokio::fs::read(&path).await?;

    Ok(Some(SourceDocument {
        file_name,
        bytes,
        path: Some(path),
    }))
}

fn file_name_of(path: &FsPath) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
