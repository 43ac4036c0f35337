//! Generation pipeline: settings snapshot → extract → prompt → provider →
//! synthesize → store.
//!
//! The provider configuration is resolved once at the start of a request, so
//! a concurrent settings update only affects later requests.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::document::synthesize::{
    cover_letter, cover_letter_lines, customized_resume, suggestion_lines, CoverLetterFields,
    Suggestions,
};
use crate::document::{extract, flatten};
use crate::errors::AppError;
use crate::generation::prompt_builder;
use crate::llm_client::ProviderId;
use crate::models::{
    ApplicantProfile, ArtifactKind, DocumentArtifact, GenerationRequest, GenerationResult, Task,
};
use crate::settings::{ProviderConfig, ProviderOverride, ProviderRegistry};
use crate::storage::ArtifactStore;

// ────────────────────────────────────────────────────────────────────────────
// Inputs / outputs
// ────────────────────────────────────────────────────────────────────────────

/// A source résumé: its bytes plus where it is stored. A fresh upload has
/// no path until the request passes validation.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResumeJob {
    pub job_description: String,
    pub company_name: String,
    pub position: String,
    pub source: SourceDocument,
    pub linked_application_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct CoverLetterJob {
    pub job_description: String,
    pub company_name: String,
    pub position: String,
    pub applicant: Option<ApplicantProfile>,
    pub source: Option<SourceDocument>,
    pub linked_application_id: Option<i64>,
}

/// What the generation routes return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub generated_path: String,
    pub preview_text: String,
    pub provider_used: ProviderId,
    pub model_used: String,
    pub artifact: DocumentArtifact,
    /// Set when the résumé was produced without suggestions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip)]
    pub result: Option<GenerationResult>,
}

// ────────────────────────────────────────────────────────────────────────────
// Résumé customization
// ────────────────────────────────────────────────────────────────────────────

/// Appends tailoring suggestions to the source résumé.
///
/// Fail-soft: once the source extracted, a provider failure or an empty
/// response still yields a stored document holding the full original plus a
/// "no suggestions" note, and the outcome carries a warning.
pub async fn customize_resume(
    registry: &ProviderRegistry,
    store: &ArtifactStore,
    job: ResumeJob,
    selection: &ProviderOverride,
) -> Result<GenerationOutcome, AppError> {
    require_field("job_description", &job.job_description)?;

    let source_bytes = job.source.bytes.clone();
    let (source_bytes, paragraphs) = blocking(move || {
        let paragraphs = extract(&source_bytes)?;
        Ok((source_bytes, paragraphs))
    })
    .await?;
    if paragraphs.is_empty() {
        return Err(AppError::Validation(format!(
            "'{}' contains no text to customize",
            job.source.file_name
        )));
    }
    info!(
        "Extracted {} paragraphs from {}",
        paragraphs.len(),
        job.source.file_name
    );

    let config = registry.get_active_config(Some(selection))?;
    let output_name = format!("tailored_{}", job.source.file_name);
    let source_path = store_source(store, job.source).await?;

    let request = GenerationRequest {
        task: Task::ResumeCustomization,
        job_description: job.job_description,
        company_name: job.company_name,
        position: job.position,
        source_text: Some(flatten(&paragraphs)),
        applicant_profile: None,
    };
    let prompt = prompt_builder::build(&request);

    let (result, mut warning) = match generate(registry, &config, &prompt).await {
        Ok(result) => (Some(result), None),
        Err(e) if e.is_provider_failure() => {
            warn!("Résumé suggestions unavailable, storing original only: {e}");
            (None, Some(e.to_string()))
        }
        Err(e) => return Err(e),
    };

    let failure_reason = warning.clone();
    let generated = result.as_ref().map(|r| r.raw_text.clone());
    if generated.as_deref().is_some_and(|t| t.trim().is_empty()) {
        warning = Some(format!("{} returned an empty response", config.provider_id));
    }

    let (bytes, preview_text) = blocking(move || {
        let suggestions = match (&generated, &failure_reason) {
            (Some(text), _) => Suggestions::Generated(text),
            (None, Some(reason)) => Suggestions::Unavailable(reason),
            (None, None) => Suggestions::Unavailable("no response"),
        };
        let preview = suggestion_lines(suggestions)[1..].join("\n\n");
        Ok((customized_resume(&source_bytes, suggestions)?, preview))
    })
    .await?;

    let generated_path = store.save(bytes, ArtifactKind::Resume, &output_name).await?;

    Ok(outcome(
        ArtifactKind::Resume,
        Some(source_path),
        generated_path,
        job.linked_application_id,
        &config,
        result,
        preview_text,
        warning,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Cover letter
// ────────────────────────────────────────────────────────────────────────────

/// Generates a cover-letter body and wraps it in the fixed letter skeleton.
///
/// Unlike the résumé path there is nothing to fall back to, so provider
/// errors propagate and an empty body is reported as unavailable.
pub async fn generate_cover_letter(
    registry: &ProviderRegistry,
    store: &ArtifactStore,
    job: CoverLetterJob,
    selection: &ProviderOverride,
) -> Result<GenerationOutcome, AppError> {
    require_field("job_description", &job.job_description)?;
    require_field("company_name", &job.company_name)?;
    require_field("position", &job.position)?;

    let source_text = match &job.source {
        Some(source) => {
            let bytes = source.bytes.clone();
            let text = blocking(move || Ok(flatten(&extract(&bytes)?))).await?;
            Some(text).filter(|t| !t.trim().is_empty())
        }
        None => None,
    };

    let config = registry.get_active_config(Some(selection))?;
    let source_path = match job.source {
        Some(source) => Some(store_source(store, source).await?),
        None => None,
    };
    let request = GenerationRequest {
        task: Task::CoverLetter,
        job_description: job.job_description,
        company_name: job.company_name,
        position: job.position,
        source_text,
        applicant_profile: job.applicant,
    };
    let prompt = prompt_builder::build(&request);

    let result = generate(registry, &config, &prompt).await?;
    if result.raw_text.trim().is_empty() {
        return Err(AppError::ProviderUnavailable {
            provider: config.provider_id,
            reason: "empty response".to_string(),
        });
    }

    let body = result.raw_text.clone();
    let date = Local::now().date_naive();
    let (bytes, preview_text, output_name) = blocking(move || {
        let fields = CoverLetterFields {
            date,
            company_name: request.company_name.trim(),
            position: request.position.trim(),
            applicant: request.applicant_profile.as_ref(),
        };
        let preview = cover_letter_lines(&fields, &body).join("\n");
        let name = format!("cover_letter_{}_{}.docx", fields.company_name, fields.position);
        Ok((cover_letter(&fields, &body)?, preview, name))
    })
    .await?;

    let generated_path = store
        .save(bytes, ArtifactKind::CoverLetter, &output_name)
        .await?;

    Ok(outcome(
        ArtifactKind::CoverLetter,
        source_path,
        generated_path,
        job.linked_application_id,
        &config,
        Some(result),
        preview_text,
        None,
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// One provider call against the resolved snapshot.
async fn generate(
    registry: &ProviderRegistry,
    config: &ProviderConfig,
    prompt: &str,
) -> Result<GenerationResult, AppError> {
    let started = Instant::now();
    let raw_text = registry
        .client_for(config)
        .generate(prompt, &config.model_name, config.credential())
        .await?;

    info!(
        "{} generated {} chars with {} in {}ms (settings v{})",
        config.provider_id,
        raw_text.len(),
        config.model_name,
        started.elapsed().as_millis(),
        config.settings_version
    );

    Ok(GenerationResult {
        provider_id: config.provider_id,
        model_name: config.model_name.clone(),
        raw_text,
        created_at: Utc::now(),
    })
}

/// Path of the source résumé, storing a fresh upload first.
async fn store_source(store: &ArtifactStore, source: SourceDocument) -> Result<PathBuf, AppError> {
    match source.path {
        Some(path) => Ok(path),
        None => {
            store
                .save(source.bytes, ArtifactKind::Resume, &source.file_name)
                .await
        }
    }
}

fn require_field(name: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} cannot be empty")));
    }
    Ok(())
}

/// Runs document work off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("document task failed: {e}")))?
}

#[allow(clippy::too_many_arguments)]
fn outcome(
    kind: ArtifactKind,
    source_path: Option<PathBuf>,
    generated_path: PathBuf,
    linked_application_id: Option<i64>,
    config: &ProviderConfig,
    result: Option<GenerationResult>,
    preview_text: String,
    warning: Option<String>,
) -> GenerationOutcome {
    GenerationOutcome {
        generated_path: display_path(&generated_path),
        preview_text,
        provider_used: config.provider_id,
        model_used: config.model_name.clone(),
        artifact: DocumentArtifact {
            kind,
            source_path,
            generated_path,
            linked_application_id,
        },
        warning,
        result,
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::document::synthesize::{NO_SUGGESTIONS_NOTE, SUGGESTIONS_HEADING};
    use crate::test_support::{local_registry, resume_docx, spawn_backend};

    const JOB: &str = "Backend engineer, Go, distributed systems";

    fn resume_job() -> ResumeJob {
        ResumeJob {
            job_description: JOB.to_string(),
            company_name: String::new(),
            position: String::new(),
            source: SourceDocument {
                file_name: "cv.docx".to_string(),
                bytes: resume_docx(&["Jane Doe", "Go engineer", "Skills: Go"]),
                path: None,
            },
            linked_application_id: Some(7),
        }
    }

    fn cover_letter_job() -> CoverLetterJob {
        CoverLetterJob {
            job_description: "Keep our fleet healthy".to_string(),
            company_name: "Acme".to_string(),
            position: "SRE".to_string(),
            applicant: Some(ApplicantProfile {
                full_name: "J. Doe".to_string(),
                ..ApplicantProfile::default()
            }),
            source: None,
            linked_application_id: None,
        }
    }

    /// Fake local provider that records prompts and answers with `reply`.
    async fn fake_provider(
        status: StatusCode,
        reply: &'static str,
    ) -> (String, Arc<AtomicUsize>, Arc<std::sync::Mutex<Vec<String>>>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let prompts = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (counter, seen) = (hits.clone(), prompts.clone());
        let router = Router::new().route(
            "/api/generate",
            post(move |Json(body): Json<Value>| {
                let (counter, seen) = (counter.clone(), seen.clone());
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    seen.lock()
                        .unwrap()
                        .push(body["prompt"].as_str().unwrap_or_default().to_string());
                    (status, Json(json!({ "response": reply })))
                }
            }),
        );
        (spawn_backend(router).await, hits, prompts)
    }

    #[tokio::test]
    async fn test_resume_success_appends_suggestions() {
        let (base, _, prompts) =
            fake_provider(StatusCode::OK, "Lead with distributed work.\n\nAdd gRPC.").await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let outcome = customize_resume(&registry, &store, resume_job(), &ProviderOverride::default())
            .await
            .unwrap();

        let prompt = prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Jane Doe\nGo engineer\nSkills: Go"));
        assert!(prompt.contains(JOB));

        let stored = std::fs::read(&outcome.artifact.generated_path).unwrap();
        let paragraphs = extract(&stored).unwrap();
        assert_eq!(
            paragraphs,
            vec![
                "Jane Doe",
                "Go engineer",
                "Skills: Go",
                SUGGESTIONS_HEADING,
                "Lead with distributed work.",
                "Add gRPC."
            ]
        );
        assert_eq!(outcome.provider_used, ProviderId::Local);
        assert_eq!(outcome.model_used, "qwen2.5:14b");
        assert_eq!(outcome.artifact.linked_application_id, Some(7));
        let source = outcome.artifact.source_path.as_ref().unwrap();
        assert!(source.starts_with(store.folder(ArtifactKind::Resume)));
        assert!(source.exists());
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.preview_text, "Lead with distributed work.\n\nAdd gRPC.");
    }

    #[tokio::test]
    async fn test_resume_provider_failure_keeps_original() {
        let (base, hits, _) = fake_provider(StatusCode::SERVICE_UNAVAILABLE, "").await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let outcome = customize_resume(&registry, &store, resume_job(), &ProviderOverride::default())
            .await
            .unwrap();

        let paragraphs = extract(&std::fs::read(&outcome.artifact.generated_path).unwrap()).unwrap();
        assert_eq!(&paragraphs[..3], ["Jane Doe", "Go engineer", "Skills: Go"]);
        assert_eq!(paragraphs[3], SUGGESTIONS_HEADING);
        assert!(paragraphs[4].starts_with(NO_SUGGESTIONS_NOTE));
        assert!(outcome.warning.unwrap().contains("local is unavailable"));
        assert!(outcome.result.is_none());
        // One attempt plus one retry.
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resume_empty_response_is_noted() {
        let (base, _, _) = fake_provider(StatusCode::OK, "   ").await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let outcome = customize_resume(&registry, &store, resume_job(), &ProviderOverride::default())
            .await
            .unwrap();
        assert!(outcome.preview_text.starts_with(NO_SUGGESTIONS_NOTE));
        assert!(outcome.warning.unwrap().contains("empty response"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_provider_call() {
        let (base, hits, _) = fake_provider(StatusCode::OK, "unused").await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let mut job = resume_job();
        job.job_description = "  ".to_string();
        let err = customize_resume(&registry, &store, job, &ProviderOverride::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut job = cover_letter_job();
        job.company_name = String::new();
        let err = generate_cover_letter(&registry, &store, job, &ProviderOverride::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_docx_source_is_document_format_error() {
        let (base, hits, _) = fake_provider(StatusCode::OK, "unused").await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let mut job = resume_job();
        job.source.bytes = b"%PDF-1.7 not a word file".to_vec();
        let err = customize_resume(&registry, &store, job, &ProviderOverride::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DocumentFormat(_)), "got {err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cover_letter_skeleton_around_generated_body() {
        let body = "I keep fleets healthy.\n\nI would love to do so at Acme.";
        let (base, _, prompts) = fake_provider(StatusCode::OK, body).await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let outcome =
            generate_cover_letter(&registry, &store, cover_letter_job(), &ProviderOverride::default())
                .await
                .unwrap();

        assert!(prompts.lock().unwrap()[0].contains("SRE position at Acme"));
        let paragraphs = extract(&std::fs::read(&outcome.artifact.generated_path).unwrap()).unwrap();
        assert!(paragraphs.contains(&"Acme".to_string()));
        assert!(paragraphs.contains(&"Re: SRE".to_string()));
        assert!(paragraphs.contains(&"I keep fleets healthy.".to_string()));
        assert!(paragraphs.contains(&"I would love to do so at Acme.".to_string()));
        assert_eq!(paragraphs.last().map(String::as_str), Some("J. Doe"));
        assert_eq!(outcome.artifact.kind, ArtifactKind::CoverLetter);
        assert!(outcome
            .artifact
            .file_name()
            .ends_with("cover_letter_Acme_SRE.docx"));
        assert_eq!(outcome.result.unwrap().raw_text, body);
    }

    #[tokio::test]
    async fn test_cover_letter_empty_body_is_an_error() {
        let (base, _, _) = fake_provider(StatusCode::OK, "").await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();

        let err =
            generate_cover_letter(&registry, &store, cover_letter_job(), &ProviderOverride::default())
                .await
                .unwrap_err();
        assert!(
            matches!(err, AppError::ProviderUnavailable { provider: ProviderId::Local, .. }),
            "got {err:?}"
        );
        let stored = std::fs::read_dir(store.folder(ArtifactKind::CoverLetter)).unwrap().count();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn test_hosted_override_without_key_is_configuration_error() {
        let (base, hits, _) = fake_provider(StatusCode::OK, "unused").await;
        let registry = local_registry(&base);
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let selection = ProviderOverride {
            provider: Some(ProviderId::OpenAi),
            ..ProviderOverride::default()
        };

        let err = generate_cover_letter(&registry, &store, cover_letter_job(), &selection)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
