//! Multipart form parsing for the résumé and cover-letter routes.

use axum::extract::Multipart;

use crate::errors::AppError;
use crate::models::ApplicantProfile;
use crate::settings::ProviderOverride;

/// An uploaded file with its data and client-supplied name.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Every field the generation routes understand. Unknown fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct GenerationForm {
    pub job_description: String,
    pub company_name: String,
    pub position: String,
    pub full_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub linked_application_id: Option<i64>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub credential: Option<String>,
    pub resume: Option<UploadedFile>,
    /// Name (or path) of a résumé already in the store.
    pub resume_path: Option<String>,
}

impl GenerationForm {
    pub fn provider_override(&self) -> Result<ProviderOverride, AppError> {
        ProviderOverride::from_fields(
            self.provider.as_deref(),
            self.model.as_deref(),
            self.credential.as_deref(),
        )
    }

    /// `None` when no applicant field was supplied at all.
    pub fn applicant_profile(&self) -> Option<ApplicantProfile> {
        let profile = ApplicantProfile {
            full_name: self.full_name.clone().unwrap_or_default(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        };
        let supplied = !profile.full_name.trim().is_empty() || !profile.contact_lines().is_empty();
        supplied.then_some(profile)
    }
}

/// Reads the whole multipart body into a [`GenerationForm`].
pub async fn parse_form(mut multipart: Multipart) -> Result<GenerationForm, AppError> {
    let mut form = GenerationForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "resume" {
            let file_name = field.file_name().unwrap_or("resume.docx").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read file data: {e}")))?
                .to_vec();
            form.resume = Some(UploadedFile { file_name, data });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
        let optional = || Some(value.trim().to_string()).filter(|v| !v.is_empty());

        match name.as_str() {
            "job_description" => form.job_description = value.clone(),
            "company_name" => form.company_name = value.trim().to_string(),
            "position" => form.position = value.trim().to_string(),
            "full_name" => form.full_name = optional(),
            "address" => form.address = optional(),
            "phone" => form.phone = optional(),
            "email" => form.email = optional(),
            "provider" => form.provider = optional(),
            "model" => form.model = optional(),
            "credential" => form.credential = optional(),
            "resume_path" => form.resume_path = optional(),
            "linked_application_id" => {
                form.linked_application_id = optional()
                    .map(|v| {
                        v.parse::<i64>().map_err(|_| {
                            AppError::Validation(format!(
                                "linked_application_id must be an integer, got '{v}'"
                            ))
                        })
                    })
                    .transpose()?;
            }
            _ => {} // Ignore unknown fields
        }
    }

    Ok(form)
}

/// Only Word documents are accepted as résumé uploads.
pub fn ensure_docx_name(file_name: &str) -> Result<(), AppError> {
    if file_name.to_ascii_lowercase().ends_with(".docx") {
        Ok(())
    } else {
        Err(AppError::DocumentFormat(format!(
            "'{file_name}' is not a .docx file; only Word documents are supported"
        )))
    }
}
