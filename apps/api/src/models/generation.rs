use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm_client::ProviderId;

/// What a generation request produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    ResumeCustomization,
    CoverLetter,
}

/// Applicant details used in the cover-letter prompt and signature block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub full_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ApplicantProfile {
    /// Non-empty contact lines in signature order: address, phone, email.
    pub fn contact_lines(&self) -> Vec<&str> {
        [&self.address, &self.phone, &self.email]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect()
    }
}

/// Everything the prompt builder needs. Built once per call, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub task: Task,
    pub job_description: String,
    pub company_name: String,
    pub position: String,
    /// Flattened résumé text, when a source document was supplied.
    pub source_text: Option<String>,
    pub applicant_profile: Option<ApplicantProfile>,
}

/// The output of one successful provider call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub provider_id: ProviderId,
    pub model_name: String,
    pub raw_text: String,
    pub created_at: DateTime<Utc>,
}
