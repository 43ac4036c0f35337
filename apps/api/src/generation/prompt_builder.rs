//! Prompt Builder: turns a [`GenerationRequest`] into the provider prompt.
//!
//! Pure and deterministic: the same request always yields byte-identical
//! output, and no provider is contacted here.

use crate::generation::prompts::{
    COVER_LETTER_TEMPLATE, NO_RESUME_GROUNDING, RESUME_CUSTOMIZATION_TEMPLATE,
    RESUME_SECTION_TEMPLATE,
};
use crate::llm_client::prompts::{render, NO_INVENTION_INSTRUCTION, PROSE_ONLY_INSTRUCTION};
use crate::models::{ApplicantProfile, GenerationRequest, Task};

pub fn build(request: &GenerationRequest) -> String {
    match request.task {
        Task::ResumeCustomization => build_resume_prompt(request),
        Task::CoverLetter => build_cover_letter_prompt(request),
    }
}

fn build_resume_prompt(request: &GenerationRequest) -> String {
    let target = match (request.position.trim(), request.company_name.trim()) {
        ("", "") => String::new(),
        (position, "") => format!(" (target role: {position})"),
        ("", company) => format!(" (target company: {company})"),
        (position, company) => format!(" (target role: {position} at {company})"),
    };

    render(
        RESUME_CUSTOMIZATION_TEMPLATE,
        &[
            ("target", target.as_str()),
            ("job_description", request.job_description.trim()),
            ("resume_text", request.source_text.as_deref().unwrap_or("").trim()),
            ("no_invention", NO_INVENTION_INSTRUCTION),
            ("prose_only", PROSE_ONLY_INSTRUCTION),
        ],
    )
}

fn build_cover_letter_prompt(request: &GenerationRequest) -> String {
    let applicant = applicant_block(request.applicant_profile.as_ref());
    let source = request
        .source_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let resume_section = source
        .map(|text| render(RESUME_SECTION_TEMPLATE, &[("resume_text", text)]))
        .unwrap_or_default();
    let grounding = if source.is_some() {
        NO_INVENTION_INSTRUCTION
    } else {
        NO_RESUME_GROUNDING
    };

    render(
        COVER_LETTER_TEMPLATE,
        &[
            ("position", request.position.trim()),
            ("company_name", request.company_name.trim()),
            ("job_description", request.job_description.trim()),
            ("applicant", applicant.as_str()),
            ("resume_section", resume_section.as_str()),
            ("grounding", grounding),
            ("prose_only", PROSE_ONLY_INSTRUCTION),
        ],
    )
}

fn applicant_block(profile: Option<&ApplicantProfile>) -> String {
    let Some(profile) = profile else {
        return "(not provided)".to_string();
    };
    let mut lines = Vec::new();
    if !profile.full_name.trim().is_empty() {
        lines.push(format!("Name: {}", profile.full_name.trim()));
    }
    for line in profile.contact_lines() {
        lines.push(format!("Contact: {line}"));
    }
    if lines.is_empty() {
        "(not provided)".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resume_request() -> GenerationRequest {
        GenerationRequest {
            task: Task::ResumeCustomization,
            job_description: "Distributed systems engineer, Rust".to_string(),
            company_name: String::new(),
            position: String::new(),
            source_text: Some("Jane Doe\nGo engineer\nSkills: Go".to_string()),
            applicant_profile: None,
        }
    }

    fn cover_letter_request() -> GenerationRequest {
        GenerationRequest {
            task: Task::CoverLetter,
            job_description: "Keep our fleet healthy".to_string(),
            company_name: "Acme".to_string(),
            position: "SRE".to_string(),
            source_text: None,
            applicant_profile: Some(ApplicantProfile {
                full_name: "J. Doe".to_string(),
                address: None,
                phone: None,
                email: Some("j.doe@example.com".to_string()),
            }),
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(build(&resume_request()), build(&resume_request()));
        assert_eq!(build(&cover_letter_request()), build(&cover_letter_request()));
    }

    #[test]
    fn test_resume_prompt_contains_both_inputs() {
        let prompt = build(&resume_request());
        assert!(prompt.contains("Jane Doe\nGo engineer\nSkills: Go"));
        assert!(prompt.contains("Distributed systems engineer, Rust"));
        assert!(prompt.contains("Keywords to include"));
        assert!(prompt.contains(PROSE_ONLY_INSTRUCTION));
        assert!(!prompt.contains("{resume_text}"));
    }

    #[test]
    fn test_cover_letter_prompt_names_company_position_and_applicant() {
        let prompt = build(&cover_letter_request());
        assert!(prompt.contains("SRE position at Acme"));
        assert!(prompt.contains("Name: J. Doe"));
        assert!(prompt.contains("Contact: j.doe@example.com"));
        assert!(prompt.contains("300-400 words"));
        assert!(prompt.contains(NO_RESUME_GROUNDING));
        assert!(!prompt.contains("My Resume:"));
    }

    #[test]
    fn test_cover_letter_prompt_with_resume_requires_grounding() {
        let mut request = cover_letter_request();
        request.source_text = Some("Ran Kubernetes at scale".to_string());
        let prompt = build(&request);
        assert!(prompt.contains("My Resume:\nRan Kubernetes at scale"));
        assert!(prompt.contains(NO_INVENTION_INSTRUCTION));
    }

    #[test]
    fn test_user_text_with_placeholders_stays_literal() {
        let mut request = resume_request();
        request.job_description = "Use {resume_text} and {prose_only} literally".to_string();
        let prompt = build(&request);
        assert!(prompt.contains("Use {resume_text} and {prose_only} literally"));
    }
}
