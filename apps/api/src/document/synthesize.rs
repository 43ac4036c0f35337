//! Document Synthesizer: turns provider output into downloadable documents.
//!
//! The layout is owned here, never by the model:
//! - cover letters get a fixed skeleton around the generated body;
//! - résumés keep every original part and gain an appended suggestions section.

use chrono::NaiveDate;

use crate::document::docx::{append_to_body, heading, paragraph, write_package};
use crate::errors::AppError;
use crate::models::ApplicantProfile;

pub const SUGGESTIONS_HEADING: &str = "Tailoring Suggestions";
pub const NO_SUGGESTIONS_NOTE: &str = "No suggestions available";
const NAME_PLACEHOLDER: &str = "[Your Name]";

/// Skeleton fields for a cover letter.
#[derive(Debug, Clone)]
pub struct CoverLetterFields<'a> {
    pub date: NaiveDate,
    pub company_name: &'a str,
    pub position: &'a str,
    pub applicant: Option<&'a ApplicantProfile>,
}

/// What to append to a résumé.
#[derive(Debug, Clone, Copy)]
pub enum Suggestions<'a> {
    Generated(&'a str),
    /// Generation failed or returned nothing; carries the reason shown to the user.
    Unavailable(&'a str),
}

/// Splits model output on blank lines. Each paragraph is kept verbatim apart
/// from the line endings that separated it from its neighbours.
pub fn body_paragraphs(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .flat_map(|chunk| chunk.split("\r\n\r\n"))
        .map(|p| p.trim_matches(|c| c == '\n' || c == '\r'))
        .filter(|p| !p.trim().is_empty())
        .collect()
}

/// The cover letter as ordered paragraph lines; empty strings are spacer lines.
pub fn cover_letter_lines<'a>(fields: &CoverLetterFields<'a>, body: &'a str) -> Vec<String> {
    let mut lines = vec![
        fields.date.format("%B %d, %Y").to_string(),
        String::new(),
        "Hiring Manager".to_string(),
        fields.company_name.to_string(),
        String::new(),
        format!("Re: {}", fields.position),
        String::new(),
        "Dear Hiring Manager,".to_string(),
    ];
    lines.extend(body_paragraphs(body).into_iter().map(str::to_string));
    lines.push(String::new());
    lines.push("Sincerely,".to_string());
    lines.push(String::new());

    let name = fields
        .applicant
        .map(|a| a.full_name.trim())
        .filter(|n| !n.is_empty())
        .unwrap_or(NAME_PLACEHOLDER);
    lines.push(name.to_string());
    if let Some(applicant) = fields.applicant {
        lines.extend(applicant.contact_lines().into_iter().map(str::to_string));
    }
    lines
}

/// Builds a new cover-letter document around the generated `body`.
pub fn cover_letter(fields: &CoverLetterFields<'_>, body: &str) -> Result<Vec<u8>, AppError> {
    let body_xml: String = cover_letter_lines(fields, body)
        .iter()
        .map(|line| paragraph(line))
        .collect();
    Ok(write_package(&body_xml)?)
}

/// The paragraphs appended to a résumé, heading included.
pub fn suggestion_lines(suggestions: Suggestions<'_>) -> Vec<String> {
    let mut lines = vec![SUGGESTIONS_HEADING.to_string()];
    match suggestions {
        Suggestions::Generated(text) if !text.trim().is_empty() => {
            lines.extend(body_paragraphs(text).into_iter().map(str::to_string));
        }
        Suggestions::Generated(_) => {
            lines.push(format!(
                "{NO_SUGGESTIONS_NOTE}: the provider returned an empty response."
            ));
        }
        Suggestions::Unavailable(reason) => {
            lines.push(format!("{NO_SUGGESTIONS_NOTE}: {reason}"));
        }
    }
    lines
}

/// Copies the original résumé and appends the suggestions section.
///
/// The original paragraphs are never touched, so the result always contains
/// the full résumé even when generation failed.
pub fn customized_resume(original: &[u8], suggestions: Suggestions<'_>) -> Result<Vec<u8>, AppError> {
    let lines = suggestion_lines(suggestions);
    let mut body_xml = heading(&lines[0]);
    for line in &lines[1..] {
        body_xml.push_str(&paragraph(line));
    }
    Ok(append_to_body(original, &body_xml)?)
}
