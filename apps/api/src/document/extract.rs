use crate::document::docx::{read_document_xml, read_paragraphs};
use crate::errors::AppError;

/// Extracts ordered, non-empty paragraph text from a `.docx` document.
///
/// Anything that is not a Word package fails with `DocumentFormat`. A valid
/// document with no text yields an empty vector, not an error.
pub fn extract(bytes: &[u8]) -> Result<Vec<String>, AppError> {
    let xml = read_document_xml(bytes)?;
    Ok(read_paragraphs(&xml)?)
}

/// Joins extracted paragraphs into the flat text blob used in prompts.
pub fn flatten(paragraphs: &[String]) -> String {
    paragraphs.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::resume_docx;

    #[test]
    fn test_extract_three_paragraph_resume() {
        let bytes = resume_docx(&[
            "Jane Doe, Backend Engineer",
            "Built a distributed job scheduler in Go handling 2M tasks/day",
            "Skills: Go, Kubernetes, PostgreSQL",
        ]);
        let paragraphs = extract(&bytes).unwrap();
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[2], "Skills: Go, Kubernetes, PostgreSQL");
    }

    #[test]
    fn test_empty_document_yields_empty_sequence() {
        let bytes = resume_docx(&[]);
        assert!(extract(&bytes).unwrap().is_empty());
        assert_eq!(flatten(&[]), "");
    }

    #[test]
    fn test_flatten_joins_with_single_newline() {
        let paragraphs = vec!["a".to_string(), "b".to_string()];
        assert_eq!(flatten(&paragraphs), "a\nb");
    }

    #[test]
    fn test_garbage_is_document_format_error() {
        let err = extract(b"definitely not a docx").unwrap_err();
        assert!(matches!(err, AppError::DocumentFormat(_)), "got {err:?}");
    }
}
