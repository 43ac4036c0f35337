// Shared prompt fragments and prompt-rendering utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// Keeps model output usable as paragraph text in a generated document.
pub const PROSE_ONLY_INSTRUCTION: &str = "\
Respond in plain prose paragraphs separated by a blank line. \
Do NOT use markdown headings, tables, code fences, HTML, or document markup.";

/// Instruction to avoid fabricated experience.
pub const NO_INVENTION_INSTRUCTION: &str = "\
Only mention skills, experience, and achievements that actually appear in the material provided. \
Never invent employers, dates, credentials, or metrics.";

/// Renders `{placeholder}` slots in a single left-to-right pass.
///
/// Substituted values are never rescanned, so user text that happens to contain
/// `{job_description}` stays literal. Unknown placeholders are left as-is.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
