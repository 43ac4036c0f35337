// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.
// Placeholders are filled by `llm_client::prompts::render` in a single pass.

/// Résumé customization. Slots: `{resume_text}`, `{job_description}`,
/// `{target}`, `{prose_only}`, `{no_invention}`.
pub const RESUME_CUSTOMIZATION_TEMPLATE: &str = "\
I have a job description and need to customize my resume for it{target}.

Job Description:
{job_description}

My Resume:
{resume_text}

Compare my resume against the job description. Identify the gaps and propose \
concrete edits I can make to the resume, such as aligning wording with the \
job's keywords and reordering what is emphasized.
Focus on:
1. Skills to emphasize
2. Experience to highlight
3. Achievements that would be most relevant
4. Keywords to include

Write each suggestion as a short, specific, actionable paragraph.
{no_invention}
{prose_only}";

/// Cover letter body. Slots: `{position}`, `{company_name}`,
/// `{job_description}`, `{applicant}`, `{resume_section}`, `{grounding}`,
/// `{prose_only}`.
pub const COVER_LETTER_TEMPLATE: &str = "\
Write the body of a professional cover letter for the {position} position at {company_name}.

Job Description:
{job_description}

Applicant:
{applicant}
{resume_section}
The cover letter body should:
1. Highlight relevant skills and experience that match the job requirements
2. Show enthusiasm for the role and the company
3. Include a strong opening paragraph and a strong closing paragraph
4. Be approximately 300-400 words
5. Specifically mention the company name ({company_name}) and the position ({position})
6. Reference specific requirements or qualifications from the job description
7. {grounding}

Do NOT include a date, address block, salutation (such as \"Dear Hiring Manager\"), \
closing (such as \"Sincerely\"), or signature. Those are added separately.
Write the complete body text, ready to be sent.
{prose_only}";

/// Résumé block inserted into the cover-letter prompt when a résumé was supplied.
pub const RESUME_SECTION_TEMPLATE: &str = "
My Resume:
{resume_text}
";

/// Grounding rule when no résumé is available to draw experience from.
pub const NO_RESUME_GROUNDING: &str = "\
No resume was provided: do not claim specific employers, projects, dates, or metrics; \
keep statements about experience general.";
