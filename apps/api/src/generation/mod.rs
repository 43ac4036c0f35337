// Résumé customization and cover-letter generation.
// All LLM calls go through llm_client; settings come from the registry snapshot.

pub mod form;
pub mod handlers;
pub mod pipeline;
pub mod prompt_builder;
pub mod prompts;
