// Paragraph-level .docx handling: text extraction in, document synthesis out.
// Pure and synchronous; callers with large inputs should use spawn_blocking.

pub mod docx;
pub mod extract;
pub mod synthesize;

pub use extract::{extract, flatten};
