pub mod artifact;
pub mod generation;

pub use artifact::{ArtifactKind, DocumentArtifact};
pub use generation::{ApplicantProfile, GenerationRequest, GenerationResult, Task};
