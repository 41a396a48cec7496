//! Input validation pipeline

pub mod models;
pub mod pipeline;
pub mod vocabulary;

pub use models::{FailureReason, SemanticResponse, SemanticVerdict, ValidationOutcome, VerdictTier};
pub use pipeline::{ValidationConfig, ValidationPipeline};
pub use vocabulary::{ProfessionalVocabulary, VocabularyHits};
