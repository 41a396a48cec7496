//! Multi-factor confidence scoring

pub mod calculator;
pub mod factors;
pub mod models;

pub use calculator::{ConfidenceCalculator, ConfidenceError, ConfidenceWeights};
pub use factors::{input_quality_score, output_quality_score, processing_success_score};
pub use models::{ConfidenceBreakdown, ConfidenceFactors, ConfidenceLevel};
