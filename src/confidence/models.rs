//! Data models for confidence scoring

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The five normalized inputs to the confidence calculation.
/// Pure input value; never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub input_quality: f64,
    pub processing_success: f64,
    pub output_quality: f64,
    pub consistency: f64,
    pub ai_response_quality: f64,
    pub validation_passed: bool,
}

impl ConfidenceFactors {
    /// Copy with every factor clamped into [0, 100]
    pub fn clamped(&self) -> Self {
        Self {
            input_quality: self.input_quality.clamp(0.0, 100.0),
            processing_success: self.processing_success.clamp(0.0, 100.0),
            output_quality: self.output_quality.clamp(0.0, 100.0),
            consistency: self.consistency.clamp(0.0, 100.0),
            ai_response_quality: self.ai_response_quality.clamp(0.0, 100.0),
            validation_passed: self.validation_passed,
        }
    }
}

/// Qualitative confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    /// Map an overall score to its tier
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::High
        } else if score >= 65.0 {
            Self::Medium
        } else if score >= 40.0 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::VeryLow => "very_low",
        }
    }
}

/// Human-auditable result of one confidence calculation.
/// Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub overall_score: f64,
    pub level: ConfidenceLevel,
    /// Clamped factor inputs, keyed by factor name
    pub factor_scores: IndexMap<String, f64>,
    /// Each factor's weighted contribution to the overall score
    pub weighted_contributions: IndexMap<String, f64>,
    pub validation_passed: bool,
}
