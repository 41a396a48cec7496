//! Weighted confidence scoring with a statistical interval

use super::models::{ConfidenceBreakdown, ConfidenceFactors, ConfidenceLevel};
use crate::metrics::METRICS;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Flat adjustment applied for the validation verdict
const VALIDATION_BONUS: f64 = 5.0;
const VALIDATION_PENALTY: f64 = 10.0;

/// Tolerance for the weight-sum invariant
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

/// Confidence scoring errors
#[derive(Debug, Error)]
pub enum ConfidenceError {
    #[error("factor weights sum to {0}, expected exactly 1.0")]
    InvalidWeights(f64),
}

/// Fixed factor weights. Must sum to exactly 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub input_quality: f64,
    pub processing_success: f64,
    pub output_quality: f64,
    pub consistency: f64,
    pub ai_response_quality: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            input_quality: 0.25,
            processing_success: 0.20,
            output_quality: 0.25,
            consistency: 0.15,
            ai_response_quality: 0.15,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.input_quality
            + self.processing_success
            + self.output_quality
            + self.consistency
            + self.ai_response_quality
    }

    /// Validate the weight-sum invariant
    pub fn validate(&self) -> Result<(), ConfidenceError> {
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfidenceError::InvalidWeights(sum));
        }
        Ok(())
    }
}

/// Combines five weighted factors into an overall confidence verdict
pub struct ConfidenceCalculator {
    weights: ConfidenceWeights,
}

impl Default for ConfidenceCalculator {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
        }
    }
}

impl ConfidenceCalculator {
    /// Create a calculator with custom weights
    pub fn new(weights: ConfidenceWeights) -> Result<Self, ConfidenceError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Compute the overall score, level, and auditable breakdown
    pub fn compute_confidence(&self, factors: &ConfidenceFactors) -> ConfidenceBreakdown {
        let clamped = factors.clamped();

        let mut factor_scores = IndexMap::new();
        factor_scores.insert("input_quality".to_string(), clamped.input_quality);
        factor_scores.insert("processing_success".to_string(), clamped.processing_success);
        factor_scores.insert("output_quality".to_string(), clamped.output_quality);
        factor_scores.insert("consistency".to_string(), clamped.consistency);
        factor_scores.insert(
            "ai_response_quality".to_string(),
            clamped.ai_response_quality,
        );

        let mut weighted_contributions = IndexMap::new();
        weighted_contributions.insert(
            "input_quality".to_string(),
            clamped.input_quality * self.weights.input_quality,
        );
        weighted_contributions.insert(
            "processing_success".to_string(),
            clamped.processing_success * self.weights.processing_success,
        );
        weighted_contributions.insert(
            "output_quality".to_string(),
            clamped.output_quality * self.weights.output_quality,
        );
        weighted_contributions.insert(
            "consistency".to_string(),
            clamped.consistency * self.weights.consistency,
        );
        weighted_contributions.insert(
            "ai_response_quality".to_string(),
            clamped.ai_response_quality * self.weights.ai_response_quality,
        );

        let weighted_sum: f64 = weighted_contributions.values().sum();
        let adjustment = if clamped.validation_passed {
            VALIDATION_BONUS
        } else {
            -VALIDATION_PENALTY
        };

        let overall_score = (weighted_sum + adjustment).clamp(0.0, 100.0);
        let level = ConfidenceLevel::from_score(overall_score);

        METRICS.confidence_scores.observe(overall_score);
        debug!(
            "Confidence computed: {:.1} ({}) from weighted sum {:.1} and adjustment {:+.0}",
            overall_score,
            level.as_str(),
            weighted_sum,
            adjustment
        );

        ConfidenceBreakdown {
            overall_score,
            level,
            factor_scores,
            weighted_contributions,
            validation_passed: clamped.validation_passed,
        }
    }

    /// Statistical interval around a score. The base half-width tightens
    /// as the score rises and shrinks with the square root of the sample
    /// size; bounds are clamped to [0, 100].
    pub fn confidence_interval(&self, score: f64, sample_size: u32) -> (f64, f64) {
        let score = score.clamp(0.0, 100.0);
        let base_margin = 15.0 - (score / 100.0) * 10.0;
        let margin = base_margin / f64::from(sample_size.max(1)).sqrt();

        (
            (score - margin).clamp(0.0, 100.0),
            (score + margin).clamp(0.0, 100.0),
        )
    }
}
