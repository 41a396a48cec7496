//! Data models for the validation pipeline

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Reason a validation stage rejected the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    EmptyInput,
    TooShort,
    Gibberish,
    LowProfessionalDensity,
    SemanticRejected,
    ProviderError,
}

impl FailureReason {
    /// Stage label used for logging and metrics
    pub fn stage(&self) -> &'static str {
        match self {
            Self::EmptyInput | Self::TooShort => "length",
            Self::Gibberish => "gibberish",
            Self::LowProfessionalDensity => "professional_density",
            Self::SemanticRejected => "semantic",
            Self::ProviderError => "provider",
        }
    }

    /// True when the rejection reflects provider availability, not input quality.
    /// Callers may retry these later; input-quality rejections are definitive.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderError)
    }
}

/// Result of one validation run. Created fresh per call, never mutated after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub failure_reason: Option<FailureReason>,
    pub word_count: usize,
    pub professional_term_hits: usize,
    pub semantic_confidence: f64,
    pub details: IndexMap<String, serde_json::Value>,
}

impl ValidationOutcome {
    /// Build a rejection outcome for the given reason
    pub fn rejected(reason: FailureReason, word_count: usize) -> Self {
        Self {
            passed: false,
            failure_reason: Some(reason),
            word_count,
            professional_term_hits: 0,
            semantic_confidence: 0.0,
            details: IndexMap::new(),
        }
    }

    /// Build a passing outcome
    pub fn accepted(word_count: usize, professional_term_hits: usize, semantic_confidence: f64) -> Self {
        Self {
            passed: true,
            failure_reason: None,
            word_count,
            professional_term_hits,
            semantic_confidence,
            details: IndexMap::new(),
        }
    }

    /// Attach a detail entry for auditability
    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Quality tier reported by the semantic judge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictTier {
    High,
    Medium,
    Low,
}

impl VerdictTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Structured verdict returned by the semantic stage prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticVerdict {
    pub legitimate: bool,
    pub confidence: f64,
    pub quality: VerdictTier,
}

/// Parse result for the semantic judge's raw completion text.
///
/// Modeled as a tagged variant so required-field checks are exhaustive:
/// a malformed response is never mistaken for a verdict.
#[derive(Debug, Clone)]
pub enum SemanticResponse {
    Parsed(SemanticVerdict),
    Malformed(String),
}

impl SemanticResponse {
    /// Parse the raw completion text, tolerating markdown code fences
    /// and prose around the JSON object.
    pub fn parse(raw: &str) -> Self {
        let candidate = match (raw.find('{'), raw.rfind('}')) {
            (Some(start), Some(end)) if start < end => &raw[start..=end],
            _ => return Self::Malformed(raw.to_string()),
        };

        match serde_json::from_str::<SemanticVerdict>(candidate) {
            Ok(mut verdict) => {
                verdict.confidence = verdict.confidence.clamp(0.0, 1.0);
                Self::Parsed(verdict)
            }
            Err(_) => Self::Malformed(raw.to_string()),
        }
    }
}
