//! Staged input validation with fail-fast semantics
//!
//! Stages run strictly in order and short-circuit on the first failure:
//! length, gibberish, professional density, then the semantic judge. Only
//! the semantic stage touches the network; a provider failure there is
//! reported as `ProviderError`, never as a pass (fail closed).

use super::models::{FailureReason, SemanticResponse, ValidationOutcome};
use super::vocabulary::ProfessionalVocabulary;
use crate::metrics::METRICS;
use crate::provider::{AiProvider, CompletionRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Known keyboard-mashing sequences checked by the gibberish stage
const KEYBOARD_SEQUENCES: &[&str] = &[
    "qwertyuiop", "qwerty", "asdfgh", "asdf", "zxcvbn", "zxcv", "123456",
    "654321", "abcdef", "qazwsx",
];

/// Validation pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum word count accepted by the length stage
    #[serde(default = "default_min_word_count")]
    pub min_word_count: usize,

    /// Minimum ratio of alphabetic to non-space characters
    #[serde(default = "default_min_alpha_ratio")]
    pub min_alpha_ratio: f64,

    /// Minimum distinct professional-term hits
    #[serde(default = "default_min_professional_terms")]
    pub min_professional_terms: usize,

    /// Minimum confidence required from the semantic judge
    #[serde(default = "default_min_semantic_confidence")]
    pub min_semantic_confidence: f64,

    /// Semantic stage timeout in milliseconds
    #[serde(default = "default_semantic_timeout_ms")]
    pub semantic_timeout_ms: u64,

    /// Document type the semantic judge validates against
    #[serde(default = "default_document_type")]
    pub document_type: String,

    /// Model used for the semantic judge completion
    #[serde(default = "default_semantic_model")]
    pub semantic_model: String,
}

// Default value functions
fn default_min_word_count() -> usize { 50 }
fn default_min_alpha_ratio() -> f64 { 0.7 }
fn default_min_professional_terms() -> usize { 5 }
fn default_min_semantic_confidence() -> f64 { 0.7 }
fn default_semantic_timeout_ms() -> u64 { 15_000 }
fn default_document_type() -> String { "professional document".to_string() }
fn default_semantic_model() -> String { "text-default".to_string() }

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_word_count: default_min_word_count(),
            min_alpha_ratio: default_min_alpha_ratio(),
            min_professional_terms: default_min_professional_terms(),
            min_semantic_confidence: default_min_semantic_confidence(),
            semantic_timeout_ms: default_semantic_timeout_ms(),
            document_type: default_document_type(),
            semantic_model: default_semantic_model(),
        }
    }
}

impl ValidationConfig {
    /// Load configuration overrides from environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("AI_RELIABILITY_MIN_WORD_COUNT") {
            if let Ok(count) = val.parse() {
                self.min_word_count = count;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_MIN_ALPHA_RATIO") {
            if let Ok(ratio) = val.parse() {
                self.min_alpha_ratio = ratio;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_MIN_PROFESSIONAL_TERMS") {
            if let Ok(terms) = val.parse() {
                self.min_professional_terms = terms;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_MIN_SEMANTIC_CONFIDENCE") {
            if let Ok(confidence) = val.parse() {
                self.min_semantic_confidence = confidence;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_SEMANTIC_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.semantic_timeout_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_DOCUMENT_TYPE") {
            self.document_type = val;
        }

        self
    }

    /// Get the semantic stage timeout as Duration
    pub fn semantic_timeout(&self) -> Duration {
        Duration::from_millis(self.semantic_timeout_ms)
    }
}

/// Staged input validator
pub struct ValidationPipeline {
    provider: Arc<dyn AiProvider>,
    config: ValidationConfig,
    vocabulary: ProfessionalVocabulary,
}

impl ValidationPipeline {
    /// Create a new validation pipeline
    pub fn new(provider: Arc<dyn AiProvider>, config: ValidationConfig) -> Self {
        Self {
            provider,
            config,
            vocabulary: ProfessionalVocabulary::default(),
        }
    }

    /// Run all stages against the input, failing fast on the first rejection
    pub async fn validate(&self, text: &str) -> ValidationOutcome {
        let outcome = self.run_stages(text).await;

        METRICS.record_validation(outcome.passed);
        if let Some(reason) = outcome.failure_reason {
            METRICS.record_stage_failure(reason.stage());
            debug!("Validation rejected at {} stage: {:?}", reason.stage(), reason);
        } else {
            debug!(
                "Validation passed: {} words, {} term hits, semantic confidence {:.2}",
                outcome.word_count, outcome.professional_term_hits, outcome.semantic_confidence
            );
        }

        outcome
    }

    async fn run_stages(&self, text: &str) -> ValidationOutcome {
        // Stage 1: length
        if text.trim().is_empty() {
            return ValidationOutcome::rejected(FailureReason::EmptyInput, 0);
        }

        let word_count = text.split_whitespace().count();
        if word_count < self.config.min_word_count {
            return ValidationOutcome::rejected(FailureReason::TooShort, word_count)
                .with_detail("min_word_count", json!(self.config.min_word_count));
        }

        // Stage 2: gibberish
        if let Some(c) = repeated_run(text) {
            return ValidationOutcome::rejected(FailureReason::Gibberish, word_count)
                .with_detail("repeated_character", json!(c.to_string()));
        }

        let lowered = text.to_lowercase();
        if let Some(seq) = KEYBOARD_SEQUENCES.iter().find(|s| lowered.contains(**s)) {
            return ValidationOutcome::rejected(FailureReason::Gibberish, word_count)
                .with_detail("keyboard_sequence", json!(seq));
        }

        let ratio = alpha_ratio(text);
        if ratio < self.config.min_alpha_ratio {
            return ValidationOutcome::rejected(FailureReason::Gibberish, word_count)
                .with_detail("alpha_ratio", json!(ratio));
        }

        // Stage 3: professional density
        let hits = self.vocabulary.scan(text);
        if hits.total_distinct < self.config.min_professional_terms {
            let mut outcome =
                ValidationOutcome::rejected(FailureReason::LowProfessionalDensity, word_count)
                    .with_detail("category_hits", json!(hits.by_category));
            outcome.professional_term_hits = hits.total_distinct;
            return outcome;
        }

        // Stage 4: semantic judge (the only stage that suspends on I/O)
        self.semantic_stage(text, word_count, hits.total_distinct, ratio)
            .await
    }

    async fn semantic_stage(
        &self,
        text: &str,
        word_count: usize,
        term_hits: usize,
        alpha_ratio: f64,
    ) -> ValidationOutcome {
        let prompt = self.build_semantic_prompt(text);
        let request = CompletionRequest {
            prompt: &prompt,
            model: &self.config.semantic_model,
            max_tokens: 200,
            temperature: 0.0,
        };

        let response =
            match tokio::time::timeout(self.config.semantic_timeout(), self.provider.completion(request))
                .await
            {
                Err(_) => {
                    warn!(
                        "Semantic validation timed out after {}ms",
                        self.config.semantic_timeout_ms
                    );
                    let mut outcome =
                        ValidationOutcome::rejected(FailureReason::ProviderError, word_count)
                            .with_detail("error", json!("semantic stage timed out"));
                    outcome.professional_term_hits = term_hits;
                    return outcome;
                }
                Ok(Err(e)) => {
                    warn!("Semantic validation provider call failed: {}", e);
                    let mut outcome =
                        ValidationOutcome::rejected(FailureReason::ProviderError, word_count)
                            .with_detail("error", json!(e.to_string()));
                    outcome.professional_term_hits = term_hits;
                    return outcome;
                }
                Ok(Ok(response)) => response,
            };

        match SemanticResponse::parse(&response.text) {
            SemanticResponse::Malformed(raw) => {
                // Unusable judge output is an availability problem, not a
                // statement about the input. Fail closed.
                warn!("Semantic judge returned malformed verdict");
                let mut outcome =
                    ValidationOutcome::rejected(FailureReason::ProviderError, word_count)
                        .with_detail("error", json!("malformed semantic verdict"))
                        .with_detail("raw_response", json!(truncate(&raw, 200)));
                outcome.professional_term_hits = term_hits;
                outcome
            }
            SemanticResponse::Parsed(verdict) => {
                if !verdict.legitimate || verdict.confidence < self.config.min_semantic_confidence {
                    let mut outcome =
                        ValidationOutcome::rejected(FailureReason::SemanticRejected, word_count)
                            .with_detail("legitimate", json!(verdict.legitimate))
                            .with_detail("quality_tier", json!(verdict.quality.as_str()));
                    outcome.professional_term_hits = term_hits;
                    outcome.semantic_confidence = verdict.confidence;
                    return outcome;
                }

                ValidationOutcome::accepted(word_count, term_hits, verdict.confidence)
                    .with_detail("alpha_ratio", json!(alpha_ratio))
                    .with_detail("quality_tier", json!(verdict.quality.as_str()))
            }
        }
    }

    fn build_semantic_prompt(&self, text: &str) -> String {
        format!(
            "You are a strict input validator. Determine whether the following text is a \
             legitimate {}. Respond with only a JSON object of the form \
             {{\"legitimate\": true|false, \"confidence\": <number between 0 and 1>, \
             \"quality\": \"high\"|\"medium\"|\"low\"}}.\n\nText:\n{}",
            self.config.document_type, text
        )
    }
}

/// Find a run of 3+ identical consecutive non-whitespace characters
fn repeated_run(text: &str) -> Option<char> {
    let mut prev: Option<char> = None;
    let mut run = 1;

    for c in text.chars() {
        if c.is_whitespace() {
            prev = None;
            run = 1;
            continue;
        }
        if Some(c) == prev {
            run += 1;
            if run >= 3 {
                return Some(c);
            }
        } else {
            prev = Some(c);
            run = 1;
        }
    }

    None
}

/// Ratio of alphabetic characters to all non-whitespace characters
fn alpha_ratio(text: &str) -> f64 {
    let mut alpha = 0usize;
    let mut total = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if c.is_alphabetic() {
            alpha += 1;
        }
    }

    if total == 0 {
        return 0.0;
    }
    alpha as f64 / total as f64
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompletionOutput, ProviderError, ProviderResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted provider: counts calls, replies with a fixed completion or fails
    struct StubProvider {
        reply: Option<String>,
        delay: Option<Duration>,
        completions: AtomicUsize,
    }

    impl StubProvider {
        fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                delay: None,
                completions: AtomicUsize::new(0),
            }
        }

        fn offline() -> Self {
            Self {
                reply: None,
                delay: None,
                completions: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.completions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AiProvider for StubProvider {
        async fn completion(
            &self,
            _request: CompletionRequest<'_>,
        ) -> ProviderResult<CompletionOutput> {
            self.completions.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Some(text) => Ok(CompletionOutput {
                    text: text.clone(),
                    tokens_used: Some(40),
                }),
                None => Err(ProviderError::Network("stub offline".to_string())),
            }
        }

        async fn embedding(&self, texts: &[String], _model: &str) -> ProviderResult<Vec<Vec<f32>>> {
            Ok(vec![vec![0.1; 8]; texts.len()])
        }
    }

    const POSITIVE_VERDICT: &str =
        r#"{"legitimate": true, "confidence": 0.93, "quality": "high"}"#;

    fn professional_text() -> &'static str {
        "We are seeking a senior software engineer to join our platform team. \
         The engineer will develop and maintain distributed services, collaborate \
         with product stakeholders, and oversee deployment pipelines. Required \
         qualifications include a bachelor degree in computer science, five years \
         of professional experience, proven leadership skills, and strong \
         communication abilities across the organization."
    }

    fn mundane_text() -> &'static str {
        "The sun rose slowly over the quiet valley while the river wound its way \
         past old stone bridges and sleepy farmhouses. Birds gathered along the \
         fences, singing into the cool morning air, and a thin mist drifted \
         between the hills before the light finally warmed the fields and woke \
         the village below."
    }

    fn pipeline_with(provider: StubProvider) -> (ValidationPipeline, Arc<StubProvider>) {
        let provider = Arc::new(provider);
        let pipeline = ValidationPipeline::new(provider.clone(), ValidationConfig::default());
        (pipeline, provider)
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let (pipeline, provider) = pipeline_with(StubProvider::replying(POSITIVE_VERDICT));
        let outcome = pipeline.validate("   \n\t  ").await;

        assert!(!outcome.passed);
        assert_eq!(outcome.failure_reason, Some(FailureReason::EmptyInput));
        assert_eq!(outcome.word_count, 0);
        assert_eq!(provider.count(), 0);
    }

    #[tokio::test]
    async fn test_short_input_rejected_with_word_count() {
        let (pipeline, provider) = pipeline_with(StubProvider::replying(POSITIVE_VERDICT));
        let outcome = pipeline.validate("A short note about the engineer role.").await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::TooShort));
        assert_eq!(outcome.word_count, 7);
        assert_eq!(provider.count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_characters_rejected_before_provider_runs() {
        let (pipeline, provider) = pipeline_with(StubProvider::replying(POSITIVE_VERDICT));
        let text = format!("{} loooool", professional_text());
        let outcome = pipeline.validate(&text).await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::Gibberish));
        assert_eq!(provider.count(), 0, "semantic stage must not run after gibberish");
    }

    #[tokio::test]
    async fn test_keyboard_sequence_rejected() {
        let (pipeline, _) = pipeline_with(StubProvider::replying(POSITIVE_VERDICT));
        let text = format!("{} qwerty", professional_text());
        let outcome = pipeline.validate(&text).await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::Gibberish));
        assert!(outcome.details.contains_key("keyboard_sequence"));
    }

    #[tokio::test]
    async fn test_low_alpha_ratio_rejected() {
        let (pipeline, _) = pipeline_with(StubProvider::replying(POSITIVE_VERDICT));
        // Enough words, but mostly digits and symbols
        let noise: String = (0..60).map(|i| format!("{}#${} ", i, i * 7)).collect();
        let outcome = pipeline.validate(&noise).await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::Gibberish));
        assert!(outcome.details.contains_key("alpha_ratio"));
    }

    #[tokio::test]
    async fn test_low_professional_density_rejected() {
        let (pipeline, provider) = pipeline_with(StubProvider::replying(POSITIVE_VERDICT));
        let outcome = pipeline.validate(mundane_text()).await;

        assert_eq!(
            outcome.failure_reason,
            Some(FailureReason::LowProfessionalDensity)
        );
        assert!(outcome.professional_term_hits < 5);
        assert_eq!(provider.count(), 0);
    }

    #[tokio::test]
    async fn test_professional_text_passes() {
        let (pipeline, provider) = pipeline_with(StubProvider::replying(POSITIVE_VERDICT));
        let outcome = pipeline.validate(professional_text()).await;

        assert!(outcome.passed, "expected pass, got {:?}", outcome.failure_reason);
        assert!(outcome.word_count >= 50);
        assert!(outcome.professional_term_hits >= 5);
        assert!((outcome.semantic_confidence - 0.93).abs() < 1e-9);
        assert_eq!(provider.count(), 1);
    }

    #[tokio::test]
    async fn test_negative_verdict_rejected() {
        let (pipeline, _) = pipeline_with(StubProvider::replying(
            r#"{"legitimate": false, "confidence": 0.9, "quality": "low"}"#,
        ));
        let outcome = pipeline.validate(professional_text()).await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::SemanticRejected));
        assert!((outcome.semantic_confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_low_confidence_verdict_rejected() {
        let (pipeline, _) = pipeline_with(StubProvider::replying(
            r#"{"legitimate": true, "confidence": 0.4, "quality": "medium"}"#,
        ));
        let outcome = pipeline.validate(professional_text()).await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::SemanticRejected));
    }

    #[tokio::test]
    async fn test_provider_failure_fails_closed() {
        let (pipeline, _) = pipeline_with(StubProvider::offline());
        let outcome = pipeline.validate(professional_text()).await;

        assert!(!outcome.passed);
        assert_eq!(outcome.failure_reason, Some(FailureReason::ProviderError));
        assert!(outcome.failure_reason.unwrap().is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_verdict_fails_closed() {
        let (pipeline, _) = pipeline_with(StubProvider::replying("Looks good to me!"));
        let outcome = pipeline.validate(professional_text()).await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::ProviderError));
    }

    #[tokio::test(start_paused = true)]
    async fn test_semantic_timeout_fails_closed() {
        let provider = Arc::new(StubProvider {
            reply: Some(POSITIVE_VERDICT.to_string()),
            delay: Some(Duration::from_millis(500)),
            completions: AtomicUsize::new(0),
        });
        let config = ValidationConfig {
            semantic_timeout_ms: 100,
            ..ValidationConfig::default()
        };
        let pipeline = ValidationPipeline::new(provider, config);
        let outcome = pipeline.validate(professional_text()).await;

        assert_eq!(outcome.failure_reason, Some(FailureReason::ProviderError));
    }

    #[test]
    fn test_repeated_run_ignores_whitespace() {
        assert_eq!(repeated_run("a a a"), None);
        assert_eq!(repeated_run("baaad"), Some('a'));
        assert_eq!(repeated_run("ordinary words"), None);
    }

    #[test]
    fn test_alpha_ratio_bounds() {
        assert!(alpha_ratio("words only here") > 0.99);
        assert!(alpha_ratio("1234 5678") < 0.01);
    }
}
