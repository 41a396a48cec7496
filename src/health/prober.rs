//! Provider health probing with a TTL-cached result
//!
//! Four ordered sub-probes (connectivity, embedding, completion, response
//! quality) short-circuit on the first non-healthy determination. The final
//! result is the single process-wide cached value until the TTL elapses or
//! a caller forces a refresh. Two concurrent callers observing an expired
//! cache may both re-probe; the write is idempotent and last-write-wins.

use super::models::{HealthCheckResult, HealthStatus};
use crate::metrics::METRICS;
use crate::provider::{AiProvider, CompletionRequest};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fixed sample used by the embedding and response-quality probes
const PROBE_SAMPLE_TEXT: &str =
    "The quarterly report shows steady growth across all three product lines.";

/// Token the completion probe expects back
const EXPECTED_COMPLETION_TOKEN: &str = "PONG";

/// Health prober configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Per-probe timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Connectivity latency ceiling in milliseconds before degrading
    #[serde(default = "default_latency_ceiling_ms")]
    pub latency_ceiling_ms: u64,

    /// Minimum quality score required by the response-quality probe
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: f64,

    /// Model used for probe completions
    #[serde(default = "default_probe_model")]
    pub completion_model: String,

    /// Model used for the embedding probe
    #[serde(default = "default_embed_model")]
    pub embedding_model: String,
}

// Default value functions
fn default_cache_ttl_secs() -> u64 { 60 }
fn default_probe_timeout_ms() -> u64 { 15_000 }
fn default_latency_ceiling_ms() -> u64 { 10_000 }
fn default_min_quality_score() -> f64 { 0.5 }
fn default_probe_model() -> String { "text-default".to_string() }
fn default_embed_model() -> String { "embed-default".to_string() }

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            latency_ceiling_ms: default_latency_ceiling_ms(),
            min_quality_score: default_min_quality_score(),
            completion_model: default_probe_model(),
            embedding_model: default_embed_model(),
        }
    }
}

impl HealthConfig {
    /// Load configuration overrides from environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("AI_RELIABILITY_HEALTH_TTL_SECS") {
            if let Ok(secs) = val.parse() {
                self.cache_ttl_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_PROBE_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.probe_timeout_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_LATENCY_CEILING_MS") {
            if let Ok(ms) = val.parse() {
                self.latency_ceiling_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("AI_RELIABILITY_MIN_QUALITY_SCORE") {
            if let Ok(score) = val.parse() {
                self.min_quality_score = score;
            }
        }

        self
    }

    /// Get cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Get per-probe timeout as Duration
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Cached probe result with its refresh instant
struct CachedHealth {
    result: HealthCheckResult,
    refreshed_at: Instant,
}

/// Outcome of a single sub-probe
struct ProbeOutcome {
    status: HealthStatus,
    message: Option<String>,
    detail: serde_json::Value,
}

impl ProbeOutcome {
    fn healthy(detail: serde_json::Value) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            detail,
        }
    }

    fn failed(status: HealthStatus, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            detail: json!({ "error": message.clone() }),
            message: Some(message),
        }
    }
}

/// Provider health prober
pub struct HealthProber {
    provider: Arc<dyn AiProvider>,
    config: HealthConfig,
    cached: RwLock<Option<CachedHealth>>,
}

impl HealthProber {
    /// Create a new health prober
    pub fn new(provider: Arc<dyn AiProvider>, config: HealthConfig) -> Self {
        Self {
            provider,
            config,
            cached: RwLock::new(None),
        }
    }

    /// Check provider health, serving from cache when the last result is
    /// younger than the TTL and `force` is false.
    pub async fn check_health(&self, force: bool) -> HealthCheckResult {
        if !force {
            let guard = self.cached.read().unwrap();
            if let Some(cached) = guard.as_ref() {
                if cached.refreshed_at.elapsed() < self.config.cache_ttl() {
                    METRICS.health_cache_hits.inc();
                    debug!("Health check served from cache: {:?}", cached.result.status);
                    return cached.result.clone();
                }
            }
        }

        let start = Instant::now();
        let result = self.run_probes().await;

        METRICS
            .health_check_duration
            .observe(start.elapsed().as_secs_f64());

        match result.status {
            HealthStatus::Healthy => info!("Provider health: healthy"),
            status => warn!(
                "Provider health: {} ({})",
                status.as_str(),
                result.error_message.as_deref().unwrap_or("no message")
            ),
        }

        let mut guard = self.cached.write().unwrap();
        *guard = Some(CachedHealth {
            result: result.clone(),
            refreshed_at: Instant::now(),
        });

        result
    }

    /// Status of the cached result, or `Unknown` before the first probe.
    /// Does not trigger probing.
    pub fn cached_status(&self) -> HealthStatus {
        self.cached
            .read()
            .unwrap()
            .as_ref()
            .map(|c| c.result.status)
            .unwrap_or(HealthStatus::Unknown)
    }

    async fn run_probes(&self) -> HealthCheckResult {
        let start = Instant::now();
        let mut details = IndexMap::new();
        let mut status = HealthStatus::Healthy;
        let mut error_message = None;

        // Ordered: connectivity, embedding, completion, response quality.
        // The first non-healthy outcome determines the aggregate.
        for name in ["connectivity", "embedding", "completion", "response_quality"] {
            let outcome = match name {
                "connectivity" => self.probe_connectivity().await,
                "embedding" => self.probe_embedding().await,
                "completion" => self.probe_completion().await,
                _ => self.probe_response_quality().await,
            };

            METRICS.record_health_probe(name, outcome.status.as_str());
            details.insert(name.to_string(), outcome.detail);

            if outcome.status != HealthStatus::Healthy {
                status = outcome.status;
                error_message = outcome.message;
                break;
            }
        }

        HealthCheckResult {
            status,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            error_message,
            details,
            observed_at: chrono::Utc::now(),
        }
    }

    /// Minimal completion round-trip; degrades when latency exceeds the ceiling
    async fn probe_connectivity(&self) -> ProbeOutcome {
        let start = Instant::now();
        let request = CompletionRequest {
            prompt: "ping",
            model: &self.config.completion_model,
            max_tokens: 8,
            temperature: 0.0,
        };

        match tokio::time::timeout(self.config.probe_timeout(), self.provider.completion(request))
            .await
        {
            Err(_) => ProbeOutcome::failed(HealthStatus::Unhealthy, "connectivity probe timed out"),
            Ok(Err(e)) => ProbeOutcome::failed(
                HealthStatus::Unhealthy,
                format!("connectivity probe failed: {}", e),
            ),
            Ok(Ok(_)) => {
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                if latency_ms > self.config.latency_ceiling_ms as f64 {
                    let message = format!(
                        "latency {:.0}ms above ceiling {}ms",
                        latency_ms, self.config.latency_ceiling_ms
                    );
                    ProbeOutcome {
                        status: HealthStatus::Degraded,
                        detail: json!({ "latency_ms": latency_ms, "error": message.clone() }),
                        message: Some(message),
                    }
                } else {
                    ProbeOutcome::healthy(json!({ "latency_ms": latency_ms }))
                }
            }
        }
    }

    /// Embedding of a fixed sample; empty or malformed vectors are unhealthy
    async fn probe_embedding(&self) -> ProbeOutcome {
        let texts = [PROBE_SAMPLE_TEXT.to_string()];

        match tokio::time::timeout(
            self.config.probe_timeout(),
            self.provider.embedding(&texts, &self.config.embedding_model),
        )
        .await
        {
            Err(_) => ProbeOutcome::failed(HealthStatus::Unhealthy, "embedding probe timed out"),
            Ok(Err(e)) => ProbeOutcome::failed(
                HealthStatus::Unhealthy,
                format!("embedding probe failed: {}", e),
            ),
            Ok(Ok(vectors)) => {
                if vectors.is_empty() || vectors.iter().any(|v| v.is_empty()) {
                    ProbeOutcome::failed(HealthStatus::Unhealthy, "empty embedding response")
                } else {
                    ProbeOutcome::healthy(json!({ "dimensions": vectors[0].len() }))
                }
            }
        }
    }

    /// Fixed-answer completion; a wrong or partial answer degrades
    async fn probe_completion(&self) -> ProbeOutcome {
        let prompt = format!(
            "Reply with exactly one word: {}",
            EXPECTED_COMPLETION_TOKEN
        );
        let request = CompletionRequest {
            prompt: &prompt,
            model: &self.config.completion_model,
            max_tokens: 8,
            temperature: 0.0,
        };

        match tokio::time::timeout(self.config.probe_timeout(), self.provider.completion(request))
            .await
        {
            Err(_) => ProbeOutcome::failed(HealthStatus::Unhealthy, "completion probe timed out"),
            Ok(Err(e)) => ProbeOutcome::failed(
                HealthStatus::Unhealthy,
                format!("completion probe failed: {}", e),
            ),
            Ok(Ok(output)) => {
                if output.text.contains(EXPECTED_COMPLETION_TOKEN) {
                    ProbeOutcome::healthy(json!({ "answer": output.text }))
                } else {
                    ProbeOutcome::failed(
                        HealthStatus::Degraded,
                        format!("unexpected completion answer: {:?}", output.text),
                    )
                }
            }
        }
    }

    /// Structured JSON analysis of a fixed sample; checks required fields
    /// and the reported quality score
    async fn probe_response_quality(&self) -> ProbeOutcome {
        let prompt = format!(
            "Analyze the following sentence. Respond with only a JSON object of the form \
             {{\"summary\": <string>, \"sentiment\": <string>, \"quality_score\": <number 0-1>}}.\n\
             Sentence: {}",
            PROBE_SAMPLE_TEXT
        );
        let request = CompletionRequest {
            prompt: &prompt,
            model: &self.config.completion_model,
            max_tokens: 200,
            temperature: 0.0,
        };

        let output = match tokio::time::timeout(
            self.config.probe_timeout(),
            self.provider.completion(request),
        )
        .await
        {
            Err(_) => {
                return ProbeOutcome::failed(
                    HealthStatus::Unhealthy,
                    "response-quality probe timed out",
                )
            }
            Ok(Err(e)) => {
                return ProbeOutcome::failed(
                    HealthStatus::Unhealthy,
                    format!("response-quality probe failed: {}", e),
                )
            }
            Ok(Ok(output)) => output,
        };

        let parsed = extract_json(&output.text)
            .and_then(|candidate| serde_json::from_str::<serde_json::Value>(candidate).ok());

        let analysis = match parsed {
            Some(value) => value,
            None => {
                return ProbeOutcome::failed(
                    HealthStatus::Unhealthy,
                    "unparseable analysis response",
                )
            }
        };

        let missing: Vec<&str> = ["summary", "sentiment", "quality_score"]
            .into_iter()
            .filter(|field| analysis.get(field).is_none())
            .collect();

        if !missing.is_empty() {
            return ProbeOutcome::failed(
                HealthStatus::Degraded,
                format!("analysis missing required fields: {:?}", missing),
            );
        }

        let quality_score = analysis
            .get("quality_score")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        if quality_score < self.config.min_quality_score {
            return ProbeOutcome::failed(
                HealthStatus::Degraded,
                format!(
                    "analysis quality score {:.2} below minimum {:.2}",
                    quality_score, self.config.min_quality_score
                ),
            );
        }

        ProbeOutcome::healthy(json!({ "quality_score": quality_score }))
    }
}

/// Extract the outermost JSON object from completion text
fn extract_json(raw: &str) -> Option<&str> {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&raw[start..=end]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CompletionOutput, ProviderError, ProviderResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const QUALITY_JSON: &str =
        r#"{"summary": "steady growth", "sentiment": "positive", "quality_score": 0.9}"#;

    /// Scripted provider: pops one canned reply per call, in order
    struct ScriptedProvider {
        completions: Mutex<VecDeque<Result<String, ProviderError>>>,
        embeddings: Mutex<VecDeque<Result<Vec<Vec<f32>>, ProviderError>>>,
        completion_calls: AtomicUsize,
        embedding_calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(
            completions: Vec<Result<String, ProviderError>>,
            embeddings: Vec<Result<Vec<Vec<f32>>, ProviderError>>,
        ) -> Self {
            Self {
                completions: Mutex::new(completions.into()),
                embeddings: Mutex::new(embeddings.into()),
                completion_calls: AtomicUsize::new(0),
                embedding_calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        /// One full healthy probe round
        fn healthy_round() -> Vec<Result<String, ProviderError>> {
            vec![
                Ok("ready".to_string()),
                Ok("PONG".to_string()),
                Ok(QUALITY_JSON.to_string()),
            ]
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.completion_calls.load(Ordering::SeqCst),
                self.embedding_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        async fn completion(
            &self,
            _request: CompletionRequest<'_>,
        ) -> ProviderResult<CompletionOutput> {
            self.completion_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.completions.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(CompletionOutput {
                    text,
                    tokens_used: Some(12),
                }),
                Some(Err(e)) => Err(e),
                None => Err(ProviderError::Network("script exhausted".to_string())),
            }
        }

        async fn embedding(
            &self,
            _texts: &[String],
            _model: &str,
        ) -> ProviderResult<Vec<Vec<f32>>> {
            self.embedding_calls.fetch_add(1, Ordering::SeqCst);
            match self.embeddings.lock().unwrap().pop_front() {
                Some(result) => result,
                None => Err(ProviderError::Network("script exhausted".to_string())),
            }
        }
    }

    fn prober_with(provider: ScriptedProvider, config: HealthConfig) -> (HealthProber, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        (
            HealthProber::new(provider.clone(), config),
            provider,
        )
    }

    #[tokio::test]
    async fn test_all_probes_pass() {
        let (prober, provider) = prober_with(
            ScriptedProvider::new(
                ScriptedProvider::healthy_round(),
                vec![Ok(vec![vec![0.1, 0.2, 0.3]])],
            ),
            HealthConfig::default(),
        );

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Healthy);
        assert!(result.error_message.is_none());
        assert_eq!(result.details.len(), 4);
        assert_eq!(provider.calls(), (3, 1));
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let (prober, provider) = prober_with(
            ScriptedProvider::new(
                ScriptedProvider::healthy_round(),
                vec![Ok(vec![vec![0.1, 0.2]])],
            ),
            HealthConfig::default(),
        );

        let first = prober.check_health(false).await;
        let second = prober.check_health(false).await;

        assert_eq!(first.status, second.status);
        assert_eq!(first.observed_at, second.observed_at);
        // No additional upstream probing happened
        assert_eq!(provider.calls(), (3, 1));
    }

    #[tokio::test]
    async fn test_force_bypasses_cache() {
        let mut completions = ScriptedProvider::healthy_round();
        completions.extend(ScriptedProvider::healthy_round());
        let (prober, provider) = prober_with(
            ScriptedProvider::new(
                completions,
                vec![Ok(vec![vec![0.1]]), Ok(vec![vec![0.2]])],
            ),
            HealthConfig::default(),
        );

        prober.check_health(false).await;
        prober.check_health(true).await;

        assert_eq!(provider.calls(), (6, 2));
    }

    #[tokio::test]
    async fn test_expired_ttl_reprobes() {
        let mut completions = ScriptedProvider::healthy_round();
        completions.extend(ScriptedProvider::healthy_round());
        let config = HealthConfig {
            cache_ttl_secs: 0,
            ..HealthConfig::default()
        };
        let (prober, provider) = prober_with(
            ScriptedProvider::new(
                completions,
                vec![Ok(vec![vec![0.1]]), Ok(vec![vec![0.2]])],
            ),
            config,
        );

        prober.check_health(false).await;
        prober.check_health(false).await;

        assert_eq!(provider.calls(), (6, 2));
    }

    #[tokio::test]
    async fn test_connectivity_error_short_circuits() {
        let (prober, provider) = prober_with(
            ScriptedProvider::new(
                vec![Err(ProviderError::Network("connection refused".to_string()))],
                vec![],
            ),
            HealthConfig::default(),
        );

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error_message.unwrap().contains("connectivity"));
        // Later probes never ran
        assert_eq!(provider.calls(), (1, 0));
        assert_eq!(result.details.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_embedding_is_unhealthy() {
        let (prober, provider) = prober_with(
            ScriptedProvider::new(vec![Ok("ready".to_string())], vec![Ok(vec![])]),
            HealthConfig::default(),
        );

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error_message.unwrap().contains("embedding"));
        assert_eq!(provider.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_wrong_completion_answer_degrades() {
        let (prober, _) = prober_with(
            ScriptedProvider::new(
                vec![Ok("ready".to_string()), Ok("PING".to_string())],
                vec![Ok(vec![vec![0.1]])],
            ),
            HealthConfig::default(),
        );

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Degraded);
        assert!(result.error_message.unwrap().contains("unexpected"));
    }

    #[tokio::test]
    async fn test_low_quality_analysis_degrades() {
        let low = r#"{"summary": "ok", "sentiment": "neutral", "quality_score": 0.2}"#;
        let (prober, _) = prober_with(
            ScriptedProvider::new(
                vec![
                    Ok("ready".to_string()),
                    Ok("PONG".to_string()),
                    Ok(low.to_string()),
                ],
                vec![Ok(vec![vec![0.1]])],
            ),
            HealthConfig::default(),
        );

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_missing_analysis_fields_degrade() {
        let partial = r#"{"summary": "ok"}"#;
        let (prober, _) = prober_with(
            ScriptedProvider::new(
                vec![
                    Ok("ready".to_string()),
                    Ok("PONG".to_string()),
                    Ok(partial.to_string()),
                ],
                vec![Ok(vec![vec![0.1]])],
            ),
            HealthConfig::default(),
        );

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Degraded);
        assert!(result.error_message.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_unparseable_analysis_is_unhealthy() {
        let (prober, _) = prober_with(
            ScriptedProvider::new(
                vec![
                    Ok("ready".to_string()),
                    Ok("PONG".to_string()),
                    Ok("the sentence seems fine".to_string()),
                ],
                vec![Ok(vec![vec![0.1]])],
            ),
            HealthConfig::default(),
        );

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_probe_timeout_is_unhealthy() {
        let mut provider = ScriptedProvider::new(
            ScriptedProvider::healthy_round(),
            vec![Ok(vec![vec![0.1]])],
        );
        provider.delay = Some(Duration::from_millis(100));

        let config = HealthConfig {
            probe_timeout_ms: 20,
            ..HealthConfig::default()
        };
        let (prober, _) = prober_with(provider, config);

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Unhealthy);
        assert!(result.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_latency_ceiling_degrades() {
        let mut provider = ScriptedProvider::new(
            ScriptedProvider::healthy_round(),
            vec![Ok(vec![vec![0.1]])],
        );
        provider.delay = Some(Duration::from_millis(5));

        let config = HealthConfig {
            latency_ceiling_ms: 0,
            ..HealthConfig::default()
        };
        let (prober, _) = prober_with(provider, config);

        let result = prober.check_health(false).await;

        assert_eq!(result.status, HealthStatus::Degraded);
        assert!(result.error_message.unwrap().contains("latency"));
    }

    #[tokio::test]
    async fn test_cached_status_unknown_before_first_probe() {
        let (prober, _) = prober_with(
            ScriptedProvider::new(vec![], vec![]),
            HealthConfig::default(),
        );
        assert_eq!(prober.cached_status(), HealthStatus::Unknown);
    }
}
