//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    Counter, CounterVec, Histogram, HistogramVec, Opts, Registry,
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_vec_with_registry, register_histogram_with_registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Validation pipeline metrics
    pub validation_outcomes: CounterVec,
    pub validation_stage_failures: CounterVec,

    // Health prober metrics
    pub health_probes: CounterVec,
    pub health_cache_hits: Counter,
    pub health_check_duration: Histogram,

    // Session tracker metrics
    pub sessions_started: Counter,
    pub sessions_completed: Counter,
    pub ai_calls: CounterVec,
    pub ai_call_tokens: Histogram,

    // Confidence calculator metrics
    pub confidence_scores: Histogram,

    // Provider client metrics
    pub provider_requests: CounterVec,
    pub provider_request_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        // Validation pipeline metrics
        let validation_outcomes = register_counter_vec_with_registry!(
            Opts::new("validation_outcomes_total", "Total validation outcomes"),
            &["result"],
            registry
        )?;

        let validation_stage_failures = register_counter_vec_with_registry!(
            Opts::new("validation_stage_failures_total", "Validation failures by stage"),
            &["stage"],
            registry
        )?;

        // Health prober metrics
        let health_probes = register_counter_vec_with_registry!(
            Opts::new("health_probes_total", "Health sub-probe results"),
            &["probe", "status"],
            registry
        )?;

        let health_cache_hits = register_counter_with_registry!(
            Opts::new("health_cache_hits_total", "Health checks served from cache"),
            registry
        )?;

        let health_check_duration = register_histogram_with_registry!(
            "health_check_duration_seconds",
            "Full health probe sequence duration in seconds",
            registry
        )?;

        // Session tracker metrics
        let sessions_started = register_counter_with_registry!(
            Opts::new("sessions_started_total", "Total processing sessions started"),
            registry
        )?;

        let sessions_completed = register_counter_with_registry!(
            Opts::new("sessions_completed_total", "Total processing sessions completed"),
            registry
        )?;

        let ai_calls = register_counter_vec_with_registry!(
            Opts::new("ai_calls_total", "AI calls recorded against sessions"),
            &["kind", "status"],
            registry
        )?;

        let ai_call_tokens = register_histogram_with_registry!(
            "ai_call_tokens",
            "Tokens used per recorded AI call",
            registry
        )?;

        // Confidence calculator metrics
        let confidence_scores = register_histogram_with_registry!(
            "confidence_scores",
            "Overall confidence scores produced",
            registry
        )?;

        // Provider client metrics
        let provider_requests = register_counter_vec_with_registry!(
            Opts::new("provider_requests_total", "Provider HTTP requests"),
            &["endpoint", "status"],
            registry
        )?;

        let provider_request_duration = register_histogram_vec_with_registry!(
            "provider_request_duration_seconds",
            "Provider HTTP request duration in seconds",
            &["endpoint"],
            registry
        )?;

        Ok(Self {
            registry,
            validation_outcomes,
            validation_stage_failures,
            health_probes,
            health_cache_hits,
            health_check_duration,
            sessions_started,
            sessions_completed,
            ai_calls,
            ai_call_tokens,
            confidence_scores,
            provider_requests,
            provider_request_duration,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a validation outcome
    pub fn record_validation(&self, passed: bool) {
        let result = if passed { "passed" } else { "rejected" };
        self.validation_outcomes.with_label_values(&[result]).inc();
    }

    /// Record a validation stage failure
    pub fn record_stage_failure(&self, stage: &str) {
        self.validation_stage_failures.with_label_values(&[stage]).inc();
    }

    /// Record a health sub-probe result
    pub fn record_health_probe(&self, probe: &str, status: &str) {
        self.health_probes.with_label_values(&[probe, status]).inc();
    }

    /// Record an AI call result
    pub fn record_ai_call(&self, kind: &str, succeeded: bool, tokens: Option<u64>) {
        let status = if succeeded { "success" } else { "error" };
        self.ai_calls.with_label_values(&[kind, status]).inc();
        if let Some(tokens) = tokens {
            self.ai_call_tokens.observe(tokens as f64);
        }
    }

    /// Record a provider HTTP request
    pub fn record_provider_request(&self, endpoint: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.provider_requests.with_label_values(&[endpoint, status]).inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}
