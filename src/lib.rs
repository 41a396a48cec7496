//! Reliability pipeline for calls to an external AI text/embedding service
//!
//! Operations either produce a genuinely AI-derived result with a
//! quantified confidence, or they fail loudly with a machine-readable
//! reason. There is deliberately no fallback or mock-data path: when the
//! provider is unavailable or a quality gate fails, the operation fails
//! outright rather than returning a degraded substitute.
//!
//! The pipeline for one logical operation:
//!
//! 1. [`validation::ValidationPipeline`] judges the input (fail fast)
//! 2. [`health::HealthProber`] judges the provider (fail fast, TTL-cached)
//! 3. The caller invokes the provider, reporting each attempt to the
//!    [`session::SessionTracker`]
//! 4. [`confidence::ConfidenceCalculator`] combines validation quality,
//!    session statistics, and output checks into the final verdict

pub mod config;
pub mod confidence;
pub mod error;
pub mod health;
pub mod metrics;
pub mod provider;
pub mod session;
pub mod validation;

pub use config::ReliabilityConfig;
pub use confidence::{
    ConfidenceBreakdown, ConfidenceCalculator, ConfidenceFactors, ConfidenceLevel,
};
pub use error::{ReliabilityError, Result};
pub use health::{HealthCheckResult, HealthProber, HealthStatus};
pub use provider::{AiProvider, HttpAiProvider, ProviderError};
pub use session::{AccountingError, CallKind, QualityTag, SessionSummary, SessionTracker};
pub use validation::{FailureReason, ValidationOutcome, ValidationPipeline};

use std::sync::Arc;

/// All four collaborators wired from one configuration.
///
/// Convenience for callers that want the whole pipeline; each component
/// can also be constructed on its own.
pub struct ReliabilityCore {
    validation: ValidationPipeline,
    health: HealthProber,
    sessions: SessionTracker,
    confidence: ConfidenceCalculator,
}

impl ReliabilityCore {
    /// Wire the pipeline around the given provider
    pub fn new(config: ReliabilityConfig, provider: Arc<dyn AiProvider>) -> Self {
        Self {
            validation: ValidationPipeline::new(provider.clone(), config.validation),
            health: HealthProber::new(provider, config.health),
            sessions: SessionTracker::new(config.session),
            confidence: ConfidenceCalculator::default(),
        }
    }

    /// Wire the pipeline with the bundled HTTP provider
    pub fn from_config(config: ReliabilityConfig) -> Result<Self> {
        let provider = Arc::new(HttpAiProvider::new(config.provider.clone())?);
        Ok(Self::new(config, provider))
    }

    pub fn validation(&self) -> &ValidationPipeline {
        &self.validation
    }

    pub fn health(&self) -> &HealthProber {
        &self.health
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn confidence(&self) -> &ConfidenceCalculator {
        &self.confidence
    }
}
