//! Aggregate configuration for the reliability pipeline

use crate::error::Result;
use crate::health::HealthConfig;
use crate::provider::ProviderConfig;
use crate::session::SessionConfig;
use crate::validation::ValidationConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Top-level configuration, one section per component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl ReliabilityConfig {
    /// Apply environment-variable overrides to every section
    pub fn from_env(mut self) -> Self {
        self.validation = self.validation.from_env();
        self.health = self.health.from_env();
        self.session = self.session.from_env();
        self.provider = self.provider.from_env();
        self
    }

    /// Load configuration layering defaults, an optional file, and the
    /// environment (AI_RELIABILITY__ prefixed, `__`-separated sections).
    pub fn load(path: Option<&str>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("AI_RELIABILITY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        debug!("Configuration loaded (file: {:?})", path);

        Ok(loaded.from_env())
    }
}
