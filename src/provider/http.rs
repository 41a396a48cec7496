//! HTTP client implementation of the AI provider boundary

use super::{
    AiProvider, CompletionOutput, CompletionRequest, ProviderConfig, ProviderError, ProviderResult,
};
use crate::metrics::METRICS;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Reqwest-backed AI provider client
pub struct HttpAiProvider {
    http: Client,
    config: ProviderConfig,
    api_key: Option<SecretString>,
}

impl HttpAiProvider {
    /// Create a new provider client
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let api_key = config.api_key.clone().map(SecretString::new);

        Ok(Self { http, config, api_key })
    }

    /// Map an HTTP error status to the matching provider error
    fn status_error(status: StatusCode, body: String) -> ProviderError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth(body),
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(body),
            _ => ProviderError::Upstream {
                status: status.as_u16(),
                message: body,
            },
        }
    }

    /// Map a reqwest transport error
    fn transport_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> ProviderResult<R> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        let mut req = self.http.post(&url).json(body);

        if let Some(api_key) = &self.api_key {
            req = req.bearer_auth(api_key.expose_secret());
        }

        let response = req.send().await.map_err(Self::transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Provider request to {} failed with status {}", endpoint, status);
            return Err(Self::status_error(status, error_text));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    async fn completion(&self, request: CompletionRequest<'_>) -> ProviderResult<CompletionOutput> {
        let start = Instant::now();

        debug!(
            "Calling completion API: model={}, max_tokens={}",
            request.model, request.max_tokens
        );

        let body = CompletionWireRequest {
            model: request.model,
            prompt: request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let result: ProviderResult<CompletionWireResponse> =
            self.post_json("/v1/completions", &body).await;

        match result {
            Ok(wire) => {
                METRICS.record_provider_request("completion", true);
                METRICS
                    .provider_request_duration
                    .with_label_values(&["completion"])
                    .observe(start.elapsed().as_secs_f64());
                Ok(CompletionOutput {
                    text: wire.text,
                    tokens_used: wire.tokens_used,
                })
            }
            Err(e) => {
                METRICS.record_provider_request("completion", false);
                Err(e)
            }
        }
    }

    async fn embedding(&self, texts: &[String], model: &str) -> ProviderResult<Vec<Vec<f32>>> {
        let start = Instant::now();

        debug!("Calling embedding API: model={}, inputs={}", model, texts.len());

        let body = EmbeddingWireRequest { model, input: texts };

        let result: ProviderResult<EmbeddingWireResponse> =
            self.post_json("/v1/embeddings", &body).await;

        match result {
            Ok(wire) => {
                if wire.embeddings.len() != texts.len() {
                    METRICS.record_provider_request("embedding", false);
                    return Err(ProviderError::InvalidResponse(format!(
                        "expected {} embeddings, got {}",
                        texts.len(),
                        wire.embeddings.len()
                    )));
                }
                METRICS.record_provider_request("embedding", true);
                METRICS
                    .provider_request_duration
                    .with_label_values(&["embedding"])
                    .observe(start.elapsed().as_secs_f64());
                Ok(wire.embeddings)
            }
            Err(e) => {
                METRICS.record_provider_request("embedding", false);
                Err(e)
            }
        }
    }
}

// Wire types for the upstream API
#[derive(Debug, Serialize)]
struct CompletionWireRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionWireResponse {
    text: String,
    #[serde(default)]
    tokens_used: Option<u64>,
}

#[derive(Debug, Serialize)]
struct EmbeddingWireRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingWireResponse {
    embeddings: Vec<Vec<f32>>,
}
