//! Remote embedding provider for OpenAI-compatible `/embeddings` endpoints.
//!
//! This module is only available when the `remote` feature is enabled. It works
//! against OpenAI, OpenRouter, and self-hosted servers that implement the same
//! request/response shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

const PROVIDER: &str = "Remote";

/// Default base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// An [`EmbeddingProvider`] calling `<base_url>/embeddings` over HTTP.
///
/// # Example
///
/// ```rust,ignore
/// use derma_rag::remote::RemoteEmbeddingProvider;
///
/// let provider = RemoteEmbeddingProvider::from_env()?
///     .with_base_url("https://openrouter.ai/api/v1")
///     .with_model("openai/text-embedding-3-small", 1536);
/// ```
pub struct RemoteEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl RemoteEmbeddingProvider {
    /// Create a provider for the default endpoint and model.
    ///
    /// `api_key` may be `None` for self-hosted servers without auth.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: DEFAULT_MODEL.to_string(),
            dimensions: 1536,
        }
    }

    /// Create a provider from `EMBEDDING_API_KEY` and, if set, `EMBEDDING_BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if `EMBEDDING_API_KEY` is not set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("EMBEDDING_API_KEY").map_err(|_| RagError::EmbeddingError {
            provider: PROVIDER.into(),
            message: "EMBEDDING_API_KEY environment variable not set".into(),
        })?;
        let provider = Self::new(Some(api_key));
        Ok(match std::env::var("EMBEDDING_BASE_URL") {
            Ok(url) if !url.is_empty() => provider.with_base_url(url),
            _ => provider,
        })
    }

    /// Point the provider at another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use another model, declaring the dimensionality it returns.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    fn failure(message: impl Into<String>) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Self::failure("server returned no embeddings"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest { model: &self.model, input: texts });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            Self::failure(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(provider = PROVIDER, %status, "embedding API error");
            return Err(Self::failure(format!("API returned {status}: {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("failed to parse response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(Self::failure(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|item| item.index);
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}
