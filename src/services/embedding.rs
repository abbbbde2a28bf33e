//! Embedding client for generating text embeddings.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbeddingError;
use crate::models::{EmbeddingConfig, EmbeddingProtocol};
use crate::utils::retry::{RetryConfig, with_retry};

/// Instruction type for embedding generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionType {
    /// For indexing documents
    Document,
    /// For search queries
    Query,
}

/// Converts texts into fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(
        &self,
        texts: Vec<String>,
        instruction_type: InstructionType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn health_check(&self) -> Result<bool, EmbeddingError>;

    fn dimension(&self) -> usize;
}

/// Request body for the TEI `/embed` endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
    instruction_type: InstructionType,
}

/// Response from the TEI `/embed` endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse(Vec<Vec<f32>>);

/// Request body for the OpenAI-compatible `/v1/embeddings` endpoint.
#[derive(Debug, Serialize)]
struct OpenAiEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

/// HTTP client for an external embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    protocol: EmbeddingProtocol,
    model: Option<String>,
    api_key: Option<String>,
    batch_size: usize,
    dimension: usize,
    max_input_chars: usize,
    retry: RetryConfig,
}

impl EmbeddingClient {
    /// Create a new embedding client with the given configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.protocol == EmbeddingProtocol::OpenAi && config.model.is_none() {
            return Err(EmbeddingError::ConnectionError(
                "the openai protocol requires an embedding model".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EmbeddingError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            protocol: config.protocol,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            batch_size: (config.batch_size as usize).max(1),
            dimension: config.dimension as usize,
            max_input_chars: config.max_input_chars,
            retry: RetryConfig::new(config.max_retries.max(1)),
        })
    }

    /// Create a client with default configuration.
    pub fn with_defaults() -> Result<Self, EmbeddingError> {
        Self::new(&EmbeddingConfig::default())
    }

    /// Get the base URL of the embedding provider.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn check_input_lengths(&self, texts: &[String]) -> Result<(), EmbeddingError> {
        for (index, text) in texts.iter().enumerate() {
            let len = text.chars().count();
            if len > self.max_input_chars {
                return Err(EmbeddingError::InputTooLong {
                    index,
                    len,
                    limit: self.max_input_chars,
                });
            }
        }
        Ok(())
    }

    /// Embed one provider-sized batch, retrying transient failures.
    async fn embed_single_batch(
        &self,
        texts: &[String],
        instruction_type: InstructionType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let embeddings = with_retry(&self.retry, || async {
            match self.protocol {
                EmbeddingProtocol::Tei => self.request_tei(texts, instruction_type).await,
                EmbeddingProtocol::OpenAi => self.request_openai(texts).await,
            }
        })
        .await
        .into_result()?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected dimension {}, got {}",
                self.dimension,
                bad.len()
            )));
        }

        Ok(embeddings)
    }

    async fn request_tei(
        &self,
        texts: &[String],
        instruction_type: InstructionType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest {
            inputs: texts,
            truncate: false,
            instruction_type,
        };

        let response = self.send(self.client.post(&url).json(&request)).await?;
        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        Ok(embed_response.0)
    }

    async fn request_openai(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let model = self.model.as_deref().unwrap_or_default();
        let request = OpenAiEmbedRequest { model, input: texts };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = self.send(builder).await?;
        let mut body: OpenAiEmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        // The API does not promise response order
        body.data.sort_by_key(|d| d.index);
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, EmbeddingError> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout
            } else if e.is_connect() {
                EmbeddingError::ConnectionError(e.to_string())
            } else {
                EmbeddingError::RequestError(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(
        &self,
        texts: Vec<String>,
        instruction_type: InstructionType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.check_input_lengths(&texts)?;

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.embed_single_batch(batch, instruction_type).await?;
            all_embeddings.extend(embeddings);
        }

        tracing::debug!(count = all_embeddings.len(), "generated embeddings");
        Ok(all_embeddings)
    }

    /// Check if the embedding provider is reachable.
    async fn health_check(&self) -> Result<bool, EmbeddingError> {
        let url = match self.protocol {
            EmbeddingProtocol::Tei => format!("{}/health", self.base_url),
            EmbeddingProtocol::OpenAi => format!("{}/v1/models", self.base_url),
        };

        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        self.send(builder).await.map(|_| true)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
