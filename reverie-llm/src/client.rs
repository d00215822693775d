//! LLM Client: one HTTP adapter for Ollama and OpenAI-compatible backends.
//!
//! Implements both [`TextGenerationService`] and [`EmbeddingService`], and is
//! where per-request timeouts and bounded retries live.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::service::{EmbeddingService, TextGenerationService};
use crate::types::{LlmRequest, LlmResponse};

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama { base_url: String },
    /// OpenAI-compatible API (also works with Together, vLLM, llama.cpp server).
    OpenAiCompatible { base_url: String, api_key: String },
    /// No backend: every call fails with [`LlmError::Unavailable`].
    None,
}

/// The main LLM client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    chat_model: String,
    embedding_model: String,
    max_retries: u32,
    temperature: f32,
    max_tokens: u32,
    timeout_ms: u64,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(
        provider: LlmProvider,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            http: Client::new(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            max_retries,
            temperature: 0.7,
            max_tokens: 512,
            timeout_ms: 30_000,
        }
    }

    /// Create a client with no backend.
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), String::new(), 0)
    }

    /// Override the sampling defaults used by [`TextGenerationService::complete`].
    #[must_use]
    pub fn with_defaults(mut self, temperature: f32, max_tokens: u32, timeout_ms: u64) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self.timeout_ms = timeout_ms;
        self
    }

    /// Check if the client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Generate a completion.
    ///
    /// # Errors
    ///
    /// Returns `Err` if no backend is configured or all retries fail.
    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => {
                let url = format!("{base_url}/api/generate");
                let prompt = match &request.system {
                    Some(system) => format!("{system}\n\n{}", request.prompt),
                    None => request.prompt.clone(),
                };
                let body = json!({
                    "model": self.chat_model,
                    "prompt": prompt,
                    "stream": false,
                    "options": {
                        "temperature": request.temperature,
                        "num_predict": request.max_tokens,
                    }
                });
                let (json, latency_ms) = self.post_json(&url, &body, None, request.timeout_ms).await?;
                Ok(LlmResponse {
                    text: json["response"].as_str().unwrap_or_default().to_string(),
                    tokens_generated: json["eval_count"].as_u64().unwrap_or(0) as u32,
                    latency_ms,
                    model: self.chat_model.clone(),
                })
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/chat/completions");
                let mut messages = Vec::with_capacity(2);
                if let Some(system) = &request.system {
                    messages.push(json!({ "role": "system", "content": system }));
                }
                messages.push(json!({ "role": "user", "content": request.prompt }));
                let body = json!({
                    "model": self.chat_model,
                    "messages": messages,
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                let (json, latency_ms) = self
                    .post_json(&url, &body, Some(api_key), request.timeout_ms)
                    .await?;
                Ok(LlmResponse {
                    text: json["choices"][0]["message"]["content"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    tokens_generated: json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
                    latency_ms,
                    model: self.chat_model.clone(),
                })
            }
        }
    }

    /// Embed a text with the configured embedding model.
    ///
    /// # Errors
    ///
    /// Returns `Err` if no backend is configured, all retries fail, or the
    /// backend's answer holds no vector.
    pub async fn embedding(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let json = match &self.provider {
            LlmProvider::None => {
                return Err(LlmError::Unavailable("No LLM provider configured".into()));
            }
            LlmProvider::Ollama { base_url } => {
                let url = format!("{base_url}/api/embeddings");
                let body = json!({ "model": self.embedding_model, "prompt": text });
                self.post_json(&url, &body, None, self.timeout_ms).await?.0
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/embeddings");
                let body = json!({ "model": self.embedding_model, "input": text });
                self.post_json(&url, &body, Some(api_key), self.timeout_ms).await?.0
            }
        };

        let raw = json
            .get("embedding")
            .or_else(|| json.pointer("/data/0/embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::ParseError("response holds no embedding vector".into()))?;

        Ok(raw.iter().filter_map(Value::as_f64).map(|v| v as f32).collect())
    }

    /// POST a JSON body, retrying up to `max_retries` extra times.
    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        api_key: Option<&str>,
        timeout_ms: u64,
    ) -> Result<(Value, u64), LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(url, "Retrying LLM call (attempt {}/{})", attempt + 1, self.max_retries + 1);
            }

            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = api_key {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }

            let start = Instant::now();
            match builder.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let json: Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    let latency_ms = start.elapsed().as_millis() as u64;
                    return Ok((json, latency_ms));
                }
                Ok(resp) => {
                    last_error = format!("HTTP {}: {}", resp.status(), resp.text().await.unwrap_or_default());
                    warn!(url, "LLM backend returned error: {}", last_error);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!(url, "LLM request timed out after {}ms", timeout_ms);
                    } else {
                        warn!(url, "LLM request failed: {}", last_error);
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

#[async_trait]
impl TextGenerationService for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = LlmRequest::new(prompt).with_defaults_from(self);
        Ok(self.generate(&request).await?.text)
    }
}

#[async_trait]
impl EmbeddingService for LlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embedding(text).await
    }
}

impl LlmRequest {
    fn with_defaults_from(self, client: &LlmClient) -> Self {
        self.with_temperature(client.temperature)
            .with_max_tokens(client.max_tokens)
            .with_timeout(client.timeout_ms)
    }
}
