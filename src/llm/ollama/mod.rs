
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::llm::{Embedder, Generator};
use crate::{RagError, Result};

const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_EMBED_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_BATCH_SIZE: usize = 16;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// HTTP client for the Ollama runtime, covering both the embedding and the
/// generation API.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    generation_model: String,
    embedding_model: String,
    batch_size: usize,
    retry_attempts: u32,
    embed_timeout: Duration,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// One NDJSON line of a streamed generation response.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| RagError::Model(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.ollama_url.clone(),
            generation_model: config.generation_model.clone(),
            embedding_model: config.embedding_model.clone(),
            batch_size: DEFAULT_BATCH_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            embed_timeout: Duration::from_secs(DEFAULT_EMBED_TIMEOUT_SECONDS),
            http,
        })
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Request embeddings for one batch, retrying transient failures with
    /// exponential backoff. Client errors fail immediately.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("/api/embed")
            .map_err(|e| RagError::Model(format!("Failed to build embedding URL: {e}")))?;

        let request = EmbedRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };

        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "Embedding request attempt {}/{} ({} texts)",
                attempt,
                self.retry_attempts,
                texts.len()
            );

            match self
                .http
                .post(url.clone())
                .json(&request)
                .timeout(self.embed_timeout)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbedResponse = response.json().await.map_err(|e| {
                        RagError::Model(format!("Failed to parse embedding response: {e}"))
                    })?;

                    if parsed.embeddings.len() != texts.len() {
                        return Err(RagError::Model(format!(
                            "Mismatch between request and response counts: {} vs {}",
                            texts.len(),
                            parsed.embeddings.len()
                        )));
                    }

                    return Ok(parsed.embeddings);
                }
                Ok(response) => {
                    let status = response.status();
                    let detail = parse_error_body(response).await;

                    if !status.is_server_error() {
                        return Err(RagError::Model(format!(
                            "Embedding request rejected with {status}: {detail}"
                        )));
                    }

                    warn!(
                        "Embedding server error (status {}), attempt {}/{}",
                        status, attempt, self.retry_attempts
                    );
                    last_error = Some(RagError::Model(format!(
                        "Embedding request failed with {status}: {detail}"
                    )));
                }
                Err(error) => {
                    warn!(
                        "Embedding transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(RagError::Model(format!(
                        "Embedding request failed: {error}"
                    )));
                }
            }

            if attempt < self.retry_attempts {
                let delay = Duration::from_millis(EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000);
                debug!("Waiting {:?} before retry", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| RagError::Model("Embedding request failed after retries".into())))
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }

        debug!("Generated {} embeddings total", vectors.len());
        Ok(vectors)
    }
}

#[async_trait]
impl Generator for OllamaClient {
    fn model_id(&self) -> &str {
        &self.generation_model
    }

    async fn generate(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>> {
        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| RagError::Model(format!("Failed to build generation URL: {e}")))?;

        let request = GenerateRequest {
            model: self.generation_model.clone(),
            prompt: prompt.to_string(),
            stream: true,
        };

        debug!(
            "Submitting generation request ({} prompt characters)",
            prompt.chars().count()
        );

        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Model(format!("Generation request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = parse_error_body(response).await;
            return Err(RagError::Model(format!(
                "Generation request rejected with {status}: {detail}"
            )));
        }

        Ok(fragment_stream(response.bytes_stream().boxed()).boxed())
    }
}

async fn parse_error_body(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body)
}

struct FragmentState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    buffer: String,
    pending: VecDeque<String>,
    done: bool,
}

/// Decode a streamed NDJSON generation response into text fragments as the
/// bytes arrive, without buffering the full response.
fn fragment_stream(
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
) -> impl Stream<Item = Result<String>> + Send {
    let state = FragmentState {
        bytes,
        buffer: String::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Ok(Some((fragment, state)));
            }
            if state.done {
                return Ok(None);
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.push_str(&String::from_utf8_lossy(&chunk));
                    drain_complete_lines(&mut state)?;
                }
                Some(Err(error)) => {
                    return Err(RagError::Model(format!(
                        "Generation stream failed: {error}"
                    )));
                }
                None => {
                    let trailing = std::mem::take(&mut state.buffer);
                    if !trailing.trim().is_empty() {
                        decode_line(&trailing, &mut state)?;
                    }
                    state.done = true;
                }
            }
        }
    })
}

fn drain_complete_lines(state: &mut FragmentState) -> Result<()> {
    while let Some(newline_at) = state.buffer.find('\n') {
        let line: String = state.buffer.drain(..=newline_at).collect();
        decode_line(&line, state)?;
    }
    Ok(())
}

fn decode_line(line: &str, state: &mut FragmentState) -> Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let chunk: GenerateChunk = serde_json::from_str(line)
        .map_err(|e| RagError::Model(format!("Failed to parse generation chunk: {e}")))?;

    if !chunk.response.is_empty() {
        state.pending.push_back(chunk.response);
    }
    if chunk.done {
        state.done = true;
    }
    Ok(())
}
