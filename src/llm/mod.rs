// Model runtime seams
// The HTTP handlers depend on these traits rather than on a concrete client,
// so tests can substitute deterministic fakes

pub mod ollama;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::Result;

pub use ollama::OllamaClient;

/// Produces fixed-dimension embedding vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Produces a streamed completion for a prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identifier of the generation model, reported by the health endpoint.
    fn model_id(&self) -> &str;

    /// Submit a prompt and return a lazy, finite stream of response
    /// fragments. The stream is not restartable.
    async fn generate(&self, prompt: &str) -> Result<BoxStream<'static, Result<String>>>;
}
