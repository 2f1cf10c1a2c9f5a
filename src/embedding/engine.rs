use std::sync::Arc;
use std::time::Duration;

use crate::core::config::RetrievalConfig;
use crate::core::errors::ProviderError;

use super::provider::EmbeddingProvider;

/// Chunking knobs for bulk embedding.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum texts per provider call.
    pub batch_size: usize,
    /// Pause between consecutive calls, to respect provider rate limits.
    pub batch_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_delay: Duration::from_millis(200),
        }
    }
}

impl BatchOptions {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            batch_delay: config.batch_delay(),
        }
    }
}

/// Turns rule text into vectors via the configured provider.
///
/// One model identifier per engine; callers wanting a different model build
/// a second engine.
pub struct EmbeddingEngine {
    provider: Arc<dyn EmbeddingProvider>,
    model: String,
    options: BatchOptions,
}

impl EmbeddingEngine {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        model: impl Into<String>,
        options: BatchOptions,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            options,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Embed one text unit. No retry here; recovery is the caller's call.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let inputs = [text.to_string()];
        let mut vectors = self.provider.embed(&inputs, &self.model).await?;
        if vectors.len() != 1 {
            return Err(ProviderError::malformed(format!(
                "expected 1 embedding, got {}",
                vectors.len()
            )));
        }
        vectors
            .pop()
            .ok_or_else(|| ProviderError::malformed("provider returned no embedding"))
    }

    /// Embed many texts, preserving input order.
    ///
    /// Issues one provider call per chunk of `batch_size`, sleeping
    /// `batch_delay` between calls. Fails atomically: the first chunk error
    /// aborts the whole batch, so callers never see a partial list.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_size = self.options.batch_size.max(1);
        let chunk_count = texts.len().div_ceil(chunk_size);
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        let mut dimension: Option<usize> = None;

        for (chunk_index, chunk) in texts.chunks(chunk_size).enumerate() {
            if chunk_index > 0 && !self.options.batch_delay.is_zero() {
                tokio::time::sleep(self.options.batch_delay).await;
            }

            tracing::debug!(
                "Embedding chunk {}/{} ({} texts) via {}",
                chunk_index + 1,
                chunk_count,
                chunk.len(),
                self.provider.name()
            );

            let produced = self.provider.embed(chunk, &self.model).await?;
            if produced.len() != chunk.len() {
                return Err(ProviderError::malformed(format!(
                    "chunk {}/{} returned {} embeddings for {} inputs",
                    chunk_index + 1,
                    chunk_count,
                    produced.len(),
                    chunk.len()
                )));
            }

            for vector in produced {
                match dimension {
                    None => dimension = Some(vector.len()),
                    Some(d) if d != vector.len() => {
                        return Err(ProviderError::malformed(format!(
                            "mixed embedding dimensions {} and {}",
                            d,
                            vector.len()
                        )));
                    }
                    Some(_) => {}
                }
                vectors.push(vector);
            }
        }

        Ok(vectors)
    }
}
