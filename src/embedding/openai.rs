use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::core::config::RetrievalConfig;
use crate::core::errors::ProviderError;

use super::provider::EmbeddingProvider;

/// Client for the OpenAI `/v1/embeddings` endpoint.
///
/// Anything speaking the same wire format works, so the base URL is
/// configurable rather than fixed to api.openai.com.
#[derive(Clone)]
pub struct OpenAiEmbeddings {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl OpenAiEmbeddings {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            client: Client::new(),
        }
    }

    pub fn from_config(config: &RetrievalConfig, api_key: Option<String>) -> Self {
        Self::new(&config.provider_base_url, api_key, config.request_timeout())
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        _ => ProviderError::Api {
            status: status.as_u16(),
            message: body.chars().take(300).collect(),
        },
    }
}

/// The API may return items out of order; `index` is authoritative.
fn vectors_in_input_order(
    mut items: Vec<EmbeddingItem>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    if items.len() != expected {
        return Err(ProviderError::malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            items.len()
        )));
    }
    items.sort_by_key(|item| item.index);
    // After the sort the indices must read exactly 0..expected; a duplicate
    // or gap would pair vectors with the wrong texts.
    if let Some((position, item)) = items.iter().enumerate().find(|(i, item)| item.index != *i) {
        return Err(ProviderError::malformed(format!(
            "embedding index {} at position {}, expected indices 0..{}",
            item.index, position, expected
        )));
    }
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(
        &self,
        inputs: &[String],
        model_id: &str,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ProviderError::MissingCredential);
        };

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::network)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let payload: EmbeddingsResponse = res.json().await.map_err(ProviderError::malformed)?;
        vectors_in_input_order(payload.data, inputs.len())
    }
}
