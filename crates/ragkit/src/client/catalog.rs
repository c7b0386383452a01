use super::{ChatMessage, ChatRequest, ClientError, ListResponse, ModelInfo, ProviderInfo, StackClient};
use crate::services::models::ModelCatalog;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl StackClient {
    /// List catalog models. Entries that fail schema validation are skipped.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, ClientError> {
        let response: ListResponse<serde_json::Value> = self.get_json("models").await?;
        let models = response
            .data
            .into_iter()
            .filter_map(|entry| match ModelInfo::from_value(entry) {
                Ok(model) => Some(model),
                Err(reason) => {
                    tracing::warn!("Skipping malformed model entry: {}", reason);
                    None
                },
            })
            .collect();
        Ok(models)
    }

    /// List registered providers
    pub async fn list_providers(&self) -> Result<Vec<ProviderInfo>, ClientError> {
        let response: ListResponse<ProviderInfo> = self.get_json("providers").await?;
        Ok(response.data)
    }

    /// Embed one or more inputs with the given model
    pub async fn embed(&self, model: &str, input: &[&str]) -> Result<Vec<Vec<f32>>, ClientError> {
        let request = EmbeddingRequest {
            model,
            input: input.to_vec(),
        };
        let response: EmbeddingResponse = self.post_json("embeddings", &request).await?;
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait::async_trait]
impl ModelCatalog for StackClient {
    async fn models(&self) -> Result<Vec<ModelInfo>> {
        self.list_models().await.context("Failed to list models")
    }

    async fn providers(&self) -> Result<Vec<ProviderInfo>> {
        self.list_providers()
            .await
            .context("Failed to list providers")
    }

    async fn can_chat(&self, model: &str) -> bool {
        let probe = ChatRequest::new(model, vec![ChatMessage::user("ping")]).with_max_tokens(1);
        match self.chat_completion(&probe).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(model, "Chat probe failed: {}", e);
                false
            },
        }
    }

    async fn embedding_dimension(&self, model: &str) -> Result<usize> {
        let embeddings = self
            .embed(model, &["dimension probe"])
            .await
            .with_context(|| format!("Failed to embed probe text with {}", model))?;
        embeddings
            .into_iter()
            .next()
            .map(|e| e.len())
            .filter(|len| *len > 0)
            .ok_or_else(|| anyhow::anyhow!("No embedding returned by {}", model))
    }
}
