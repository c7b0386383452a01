//! One-time resolution of the chat model, embedding model and vector store
//! provider a command runs with.

use super::types::ModelsConfig;
use super::ServiceError;
use crate::client::{ModelInfo, ProviderInfo};
use crate::store::NewStore;
use anyhow::Result;
use std::sync::Arc;

/// Catalog queries needed to resolve models
#[async_trait::async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn models(&self) -> Result<Vec<ModelInfo>>;

    async fn providers(&self) -> Result<Vec<ProviderInfo>>;

    /// Whether the model answers a minimal chat completion
    async fn can_chat(&self, model: &str) -> bool;

    /// Vector length produced by an embedding model
    async fn embedding_dimension(&self, model: &str) -> Result<usize>;
}

/// Which pieces a command needs resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveNeeds {
    pub chat: bool,
    pub embedding: bool,
    pub vector_provider: bool,
}

impl ResolveNeeds {
    pub fn chat() -> Self {
        Self {
            chat: true,
            ..Default::default()
        }
    }

    /// Everything needed to create a vector store
    pub fn vector_store() -> Self {
        Self {
            embedding: true,
            vector_provider: true,
            ..Default::default()
        }
    }

    pub fn all() -> Self {
        Self {
            chat: true,
            embedding: true,
            vector_provider: true,
        }
    }
}

/// Models and provider chosen at startup and passed to every operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedModels {
    pub chat_model: Option<String>,
    pub embedding_model: Option<String>,
    pub embedding_dimension: Option<usize>,
    pub vector_provider: Option<String>,
}

impl ResolvedModels {
    pub fn chat_model(&self) -> Result<&str, ServiceError> {
        self.chat_model
            .as_deref()
            .ok_or(ServiceError::Unavailable("chat model"))
    }

    /// Parameters for a new uniquely named store bound to the resolved embedding model
    pub fn new_store(&self, prefix: &str) -> Result<NewStore, ServiceError> {
        let embedding_model = self
            .embedding_model
            .clone()
            .ok_or(ServiceError::Unavailable("embedding model"))?;
        let embedding_dimension = self
            .embedding_dimension
            .ok_or(ServiceError::Unavailable("embedding dimension"))?;
        Ok(NewStore {
            name: NewStore::unique_name(prefix),
            provider_id: self.vector_provider.clone(),
            embedding_model,
            embedding_dimension,
        })
    }
}

/// Resolves configured or catalog-default models
pub struct ModelResolver {
    catalog: Arc<dyn ModelCatalog>,
    config: ModelsConfig,
}

impl ModelResolver {
    pub fn new(catalog: Arc<dyn ModelCatalog>, config: ModelsConfig) -> Self {
        Self { catalog, config }
    }

    /// Resolve what `needs` asks for. Explicit choices are validated against
    /// the catalog; missing ones are filled with the first usable entry.
    pub async fn resolve(&self, needs: ResolveNeeds) -> Result<ResolvedModels, ServiceError> {
        let mut resolved = ResolvedModels::default();

        let models = if needs.chat || needs.embedding {
            self.catalog.models().await?
        } else {
            Vec::new()
        };

        if needs.chat {
            resolved.chat_model = Some(self.resolve_chat(&models).await?);
        }

        if needs.embedding {
            let model = self.resolve_embedding(&models)?;
            let dimension = match self.config.embedding_dimension {
                Some(dimension) => dimension,
                None => self.catalog.embedding_dimension(&model).await?,
            };
            tracing::debug!(%model, dimension, "Resolved embedding model");
            resolved.embedding_model = Some(model);
            resolved.embedding_dimension = Some(dimension);
        }

        if needs.vector_provider {
            resolved.vector_provider = Some(self.resolve_provider().await?);
        }

        Ok(resolved)
    }

    async fn resolve_chat(&self, models: &[ModelInfo]) -> Result<String, ServiceError> {
        let candidates: Vec<String> = models
            .iter()
            .filter(|m| m.is_chat_candidate())
            .map(|m| m.identifier.clone())
            .collect();

        if let Some(wanted) = &self.config.chat {
            if !candidates.contains(wanted) {
                return Err(ServiceError::NotFound {
                    kind: "model",
                    name: wanted.clone(),
                    available: candidates,
                });
            }
            if !self.catalog.can_chat(wanted).await {
                return Err(ServiceError::NotChatCapable(wanted.clone()));
            }
            return Ok(wanted.clone());
        }

        if candidates.is_empty() {
            return Err(ServiceError::Unavailable("LLM model"));
        }
        for model in candidates {
            if self.catalog.can_chat(&model).await {
                tracing::debug!(%model, "Resolved chat model");
                return Ok(model);
            }
            tracing::debug!(%model, "Skipping model that cannot chat");
        }
        Err(ServiceError::Unavailable("chat-capable model"))
    }

    fn resolve_embedding(&self, models: &[ModelInfo]) -> Result<String, ServiceError> {
        match &self.config.embedding {
            Some(wanted) => {
                if models.iter().any(|m| &m.identifier == wanted) {
                    Ok(wanted.clone())
                } else {
                    Err(ServiceError::NotFound {
                        kind: "embedding model",
                        name: wanted.clone(),
                        available: models
                            .iter()
                            .filter(|m| m.is_embedding())
                            .map(|m| m.identifier.clone())
                            .collect(),
                    })
                }
            },
            None => models
                .iter()
                .find(|m| m.is_embedding())
                .map(|m| m.identifier.clone())
                .ok_or(ServiceError::Unavailable("embedding model")),
        }
    }

    async fn resolve_provider(&self) -> Result<String, ServiceError> {
        let available: Vec<String> = self
            .catalog
            .providers()
            .await?
            .into_iter()
            .filter(ProviderInfo::is_vector_io)
            .map(|p| p.provider_id)
            .collect();

        match &self.config.vector_provider {
            Some(wanted) if available.contains(wanted) => Ok(wanted.clone()),
            Some(wanted) => Err(ServiceError::NotFound {
                kind: "vector_io provider",
                name: wanted.clone(),
                available,
            }),
            None => available
                .into_iter()
                .next()
                .ok_or(ServiceError::Unavailable("vector_io provider")),
        }
    }
}
