use crate::store::{ChunkingConfig, ChunkingError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Project configuration, layered from defaults, `.ragkit/config.toml` and
/// `RAGKIT_` environment variables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RagkitConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub math: MathConfig,
}

/// Inference platform location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8321,
        }
    }
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Explicit model and provider choices; anything unset is resolved from the
/// server catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dimension: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub max_chunk_size_tokens: u32,
    pub chunk_overlap_tokens: u32,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_chunk_size_tokens: 512,
            chunk_overlap_tokens: 64,
            timeout_secs: 30,
            poll_interval_ms: 200,
        }
    }
}

impl IngestConfig {
    /// Validated chunking parameters
    pub fn chunking(&self) -> Result<ChunkingConfig, ChunkingError> {
        ChunkingConfig::new(self.max_chunk_size_tokens, self.chunk_overlap_tokens)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// A zero poll interval would re-fetch the attachment in a busy loop
    pub fn validate(&self) -> Result<(), IngestConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(IngestConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestConfigError {
    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { max_results: 3 }
    }
}

/// Math microservice location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathConfig {
    pub url: String,
}

impl Default for MathConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_settings() {
        let config = RagkitConfig::default();
        assert_eq!(config.server.base_url(), "http://localhost:8321");
        assert_eq!(config.ingest.timeout(), Duration::from_secs(30));
        assert_eq!(config.ingest.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.search.max_results, 3);
        assert!(config.models.chat.is_none());
    }

    #[test]
    fn ingest_config_validates_chunking() {
        let config = IngestConfig {
            max_chunk_size_tokens: 100,
            chunk_overlap_tokens: 100,
            ..Default::default()
        };
        assert!(config.chunking().is_err());
        assert!(IngestConfig::default().chunking().is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = IngestConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(IngestConfigError::ZeroPollInterval));
        assert!(IngestConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: RagkitConfig = toml::from_str(
            r#"
[models]
chat = "llama3.2:3b"
"#,
        )
        .unwrap();
        assert_eq!(config.models.chat.as_deref(), Some("llama3.2:3b"));
        assert_eq!(config.server.port, 8321);
        assert_eq!(config.ingest.max_chunk_size_tokens, 512);
    }
}
