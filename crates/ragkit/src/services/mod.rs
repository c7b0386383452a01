pub mod config;
pub mod documents;
pub mod ingest;
pub mod models;
pub mod retrieval;
pub mod routing;
pub mod types;

pub use config::ConfigService;
pub use documents::{collect_local_files, download_documents, filename_from_url, DEFAULT_URLS};
pub use ingest::{
    AttachOutcome, Backoff, IngestError, IngestReport, IngestionPipeline, PollPolicy,
};
pub use models::{ModelCatalog, ModelResolver, ResolveNeeds, ResolvedModels};
pub use retrieval::{
    augment_prompt, build_context, ComposedContext, RetrievalComposer, RetrievalError,
    StoreFailure, CONTEXT_HEADER,
};
pub use routing::{Route, TaskRouter};
pub use types::{
    IngestConfig, IngestConfigError, MathConfig, ModelsConfig, RagkitConfig, SearchConfig,
    ServerConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{kind} '{name}' not found; available: {}", format_available(.available))]
    NotFound {
        kind: &'static str,
        name: String,
        available: Vec<String>,
    },

    #[error("no {0} available")]
    Unavailable(&'static str),

    #[error("model '{0}' did not answer a chat request")]
    NotChatCapable(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_alternatives() {
        let err = ServiceError::NotFound {
            kind: "model",
            name: "missing".to_string(),
            available: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "model 'missing' not found; available: a, b");
    }

    #[test]
    fn not_found_with_nothing_available() {
        let err = ServiceError::NotFound {
            kind: "vector_io provider",
            name: "faiss".to_string(),
            available: Vec::new(),
        };
        assert!(err.to_string().ends_with("available: none"));
    }
}
