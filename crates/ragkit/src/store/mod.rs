pub mod types;

pub use types::{
    AttachmentError, AttachmentState, AttachmentStatus, AttributeFilter, Attributes,
    ChunkingConfig, ChunkingError, ContentFragment, Document, DocumentError, FileId, NewStore,
    SearchHit, SearchQuery, StoreId,
};

use anyhow::Result;

/// Remote vector store operations used by ingestion and retrieval
#[async_trait::async_trait]
pub trait VectorStoreApi: Send + Sync {
    /// Create a named store bound to an embedding model
    async fn create_store(&self, store: &NewStore) -> Result<StoreId>;

    /// Upload raw document content
    async fn upload_document(&self, document: &Document) -> Result<FileId>;

    /// Attach an uploaded file to a store
    async fn attach(
        &self,
        store: &StoreId,
        file: &FileId,
        chunking: &ChunkingConfig,
        attributes: &Attributes,
    ) -> Result<AttachmentState>;

    /// Fetch the current attachment state
    async fn get_attachment_state(&self, store: &StoreId, file: &FileId)
        -> Result<AttachmentState>;

    /// Semantic search within one store
    async fn search(&self, store: &StoreId, query: &SearchQuery) -> Result<Vec<SearchHit>>;

    /// Delete a store
    async fn delete_store(&self, store: &StoreId) -> Result<()>;

    /// Delete an uploaded file
    async fn delete_document(&self, file: &FileId) -> Result<()>;
}

/// Best-effort removal of stores and files. Failures are logged, never returned.
pub async fn cleanup(api: &dyn VectorStoreApi, stores: &[StoreId], files: &[FileId]) {
    for store in stores {
        match api.delete_store(store).await {
            Ok(()) => tracing::debug!(store = %store, "Deleted vector store"),
            Err(e) => tracing::warn!(store = %store, "Failed to delete vector store: {:#}", e),
        }
    }
    for file in files {
        match api.delete_document(file).await {
            Ok(()) => tracing::debug!(file = %file, "Deleted file"),
            Err(e) => tracing::warn!(file = %file, "Failed to delete file: {:#}", e),
        }
    }
}
