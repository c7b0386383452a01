use super::{ClientError, ListResponse, StackClient};
use crate::store::{
    AttachmentState, AttributeFilter, Attributes, ChunkingConfig, Document, FileId, NewStore,
    SearchHit, SearchQuery, StoreId, VectorStoreApi,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counts of files in each attachment state
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FileCounts {
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub in_progress: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub total: u64,
}

/// Vector store metadata as returned by the service
#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_counts: FileCounts,
}

#[derive(Deserialize)]
struct FileObject {
    id: String,
}

#[derive(Serialize)]
struct StaticChunking<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "static")]
    config: &'a ChunkingConfig,
}

#[derive(Serialize)]
struct AttachRequest<'a> {
    file_id: &'a str,
    #[serde(skip_serializing_if = "no_attributes")]
    attributes: &'a Attributes,
    chunking_strategy: StaticChunking<'a>,
}

fn no_attributes(attributes: &&Attributes) -> bool {
    attributes.is_empty()
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum FilterExpr<'a> {
    Eq { key: &'a str, value: &'a str },
    And { filters: Vec<FilterExpr<'a>> },
}

impl<'a> FilterExpr<'a> {
    fn from_filters(filters: &'a [AttributeFilter]) -> Option<Self> {
        let mut exprs: Vec<FilterExpr<'a>> = filters
            .iter()
            .map(|f| FilterExpr::Eq {
                key: &f.key,
                value: &f.value,
            })
            .collect();
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(FilterExpr::And { filters: exprs }),
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_num_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<FilterExpr<'a>>,
}

impl<'a> From<&'a SearchQuery> for SearchRequest<'a> {
    fn from(query: &'a SearchQuery) -> Self {
        Self {
            query: &query.query,
            max_num_results: query.max_num_results,
            filters: FilterExpr::from_filters(&query.filters),
        }
    }
}

impl StackClient {
    /// Fetch store metadata; a missing store surfaces as a 404 status error
    pub async fn retrieve_store(&self, store: &StoreId) -> Result<VectorStoreInfo, ClientError> {
        self.get_json(&format!("vector_stores/{}", store)).await
    }

    /// List existing stores
    pub async fn list_stores(&self) -> Result<Vec<VectorStoreInfo>, ClientError> {
        let response: ListResponse<VectorStoreInfo> = self.get_json("vector_stores").await?;
        Ok(response.data)
    }
}

#[async_trait::async_trait]
impl VectorStoreApi for StackClient {
    async fn create_store(&self, store: &NewStore) -> Result<StoreId> {
        let created: VectorStoreInfo = self
            .post_json("vector_stores", store)
            .await
            .with_context(|| format!("Failed to create vector store {}", store.name))?;
        Ok(StoreId(created.id))
    }

    async fn upload_document(&self, document: &Document) -> Result<FileId> {
        let part = reqwest::multipart::Part::bytes(document.content().to_vec())
            .file_name(document.filename().to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);
        let file: FileObject = self
            .post_multipart("files", form)
            .await
            .with_context(|| format!("Failed to upload {}", document.filename()))?;
        Ok(FileId(file.id))
    }

    async fn attach(
        &self,
        store: &StoreId,
        file: &FileId,
        chunking: &ChunkingConfig,
        attributes: &Attributes,
    ) -> Result<AttachmentState> {
        let request = AttachRequest {
            file_id: file.as_str(),
            attributes,
            chunking_strategy: StaticChunking {
                kind: "static",
                config: chunking,
            },
        };
        self.post_json(&format!("vector_stores/{}/files", store), &request)
            .await
            .with_context(|| format!("Failed to attach {} to {}", file, store))
    }

    async fn get_attachment_state(
        &self,
        store: &StoreId,
        file: &FileId,
    ) -> Result<AttachmentState> {
        self.get_json(&format!("vector_stores/{}/files/{}", store, file))
            .await
            .with_context(|| format!("Failed to fetch attachment {} in {}", file, store))
    }

    async fn search(&self, store: &StoreId, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let request = SearchRequest::from(query);
        let response: ListResponse<SearchHit> = self
            .post_json(&format!("vector_stores/{}/search", store), &request)
            .await
            .with_context(|| format!("Failed to search {}", store))?;
        Ok(response.data)
    }

    async fn delete_store(&self, store: &StoreId) -> Result<()> {
        self.delete(&format!("vector_stores/{}", store))
            .await
            .with_context(|| format!("Failed to delete vector store {}", store))
    }

    async fn delete_document(&self, file: &FileId) -> Result<()> {
        self.delete(&format!("files/{}", file))
            .await
            .with_context(|| format!("Failed to delete file {}", file))
    }
}
