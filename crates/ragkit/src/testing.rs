//! Test utilities for the ragkit crate
//!
//! Scripted in-memory doubles for [`VectorStoreApi`] and [`ModelCatalog`],
//! usable from unit tests and, with the `testing` feature, integration tests.

use crate::client::{ClientError, ModelInfo, ModelType, ProviderInfo};
use crate::services::models::ModelCatalog;
use crate::store::{
    AttachmentState, AttachmentStatus, Attributes, ChunkingConfig, Document, FileId, NewStore,
    SearchHit, SearchQuery, StoreId, VectorStoreApi,
};
use anyhow::Result;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

enum SearchScript {
    Hits(Vec<SearchHit>),
    Unreachable,
    Fails(String),
}

#[derive(Default)]
struct StoreState {
    next_id: u32,
    created: Vec<NewStore>,
    uploads: HashMap<FileId, String>,
    failing_uploads: HashSet<String>,
    failing_attaches: HashSet<String>,
    scripts: HashMap<String, VecDeque<AttachmentState>>,
    current: HashMap<FileId, VecDeque<AttachmentState>>,
    polls: HashMap<String, usize>,
    attachments: Vec<(StoreId, ChunkingConfig, Attributes)>,
    searches: HashMap<StoreId, SearchScript>,
    searched: Vec<(StoreId, SearchQuery)>,
    fail_deletes: bool,
    deleted_stores: Vec<StoreId>,
    deleted_files: Vec<FileId>,
}

/// Vector store double driven by per-filename attachment scripts.
///
/// An attachment script is the sequence of states reported for a document:
/// the first is returned by `attach`, each later one by a poll, and the last
/// repeats forever. Unscripted documents complete immediately. Stores without
/// scripted search results return no hits; scripted hits are narrowed by the
/// query's attribute filters.
#[derive(Default)]
pub struct ScriptedStore {
    state: Mutex<StoreState>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script attachment statuses for a filename
    pub fn script_attachment(&self, filename: &str, statuses: Vec<AttachmentStatus>) {
        self.script_states(
            filename,
            statuses.into_iter().map(AttachmentState::new).collect(),
        );
    }

    /// Script full attachment states for a filename
    pub fn script_states(&self, filename: &str, states: Vec<AttachmentState>) {
        self.lock()
            .scripts
            .insert(filename.to_string(), states.into());
    }

    pub fn fail_upload(&self, filename: &str) {
        self.lock().failing_uploads.insert(filename.to_string());
    }

    pub fn fail_attach(&self, filename: &str) {
        self.lock().failing_attaches.insert(filename.to_string());
    }

    pub fn set_hits(&self, store: &str, hits: Vec<SearchHit>) {
        self.lock()
            .searches
            .insert(StoreId::from(store), SearchScript::Hits(hits));
    }

    /// Searches of this store fail as if its server were down
    pub fn fail_search_unreachable(&self, store: &str) {
        self.lock()
            .searches
            .insert(StoreId::from(store), SearchScript::Unreachable);
    }

    pub fn fail_search(&self, store: &str, message: &str) {
        self.lock().searches.insert(
            StoreId::from(store),
            SearchScript::Fails(message.to_string()),
        );
    }

    /// Every delete call fails (and is still recorded)
    pub fn fail_deletes(&self) {
        self.lock().fail_deletes = true;
    }

    /// Number of state re-fetches made for a filename
    pub fn poll_count(&self, filename: &str) -> usize {
        self.lock().polls.get(filename).copied().unwrap_or(0)
    }

    pub fn created_stores(&self) -> Vec<NewStore> {
        self.lock().created.clone()
    }

    /// Filenames uploaded so far, in upload order
    pub fn uploaded(&self) -> Vec<String> {
        let state = self.lock();
        let mut uploads: Vec<_> = state.uploads.iter().collect();
        uploads.sort_by_key(|(id, _)| id.0.clone());
        uploads.into_iter().map(|(_, name)| name.clone()).collect()
    }

    /// Store, chunking and attributes of every attach call
    pub fn attachments(&self) -> Vec<(StoreId, ChunkingConfig, Attributes)> {
        self.lock().attachments.clone()
    }

    pub fn searched_stores(&self) -> Vec<StoreId> {
        self.lock()
            .searched
            .iter()
            .map(|(store, _)| store.clone())
            .collect()
    }

    /// Every query received, with the store it targeted
    pub fn search_queries(&self) -> Vec<(StoreId, SearchQuery)> {
        self.lock().searched.clone()
    }

    pub fn deleted_stores(&self) -> Vec<StoreId> {
        self.lock().deleted_stores.clone()
    }

    pub fn deleted_files(&self) -> Vec<FileId> {
        self.lock().deleted_files.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    fn next_state(queue: &mut VecDeque<AttachmentState>) -> AttachmentState {
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| AttachmentState::new(AttachmentStatus::Completed))
        }
    }
}

#[async_trait::async_trait]
impl VectorStoreApi for ScriptedStore {
    async fn create_store(&self, store: &NewStore) -> Result<StoreId> {
        let mut state = self.lock();
        state.next_id += 1;
        state.created.push(store.clone());
        Ok(StoreId(format!("vs_{}", state.next_id)))
    }

    async fn upload_document(&self, document: &Document) -> Result<FileId> {
        let mut state = self.lock();
        if state.failing_uploads.contains(document.filename()) {
            anyhow::bail!("upload rejected: {}", document.filename());
        }
        state.next_id += 1;
        let id = FileId(format!("file_{:04}", state.next_id));
        state
            .uploads
            .insert(id.clone(), document.filename().to_string());
        Ok(id)
    }

    async fn attach(
        &self,
        store: &StoreId,
        file: &FileId,
        chunking: &ChunkingConfig,
        attributes: &Attributes,
    ) -> Result<AttachmentState> {
        let mut state = self.lock();
        let filename = state.uploads.get(file).cloned().unwrap_or_default();
        if state.failing_attaches.contains(&filename) {
            anyhow::bail!("attach rejected: {}", filename);
        }
        state
            .attachments
            .push((store.clone(), *chunking, attributes.clone()));
        let mut queue = state.scripts.get(&filename).cloned().unwrap_or_default();
        let first = Self::next_state(&mut queue);
        state.current.insert(file.clone(), queue);
        Ok(first)
    }

    async fn get_attachment_state(
        &self,
        _store: &StoreId,
        file: &FileId,
    ) -> Result<AttachmentState> {
        let mut state = self.lock();
        let filename = state.uploads.get(file).cloned().unwrap_or_default();
        *state.polls.entry(filename).or_default() += 1;
        let queue = state
            .current
            .get_mut(file)
            .ok_or_else(|| anyhow::anyhow!("file {} is not attached", file))?;
        Ok(Self::next_state(queue))
    }

    async fn search(&self, store: &StoreId, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let mut state = self.lock();
        state.searched.push((store.clone(), query.clone()));
        match state.searches.get(store) {
            Some(SearchScript::Hits(hits)) => Ok(hits
                .iter()
                .filter(|hit| matches_filters(hit, query))
                .cloned()
                .collect()),
            Some(SearchScript::Unreachable) => Err(anyhow::Error::new(ClientError::Connect {
                url: format!("http://localhost:8321/v1/vector_stores/{}/search", store),
                reason: "connection refused".to_string(),
            })
            .context(format!("Failed to search {}", store))),
            Some(SearchScript::Fails(message)) => Err(anyhow::anyhow!("{}", message)),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_store(&self, store: &StoreId) -> Result<()> {
        let mut state = self.lock();
        state.deleted_stores.push(store.clone());
        if state.fail_deletes {
            anyhow::bail!("delete failed for {}", store);
        }
        Ok(())
    }

    async fn delete_document(&self, file: &FileId) -> Result<()> {
        let mut state = self.lock();
        state.deleted_files.push(file.clone());
        if state.fail_deletes {
            anyhow::bail!("delete failed for {}", file);
        }
        Ok(())
    }
}

fn matches_filters(hit: &SearchHit, query: &SearchQuery) -> bool {
    query.filters.iter().all(|filter| {
        hit.attributes.get(&filter.key).and_then(|value| value.as_str())
            == Some(filter.value.as_str())
    })
}

#[derive(Default)]
struct CatalogState {
    models: Vec<ModelInfo>,
    providers: Vec<ProviderInfo>,
    cannot_chat: HashSet<String>,
    dimension: usize,
    dimension_probes: usize,
}

/// Fixed model catalog. Clones share state, so probe counts are visible
/// through any handle.
#[derive(Clone, Default)]
pub struct StaticCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        let catalog = Self::default();
        catalog.state.lock().unwrap().dimension = 384;
        catalog
    }

    pub fn llm(identifier: &str) -> ModelInfo {
        ModelInfo {
            identifier: identifier.to_string(),
            model_type: ModelType::Llm,
            provider_id: None,
        }
    }

    pub fn embedding(identifier: &str) -> ModelInfo {
        ModelInfo {
            identifier: identifier.to_string(),
            model_type: ModelType::Embedding,
            provider_id: None,
        }
    }

    pub fn with_model(self, model: ModelInfo) -> Self {
        self.state.lock().unwrap().models.push(model);
        self
    }

    pub fn with_provider(self, api: &str, provider_id: &str) -> Self {
        self.state.lock().unwrap().providers.push(ProviderInfo {
            api: api.to_string(),
            provider_id: provider_id.to_string(),
            provider_type: format!("inline::{}", provider_id),
        });
        self
    }

    /// The model fails the chat probe
    pub fn cannot_chat(self, model: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .cannot_chat
            .insert(model.to_string());
        self
    }

    pub fn with_dimension(self, dimension: usize) -> Self {
        self.state.lock().unwrap().dimension = dimension;
        self
    }

    pub fn dimension_probes(&self) -> usize {
        self.state.lock().unwrap().dimension_probes
    }
}

#[async_trait::async_trait]
impl ModelCatalog for StaticCatalog {
    async fn models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.state.lock().unwrap().models.clone())
    }

    async fn providers(&self) -> Result<Vec<ProviderInfo>> {
        Ok(self.state.lock().unwrap().providers.clone())
    }

    async fn can_chat(&self, model: &str) -> bool {
        !self.state.lock().unwrap().cannot_chat.contains(model)
    }

    async fn embedding_dimension(&self, _model: &str) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.dimension_probes += 1;
        Ok(state.dimension)
    }
}
