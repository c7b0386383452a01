//! Federated retrieval: query several stores and fold their hits into one
//! context block for a generation request.

use crate::client::is_connectivity_error;
use crate::store::{SearchHit, SearchQuery, StoreId, VectorStoreApi};
use std::sync::Arc;

/// First line of every non-empty composed context
pub const CONTEXT_HEADER: &str = "Context from uploaded documents:";

/// Format hits as a context block.
///
/// One line per hit with non-empty text, in the given order. Returns an empty
/// string, not a bare header, when no hit has text.
pub fn build_context(hits: &[SearchHit]) -> String {
    let lines: Vec<String> = hits
        .iter()
        .filter_map(|hit| {
            let snippet = hit.snippet();
            if snippet.is_empty() {
                return None;
            }
            Some(format!(
                "- {} (score={:.2}): {}",
                hit.filename, hit.score, snippet
            ))
        })
        .collect();

    if lines.is_empty() {
        return String::new();
    }

    let mut context = String::from(CONTEXT_HEADER);
    for line in lines {
        context.push('\n');
        context.push_str(&line);
    }
    context
}

/// Prefix a question with retrieved context
pub fn augment_prompt(context: &str, question: &str) -> String {
    if context.is_empty() {
        question.to_string()
    } else {
        format!("{}\n\nQuestion: {}", context, question)
    }
}

/// A store whose search call failed during composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub store: StoreId,
    pub message: String,
    /// The store's service could not be reached at all
    pub connectivity: bool,
}

/// Result of a federated query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposedContext {
    pub text: String,
    pub hits: Vec<SearchHit>,
    pub failures: Vec<StoreFailure>,
}

impl ComposedContext {
    /// No context is available for generation
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalError {
    #[error("at least one vector store is required")]
    NoStores,

    #[error("max_results must be greater than zero")]
    ZeroResults,
}

/// Queries stores one at a time and composes their hits
pub struct RetrievalComposer {
    api: Arc<dyn VectorStoreApi>,
}

impl RetrievalComposer {
    pub fn new(api: Arc<dyn VectorStoreApi>) -> Self {
        Self { api }
    }

    /// Search every store with the same query.
    ///
    /// A failing store is recorded in `failures` and skipped; it never aborts
    /// the search of the remaining stores. Hits keep the service's ranking
    /// within each store, and stores keep the order they were given in.
    pub async fn compose(
        &self,
        stores: &[StoreId],
        query: &SearchQuery,
    ) -> Result<ComposedContext, RetrievalError> {
        if stores.is_empty() {
            return Err(RetrievalError::NoStores);
        }
        if query.max_num_results == 0 {
            return Err(RetrievalError::ZeroResults);
        }

        let mut hits = Vec::new();
        let mut failures = Vec::new();

        for store in stores {
            match self.api.search(store, query).await {
                Ok(store_hits) => {
                    tracing::debug!(store = %store, hits = store_hits.len(), "Searched store");
                    hits.extend(store_hits);
                },
                Err(e) => {
                    let connectivity = is_connectivity_error(&e);
                    tracing::warn!(store = %store, connectivity, "Search failed: {:#}", e);
                    failures.push(StoreFailure {
                        store: store.clone(),
                        message: format!("{:#}", e),
                        connectivity,
                    });
                },
            }
        }

        Ok(ComposedContext {
            text: build_context(&hits),
            hits,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentFragment;
    use crate::testing::ScriptedStore;
    use std::collections::HashMap;

    fn hit(filename: &str, score: f64, fragments: &[&str]) -> SearchHit {
        SearchHit {
            file_id: format!("file-{}", filename),
            filename: filename.to_string(),
            score,
            attributes: HashMap::new(),
            content: fragments.iter().map(|t| ContentFragment::text(*t)).collect(),
        }
    }

    mod build_context {
        use super::*;

        #[test]
        fn empty_results_give_empty_string() {
            assert_eq!(build_context(&[]), "");
        }

        #[test]
        fn hits_without_text_give_empty_string() {
            let hits = vec![hit("a.txt", 0.9, &[]), hit("b.txt", 0.8, &["   "])];
            assert_eq!(build_context(&hits), "");
        }

        #[test]
        fn formats_lines_in_service_order() {
            let hits = vec![
                hit("lora.txt", 0.8765, &["LoRA adds", " low-rank adapters "]),
                hit("empty.txt", 0.5, &[""]),
                hit("qat.txt", 0.1, &["QAT simulates quantization"]),
            ];
            assert_eq!(
                build_context(&hits),
                "Context from uploaded documents:\n\
                 - lora.txt (score=0.88): LoRA adds low-rank adapters\n\
                 - qat.txt (score=0.10): QAT simulates quantization"
            );
        }

        #[test]
        fn scores_are_not_clamped_or_sorted() {
            let hits = vec![hit("a.txt", 1.5, &["x"]), hit("b.txt", 3.25, &["y"])];
            let context = build_context(&hits);
            let lines: Vec<_> = context.lines().collect();
            assert_eq!(lines[1], "- a.txt (score=1.50): x");
            assert_eq!(lines[2], "- b.txt (score=3.25): y");
        }

        #[test]
        fn output_is_reproducible() {
            let hits = vec![hit("a.txt", 0.333, &["alpha"]), hit("b.txt", 0.666, &["beta"])];
            assert_eq!(build_context(&hits), build_context(&hits));
        }
    }

    #[test]
    fn augment_prompt_appends_question() {
        assert_eq!(
            augment_prompt("Context from uploaded documents:\n- a", "What?"),
            "Context from uploaded documents:\n- a\n\nQuestion: What?"
        );
        assert_eq!(augment_prompt("", "What?"), "What?");
    }

    mod compose {
        use super::*;

        #[tokio::test]
        async fn rejects_empty_store_set() {
            let composer = RetrievalComposer::new(Arc::new(ScriptedStore::new()));
            let err = composer
                .compose(&[], &SearchQuery::new("q", 3))
                .await
                .unwrap_err();
            assert_eq!(err, RetrievalError::NoStores);
        }

        #[tokio::test]
        async fn rejects_zero_results() {
            let composer = RetrievalComposer::new(Arc::new(ScriptedStore::new()));
            let err = composer
                .compose(&[StoreId::from("vs_1")], &SearchQuery::new("q", 0))
                .await
                .unwrap_err();
            assert_eq!(err, RetrievalError::ZeroResults);
        }

        #[tokio::test]
        async fn unreachable_store_does_not_abort_others() {
            let api = Arc::new(ScriptedStore::new());
            api.set_hits("vs_ok", vec![hit("a.txt", 0.9, &["LoRA"])]);
            api.fail_search_unreachable("vs_down");
            let composer = RetrievalComposer::new(api.clone());

            let composed = composer
                .compose(
                    &[StoreId::from("vs_down"), StoreId::from("vs_ok")],
                    &SearchQuery::new("what is lora?", 3),
                )
                .await
                .unwrap();

            assert_eq!(
                composed.text,
                "Context from uploaded documents:\n- a.txt (score=0.90): LoRA"
            );
            assert_eq!(composed.failures.len(), 1);
            assert_eq!(composed.failures[0].store, StoreId::from("vs_down"));
            assert!(composed.failures[0].connectivity);
            assert_eq!(
                api.searched_stores(),
                vec![StoreId::from("vs_down"), StoreId::from("vs_ok")]
            );
        }

        #[tokio::test]
        async fn non_connectivity_failure_is_classified() {
            let api = Arc::new(ScriptedStore::new());
            api.fail_search("vs_bad", "vector store not found");
            let composer = RetrievalComposer::new(api);

            let composed = composer
                .compose(&[StoreId::from("vs_bad")], &SearchQuery::new("q", 3))
                .await
                .unwrap();

            assert!(composed.is_empty());
            assert!(!composed.failures[0].connectivity);
            assert!(composed.failures[0].message.contains("not found"));
        }

        #[tokio::test]
        async fn hits_concatenate_store_by_store() {
            let api = Arc::new(ScriptedStore::new());
            api.set_hits("vs_a", vec![hit("a.txt", 0.2, &["low"])]);
            api.set_hits("vs_b", vec![hit("b.txt", 0.9, &["high"])]);
            let composer = RetrievalComposer::new(api);

            let composed = composer
                .compose(
                    &[StoreId::from("vs_a"), StoreId::from("vs_b")],
                    &SearchQuery::new("q", 3),
                )
                .await
                .unwrap();

            let filenames: Vec<_> = composed.hits.iter().map(|h| h.filename.as_str()).collect();
            assert_eq!(filenames, vec!["a.txt", "b.txt"]);
            assert!(composed.failures.is_empty());
        }
    }
}
