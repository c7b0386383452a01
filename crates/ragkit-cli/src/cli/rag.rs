use super::chat::answer;
use super::{print_ingest_results, Scratch, Session};
use anyhow::{Context, Result};
use clap::Args;
use ragkit::services::{
    augment_prompt, ComposedContext, ResolveNeeds, ResolvedModels, RetrievalComposer,
};
use ragkit::store::{Attributes, ChunkingConfig, Document, SearchQuery, StoreId};

const DEFAULT_QUESTION: &str = "What does Llama Stack provide?";

const DEFAULT_DOC: &str = "Llama Stack provides a unified API to build AI applications with models, \
tools, and vector stores.";

const DOC_A: &str = "Llama Stack provides a unified API for models, tools, and vector stores.";

const DOC_B: &str = "Llama Stack supports serving models and building agentic workflows.";

const LONG_DOC: &str = "Llama Stack provides a unified API for models, tools, and vector stores. \
It supports serving, evaluation, and agentic workflows. \
You can build RAG systems and multi-tool agents with it. \
The framework enables developers to create sophisticated AI applications \
by combining language models with external tools and knowledge bases. \
Vector stores allow efficient semantic search over large document collections, \
while the tool integration system lets agents interact with external services. \
RAG (Retrieval-Augmented Generation) systems can ground model responses in factual data. \
The unified API design makes it easy to switch between different model providers \
and deployment configurations without changing application code. \
Agentic workflows enable autonomous task completion through iterative reasoning and tool use.";

const ANSWER_INSTRUCTIONS: &str = "Answer the question using the provided context. \
If the context does not contain the answer, say so.";

const BRIEF_INSTRUCTIONS: &str = "Answer the question briefly using the provided context.";

/// Attribute naming which document a chunk came from
const SOURCE_ATTRIBUTE: &str = "source";

#[derive(Args)]
pub struct RagArgs {
    /// Question to answer
    #[arg(long, default_value = DEFAULT_QUESTION)]
    question: String,

    /// Document text to ingest
    #[arg(long, default_value = DEFAULT_DOC)]
    doc_text: String,

    /// Keep the vector store and uploaded file
    #[arg(long)]
    keep: bool,
}

#[derive(Args)]
pub struct MultiRagArgs {
    /// Question to answer
    #[arg(long, default_value = DEFAULT_QUESTION)]
    question: String,

    /// Keep the vector stores and uploaded files
    #[arg(long)]
    keep: bool,
}

#[derive(Args)]
pub struct RagMetadataArgs {
    /// Question to answer
    #[arg(long, default_value = DEFAULT_QUESTION)]
    question: String,

    /// Only retrieve chunks whose `source` attribute has this value
    #[arg(long, default_value = "doc_a")]
    source: String,

    /// Keep the vector store and uploaded files
    #[arg(long)]
    keep: bool,
}

#[derive(Args)]
pub struct ChunkingArgs {
    /// Question to answer
    #[arg(long, default_value = DEFAULT_QUESTION)]
    question: String,

    /// Keep the vector stores and uploaded files
    #[arg(long)]
    keep: bool,
}

/// One document destined for a fresh store
struct Source<'a> {
    prefix: &'a str,
    filename: &'a str,
    text: &'a str,
    chunking: ChunkingConfig,
    attributes: Attributes,
}

async fn create_store(
    session: &Session,
    resolved: &ResolvedModels,
    prefix: &str,
    scratch: &mut Scratch,
) -> Result<StoreId> {
    let new_store = resolved.new_store(prefix)?;
    let store = session.store_api().create_store(&new_store).await?;
    scratch.add_store(store.clone());
    println!("Created vector store {} ({})", store, new_store.name);
    Ok(store)
}

/// Create a store, ingest one document into it, and fail unless it completed
async fn ingest_source(
    session: &Session,
    resolved: &ResolvedModels,
    source: &Source<'_>,
    scratch: &mut Scratch,
) -> Result<StoreId> {
    let store = create_store(session, resolved, source.prefix, scratch).await?;
    ingest_document(session, &store, source, scratch).await?;
    Ok(store)
}

/// Ingest one document into an existing store; fails unless it completed
async fn ingest_document(
    session: &Session,
    store: &StoreId,
    source: &Source<'_>,
    scratch: &mut Scratch,
) -> Result<()> {
    let document = Document::from_text(source.filename, source.text)?;
    let results = session
        .pipeline()
        .ingest_all(
            store,
            std::slice::from_ref(&document),
            &source.chunking,
            &source.attributes,
        )
        .await;
    scratch.add_results(&results);

    if print_ingest_results(&results) == 0 {
        return Err(anyhow::anyhow!("{} was not ingested into {}", source.filename, store));
    }
    Ok(())
}

/// Search `stores` in order; an error only when every one of them failed
async fn retrieve(
    composer: &RetrievalComposer,
    stores: &[StoreId],
    query: &SearchQuery,
) -> Result<ComposedContext> {
    let composed = composer
        .compose(stores, query)
        .await
        .context("Invalid retrieval request")?;

    for failure in &composed.failures {
        println!("[warning] store {} skipped: {}", failure.store, failure.message);
    }
    if composed.failures.len() == stores.len() {
        return Err(anyhow::anyhow!("Every vector store failed to answer the search"));
    }
    Ok(composed)
}

fn print_context(label: &str, composed: &ComposedContext) {
    if composed.is_empty() {
        println!("[{}] no relevant context found", label);
    } else {
        for line in composed.text.lines() {
            println!("[{}] {}", label, line);
        }
    }
}

fn question_query(session: &Session, question: &str) -> SearchQuery {
    SearchQuery::new(question, session.config.search.max_results)
}

pub async fn execute_rag(session: &Session, args: RagArgs) -> Result<()> {
    let resolved = session.resolve(ResolveNeeds::all()).await?;
    let mut scratch = Scratch::default();
    let result = run_rag(session, &args, &resolved, &mut scratch).await;
    scratch.finish(&session.client, args.keep, result).await
}

async fn run_rag(
    session: &Session,
    args: &RagArgs,
    resolved: &ResolvedModels,
    scratch: &mut Scratch,
) -> Result<()> {
    let model = resolved.chat_model()?;
    let source = Source {
        prefix: "ragkit-rag",
        filename: "rag_doc.txt",
        text: &args.doc_text,
        chunking: session.chunking()?,
        attributes: Attributes::new(),
    };
    let store = ingest_source(session, resolved, &source, scratch).await?;

    let query = question_query(session, &args.question);
    let composed = retrieve(&session.composer(), &[store], &query).await?;
    println!("[question] {}", args.question);
    print_context("context", &composed);

    let prompt = augment_prompt(&composed.text, &args.question);
    let reply = answer(session, model, ANSWER_INSTRUCTIONS, &prompt).await?;
    println!("[answer] {}", reply);
    Ok(())
}

pub async fn execute_multi_rag(session: &Session, args: MultiRagArgs) -> Result<()> {
    let resolved = session.resolve(ResolveNeeds::all()).await?;
    let mut scratch = Scratch::default();
    let result = run_multi_rag(session, &args, &resolved, &mut scratch).await;
    scratch.finish(&session.client, args.keep, result).await
}

async fn run_multi_rag(
    session: &Session,
    args: &MultiRagArgs,
    resolved: &ResolvedModels,
    scratch: &mut Scratch,
) -> Result<()> {
    let model = resolved.chat_model()?;
    let chunking = session.chunking()?;

    let mut stores = Vec::with_capacity(2);
    for (prefix, filename, text, tag) in [
        ("ragkit-multi-a", "doc_a.txt", DOC_A, "doc_a"),
        ("ragkit-multi-b", "doc_b.txt", DOC_B, "doc_b"),
    ] {
        let source = Source {
            prefix,
            filename,
            text,
            chunking,
            attributes: Attributes::from([(SOURCE_ATTRIBUTE.to_string(), tag.to_string())]),
        };
        stores.push(ingest_source(session, resolved, &source, scratch).await?);
    }

    let query = question_query(session, &args.question);
    let composed = retrieve(&session.composer(), &stores, &query).await?;
    let ids: Vec<&str> = stores.iter().map(StoreId::as_str).collect();
    println!("[question] {}", args.question);
    println!("[stores] {}", ids.join(", "));
    print_context("context", &composed);

    let prompt = augment_prompt(&composed.text, &args.question);
    let reply = answer(session, model, ANSWER_INSTRUCTIONS, &prompt).await?;
    println!("[answer] {}", reply);
    Ok(())
}

pub async fn execute_rag_metadata(session: &Session, args: RagMetadataArgs) -> Result<()> {
    let resolved = session.resolve(ResolveNeeds::all()).await?;
    let mut scratch = Scratch::default();
    let result = run_rag_metadata(session, &args, &resolved, &mut scratch).await;
    scratch.finish(&session.client, args.keep, result).await
}

async fn run_rag_metadata(
    session: &Session,
    args: &RagMetadataArgs,
    resolved: &ResolvedModels,
    scratch: &mut Scratch,
) -> Result<()> {
    let model = resolved.chat_model()?;
    let chunking = ChunkingConfig::new(256, 32)?;

    let store = create_store(session, resolved, "ragkit-metadata", scratch).await?;
    for (filename, text, tag) in [("doc_a.txt", DOC_A, "doc_a"), ("doc_b.txt", DOC_B, "doc_b")] {
        let source = Source {
            prefix: "ragkit-metadata",
            filename,
            text,
            chunking,
            attributes: Attributes::from([(SOURCE_ATTRIBUTE.to_string(), tag.to_string())]),
        };
        ingest_document(session, &store, &source, scratch).await?;
    }

    let query =
        question_query(session, &args.question).with_filter(SOURCE_ATTRIBUTE, &args.source);
    let composed = retrieve(&session.composer(), &[store], &query).await?;
    println!("[filter] {}={}", SOURCE_ATTRIBUTE, args.source);
    println!("[question] {}", args.question);
    print_context("context", &composed);

    let prompt = augment_prompt(&composed.text, &args.question);
    let reply = answer(session, model, ANSWER_INSTRUCTIONS, &prompt).await?;
    println!("[answer] {}", reply);
    Ok(())
}

pub async fn execute_chunking(session: &Session, args: ChunkingArgs) -> Result<()> {
    let resolved = session.resolve(ResolveNeeds::all()).await?;
    let mut scratch = Scratch::default();
    let result = run_chunking(session, &args, &resolved, &mut scratch).await;
    scratch.finish(&session.client, args.keep, result).await
}

async fn run_chunking(
    session: &Session,
    args: &ChunkingArgs,
    resolved: &ResolvedModels,
    scratch: &mut Scratch,
) -> Result<()> {
    let model = resolved.chat_model()?;
    let small = ChunkingConfig::new(128, 16)?;
    let large = ChunkingConfig::new(512, 64)?;

    println!("[question] {}", args.question);
    for (label, filename, chunking) in [
        ("small chunks", "chunk_small.txt", small),
        ("large chunks", "chunk_large.txt", large),
    ] {
        let source = Source {
            prefix: "ragkit-chunking",
            filename,
            text: LONG_DOC,
            chunking,
            attributes: Attributes::new(),
        };
        let store = ingest_source(session, resolved, &source, scratch).await?;
        println!(
            "[{}] store={} max_chunk_size_tokens={} chunk_overlap_tokens={}",
            label,
            store,
            chunking.max_chunk_size_tokens(),
            chunking.chunk_overlap_tokens()
        );

        let query = question_query(session, &args.question);
        let composed = retrieve(&session.composer(), &[store], &query).await?;
        print_context(label, &composed);

        let prompt = augment_prompt(&composed.text, &args.question);
        let reply = answer(session, model, BRIEF_INSTRUCTIONS, &prompt).await?;
        println!("[{}] answer: {}", label, reply);
    }
    Ok(())
}
