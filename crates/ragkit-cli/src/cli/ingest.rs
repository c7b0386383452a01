use super::{parse_metadata, print_ingest_results, Scratch, Session};
use anyhow::{Context, Result};
use clap::Args;
use ragkit::services::{collect_local_files, download_documents, ResolveNeeds, DEFAULT_URLS};
use ragkit::store::{Document, SearchQuery, StoreId};
use std::path::PathBuf;

#[derive(Args)]
pub struct SourceArgs {
    /// Existing vector store to use instead of creating one
    #[arg(long)]
    store_id: Option<String>,

    /// Directory of local files to ingest
    #[arg(long, conflicts_with = "urls")]
    file_dir: Option<PathBuf>,

    /// Document URLs to download (comma separated; defaults to the torchtune tutorials)
    #[arg(long, value_delimiter = ',')]
    urls: Vec<String>,

    /// Attribute attached to every ingested document (key=value)
    #[arg(long = "attr")]
    attributes: Vec<String>,
}

#[derive(Args)]
pub struct InsertArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Args)]
pub struct SearchArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Search query
    #[arg(long)]
    query: String,

    /// Inline text to ingest instead of files or URLs
    #[arg(long, conflicts_with_all = ["file_dir", "urls"])]
    text: Option<String>,

    /// Maximum results (defaults to [search] max_results)
    #[arg(long)]
    max_results: Option<usize>,

    /// Attribute filter (key=value)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Keep the vector store and uploaded files
    #[arg(long)]
    keep: bool,
}

/// Gather documents from inline text, a directory, or URLs, in that order of preference
async fn collect(
    session: &Session,
    source: &SourceArgs,
    text: Option<&str>,
) -> Result<Vec<Document>> {
    if let Some(text) = text {
        return Ok(vec![Document::from_text("inline.txt", text)?]);
    }

    if let Some(dir) = &source.file_dir {
        return collect_local_files(dir);
    }

    let urls: Vec<String> = if source.urls.is_empty() {
        DEFAULT_URLS.iter().map(|u| u.to_string()).collect()
    } else {
        source.urls.clone()
    };
    println!("Downloading {} documents...", urls.len());
    Ok(download_documents(session.client.http(), &urls).await)
}

/// Use the given store or create a new one; created stores are recorded in `scratch`
async fn open_store(
    session: &Session,
    source: &SourceArgs,
    prefix: &str,
    scratch: &mut Scratch,
) -> Result<StoreId> {
    if let Some(id) = &source.store_id {
        return Ok(StoreId::from(id.as_str()));
    }

    let resolved = session.resolve(ResolveNeeds::vector_store()).await?;
    let new_store = resolved.new_store(prefix)?;
    let store = session.store_api().create_store(&new_store).await?;
    println!(
        "Created vector store {} ({}, {} dims)",
        store, new_store.embedding_model, new_store.embedding_dimension
    );
    scratch.add_store(store.clone());
    Ok(store)
}

/// Ingest `documents` into `store`, recording uploaded files in `scratch`
async fn ingest_into(
    session: &Session,
    store: &StoreId,
    documents: &[Document],
    source: &SourceArgs,
    scratch: &mut Scratch,
) -> Result<usize> {
    let attributes = parse_metadata(&source.attributes)?;
    let chunking = session.chunking()?;

    let results = session
        .pipeline()
        .ingest_all(store, documents, &chunking, &attributes)
        .await;
    scratch.add_results(&results);

    let completed = print_ingest_results(&results);
    println!(
        "Ingested {}/{} documents into {}",
        completed,
        documents.len(),
        store
    );
    Ok(completed)
}

pub async fn execute_insert(session: &Session, args: InsertArgs) -> Result<()> {
    let documents = collect(session, &args.source, None).await?;
    if documents.is_empty() {
        return Err(anyhow::anyhow!("No documents to ingest"));
    }

    let mut scratch = Scratch::default();
    let store = open_store(session, &args.source, "ragkit-insert", &mut scratch).await?;
    let completed = ingest_into(session, &store, &documents, &args.source, &mut scratch).await?;

    if completed == 0 {
        return Err(anyhow::anyhow!("No document finished processing in {}", store));
    }
    println!("Vector store ready: {}", store);
    Ok(())
}

pub async fn execute_search(session: &Session, args: SearchArgs) -> Result<()> {
    let mut scratch = Scratch::default();
    let result = run_search(session, &args, &mut scratch).await;
    scratch.finish(&session.client, args.keep, result).await
}

async fn run_search(session: &Session, args: &SearchArgs, scratch: &mut Scratch) -> Result<()> {
    let has_source =
        args.text.is_some() || args.source.file_dir.is_some() || !args.source.urls.is_empty();
    let store = open_store(session, &args.source, "ragkit-search", scratch).await?;

    // An existing store with no new sources is searched as is
    if has_source || args.source.store_id.is_none() {
        let documents = collect(session, &args.source, args.text.as_deref()).await?;
        if documents.is_empty() {
            return Err(anyhow::anyhow!("No documents to ingest"));
        }
        ingest_into(session, &store, &documents, &args.source, scratch).await?;
    }

    let max_results = args.max_results.unwrap_or(session.config.search.max_results);
    let mut query = SearchQuery::new(&args.query, max_results);
    for (key, value) in parse_metadata(&args.filters)? {
        query = query.with_filter(key, value);
    }

    let composed = session
        .composer()
        .compose(std::slice::from_ref(&store), &query)
        .await
        .context("Invalid search")?;
    if let Some(failure) = composed.failures.first() {
        return Err(anyhow::anyhow!("Search failed: {}", failure.message));
    }

    println!("\nQuery: {}", args.query);
    println!("Found {} results:", composed.hits.len());
    for (idx, hit) in composed.hits.iter().enumerate() {
        println!("\n{}. score={:.4} file={}", idx + 1, hit.score, hit.filename);
        println!("   {}", hit.snippet());
    }
    Ok(())
}
