mod chat;
mod config;
mod ingest;
mod math;
mod rag;
mod route;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ragkit::client::{is_connectivity_error, StackClient};
use ragkit::services::{
    ConfigService, IngestError, IngestReport, IngestionPipeline, ModelResolver, PollPolicy,
    RagkitConfig, ResolveNeeds, ResolvedModels, RetrievalComposer,
};
use ragkit::store::{cleanup, Attributes, ChunkingConfig, FileId, StoreId, VectorStoreApi};
use std::path::PathBuf;
use std::sync::Arc;

/// Parse key=value pairs from command line arguments
pub fn parse_metadata(pairs: &[String]) -> Result<Attributes> {
    let mut map = Attributes::new();
    for pair in pairs {
        let parts: Vec<&str> = pair.splitn(2, '=').collect();
        if parts.len() != 2 || parts[0].is_empty() {
            return Err(anyhow::anyhow!("Invalid key=value format: {}", pair));
        }
        map.insert(parts[0].to_string(), parts[1].to_string());
    }
    Ok(map)
}

#[derive(Parser)]
#[command(name = "ragkit")]
#[command(about = "Retrieval-augmented generation demos against a remote inference platform", long_about = None)]
pub struct Cli {
    /// Enable verbose output (info logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Inference server host (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Inference server port (overrides config)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Config file (defaults to .ragkit/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(flatten)]
    Session(SessionCommands),

    /// Configuration management
    Config(config::ConfigArgs),
}

/// Commands that run against the effective configuration
#[derive(Subcommand)]
pub enum SessionCommands {
    /// Check that the inference server is up
    Health,

    /// List catalog models
    Models,

    /// Send a chat completion, one or more turns
    Chat(chat::ChatArgs),

    /// Ingest local files or downloaded documents into a vector store
    Insert(ingest::InsertArgs),

    /// Ingest documents, then run a semantic search
    Search(ingest::SearchArgs),

    /// Answer a question from a single ingested document
    Rag(rag::RagArgs),

    /// Answer a question from two vector stores at once
    MultiRag(rag::MultiRagArgs),

    /// Answer from one store, retrieving only documents with a given source tag
    RagMetadata(rag::RagMetadataArgs),

    /// Compare retrieval with small and large chunks
    Chunking(rag::ChunkingArgs),

    /// Route subtasks to specialist instructions and synthesize the answers
    Route(route::RouteArgs),

    /// Talk to the math service
    Math(math::MathArgs),
}

/// Execute the CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config_service = match &cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new(&PathBuf::from(".")),
    };
    let overrides = ServerOverrides {
        host: cli.host,
        port: cli.port,
    };

    // Dispatched before the file is parsed, so `config init --force` can replace a broken one
    let command = match cli.command {
        Commands::Config(args) => return config::execute(&config_service, &overrides, args),
        Commands::Session(command) => command,
    };
    let session = Session::load(&config_service, &overrides)?;

    let result = match command {
        SessionCommands::Health => server::execute_health(&session).await,
        SessionCommands::Models => server::execute_models(&session).await,
        SessionCommands::Chat(args) => chat::execute(&session, args).await,
        SessionCommands::Insert(args) => ingest::execute_insert(&session, args).await,
        SessionCommands::Search(args) => ingest::execute_search(&session, args).await,
        SessionCommands::Rag(args) => rag::execute_rag(&session, args).await,
        SessionCommands::MultiRag(args) => rag::execute_multi_rag(&session, args).await,
        SessionCommands::RagMetadata(args) => rag::execute_rag_metadata(&session, args).await,
        SessionCommands::Chunking(args) => rag::execute_chunking(&session, args).await,
        SessionCommands::Route(args) => route::execute(&session, args).await,
        SessionCommands::Math(args) => return math::execute(&session, args).await,
    };

    result.map_err(|e| {
        if is_connectivity_error(&e) {
            e.context(format!(
                "Cannot reach the inference server at {}. Is it running? (see --host/--port)",
                session.client.base_url()
            ))
        } else {
            e
        }
    })
}

/// `--host`/`--port`, which win over the file and the environment
pub struct ServerOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl ServerOverrides {
    /// Load the layered configuration and apply the flags on top
    pub fn load(&self, config_service: &ConfigService) -> Result<RagkitConfig> {
        let mut config = config_service.load()?;
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}

/// Effective configuration plus a client for the configured server
pub struct Session {
    pub config: RagkitConfig,
    pub client: StackClient,
}

impl Session {
    fn load(config_service: &ConfigService, overrides: &ServerOverrides) -> Result<Self> {
        let config = overrides.load(config_service)?;
        let client = StackClient::new(&config.server.base_url());
        tracing::debug!(server = %client.base_url(), "Loaded configuration");

        Ok(Self { config, client })
    }

    pub fn store_api(&self) -> Arc<dyn VectorStoreApi> {
        Arc::new(self.client.clone())
    }

    /// Resolve the models and provider a command needs
    pub async fn resolve(&self, needs: ResolveNeeds) -> Result<ResolvedModels> {
        let resolver =
            ModelResolver::new(Arc::new(self.client.clone()), self.config.models.clone());
        let resolved = resolver.resolve(needs).await?;
        tracing::info!(
            chat = resolved.chat_model.as_deref().unwrap_or("-"),
            embedding = resolved.embedding_model.as_deref().unwrap_or("-"),
            provider = resolved.vector_provider.as_deref().unwrap_or("-"),
            "Resolved models"
        );
        Ok(resolved)
    }

    pub fn pipeline(&self) -> IngestionPipeline {
        let policy = PollPolicy::new(
            self.config.ingest.poll_interval(),
            self.config.ingest.timeout(),
        );
        IngestionPipeline::new(self.store_api(), policy)
    }

    pub fn composer(&self) -> RetrievalComposer {
        RetrievalComposer::new(self.store_api())
    }

    /// Chunking from the `[ingest]` config section
    pub fn chunking(&self) -> Result<ChunkingConfig> {
        self.config
            .ingest
            .chunking()
            .context("Invalid chunking settings in [ingest]")
    }
}

/// Stores and files created by a command, removed when it finishes
#[derive(Default)]
pub struct Scratch {
    stores: Vec<StoreId>,
    files: Vec<FileId>,
}

impl Scratch {
    pub fn add_store(&mut self, store: StoreId) {
        self.stores.push(store);
    }

    /// Remember every file that made it to the server, whatever happened after upload
    pub fn add_results(&mut self, results: &[(String, Result<IngestReport, IngestError>)]) {
        for (_, result) in results {
            let file_id = match result {
                Ok(report) => Some(&report.file_id),
                Err(e) => e.file_id(),
            };
            if let Some(id) = file_id {
                self.files.push(id.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty() && self.files.is_empty()
    }

    pub async fn cleanup(self, api: &dyn VectorStoreApi) {
        if self.is_empty() {
            return;
        }
        cleanup(api, &self.stores, &self.files).await;
    }

    /// Print what was left behind instead of deleting it
    pub fn report_kept(&self) {
        for store in &self.stores {
            println!("Kept vector store: {}", store);
        }
        for file in &self.files {
            println!("Kept file: {}", file);
        }
    }

    /// Clean up (or report, with `keep`) and pass the command's result through
    pub async fn finish(
        self,
        api: &dyn VectorStoreApi,
        keep: bool,
        result: Result<()>,
    ) -> Result<()> {
        if keep {
            self.report_kept();
        } else {
            self.cleanup(api).await;
        }
        result
    }
}

/// Print one line per ingested document; returns how many completed
pub fn print_ingest_results(results: &[(String, Result<IngestReport, IngestError>)]) -> usize {
    let mut completed = 0;
    for (filename, result) in results {
        match result {
            Ok(report) => {
                if report.outcome.is_completed() {
                    completed += 1;
                }
                println!("  {} ({}): {}", filename, report.file_id, report.outcome);
            },
            Err(e) => match std::error::Error::source(e) {
                Some(cause) => println!("  {}: {}: {}", filename, e, cause),
                None => println!("  {}: {}", filename, e),
            },
        }
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_metadata_reads_pairs() {
        let map = parse_metadata(&["source=doc_a".to_string(), "q=a=b".to_string()]).unwrap();
        assert_eq!(map.get("source").map(String::as_str), Some("doc_a"));
        assert_eq!(map.get("q").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn parse_metadata_rejects_missing_separator() {
        let err = parse_metadata(&["source".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Invalid key=value format"));
    }

    #[test]
    fn parse_metadata_rejects_empty_key() {
        assert!(parse_metadata(&["=value".to_string()]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn config_is_not_a_session_command() {
        let cli = Cli::try_parse_from(["ragkit", "config", "init", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(_)));

        let cli = Cli::try_parse_from(["ragkit", "rag-metadata", "--source", "doc_b"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Session(SessionCommands::RagMetadata(_))
        ));
    }

    mod scratch {
        use super::*;
        use ragkit::store::Document;
        use ragkit::testing::ScriptedStore;

        #[tokio::test]
        async fn failed_command_still_removes_store_and_uploaded_file() {
            let api = Arc::new(ScriptedStore::new());
            api.fail_attach("doc.txt");
            let pipeline = IngestionPipeline::new(api.clone(), PollPolicy::default());

            let mut scratch = Scratch::default();
            let store = StoreId::from("vs_1");
            scratch.add_store(store.clone());
            let document = Document::from_text("doc.txt", "LoRA adds adapters").unwrap();
            let results = pipeline
                .ingest_all(
                    &store,
                    std::slice::from_ref(&document),
                    &ChunkingConfig::default(),
                    &Attributes::new(),
                )
                .await;
            scratch.add_results(&results);
            let file_id = results[0].1.as_ref().unwrap_err().file_id().unwrap().clone();

            let result = scratch
                .finish(&*api, false, Err(anyhow::anyhow!("not ingested")))
                .await;

            assert!(result.is_err());
            assert_eq!(api.uploaded(), vec!["doc.txt"]);
            assert_eq!(api.deleted_stores(), vec![store]);
            assert_eq!(api.deleted_files(), vec![file_id]);
        }

        #[tokio::test]
        async fn keep_leaves_everything_in_place() {
            let api = ScriptedStore::new();
            let mut scratch = Scratch::default();
            scratch.add_store(StoreId::from("vs_1"));

            scratch.finish(&api, true, Ok(())).await.unwrap();

            assert!(api.deleted_stores().is_empty());
            assert!(api.deleted_files().is_empty());
        }

        #[tokio::test]
        async fn cleanup_failures_do_not_mask_success() {
            let api = ScriptedStore::new();
            api.fail_deletes();
            let mut scratch = Scratch::default();
            scratch.add_store(StoreId::from("vs_1"));

            assert!(scratch.finish(&api, false, Ok(())).await.is_ok());
            assert_eq!(api.deleted_stores(), vec![StoreId::from("vs_1")]);
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["ragkit", "health", "--port", "9000", "--host", "stack"])
            .unwrap();
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.host.as_deref(), Some("stack"));
    }
}
