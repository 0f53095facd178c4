//! HTTP server entry point: loads configuration, wires the vector backend
//! and model provider, and serves the ingest/ask API over axum.

use clap::Parser;
use payops_rag::api::{self, AppState};
use payops_rag::answer::Answerer;
use payops_rag::chunker::Chunker;
use payops_rag::config::{AppConfig, VectorBackendConfig};
use payops_rag::guardrail::Guardrail;
use payops_rag::ingest::Ingestor;
use payops_rag::llm::ProviderFactory;
use payops_rag::retrieve::Retriever;
use payops_rag::vector::azure_search::{AzureAiSearchConfig, AzureAiSearchVectorIndex};
use payops_rag::vector::memory::InMemoryVectorIndex;
use payops_rag::vector::opensearch::{OpenSearchConfig, OpenSearchVectorIndex};
use payops_rag::vector::postgres::PostgresVectorIndex;
use payops_rag::vector::qdrant::{QdrantConfig, QdrantVectorIndex};
use payops_rag::vector::redis::RedisVectorIndex;
use payops_rag::vector::VectorIndex;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rag-server", about = "Payment-ops runbook RAG server")]
struct Cli {
    /// Path to a JSON/TOML/YAML config file. Falls back to built-in defaults
    /// (in-memory vector backend, no provider configured) when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,
}

async fn build_vector_index(config: &VectorBackendConfig) -> anyhow::Result<Arc<dyn VectorIndex>> {
    let index: Arc<dyn VectorIndex> = match config {
        VectorBackendConfig::InMemory => Arc::new(InMemoryVectorIndex::new()),
        VectorBackendConfig::Qdrant {
            base_url,
            collection_name,
            api_key,
            timeout_secs,
        } => Arc::new(QdrantVectorIndex::new(QdrantConfig {
            base_url: base_url.clone(),
            collection: collection_name.clone(),
            api_key: api_key.clone(),
            timeout_secs: *timeout_secs,
        })),
        VectorBackendConfig::AzureAiSearch {
            base_url,
            index_name,
            api_key,
            timeout_secs,
        } => Arc::new(AzureAiSearchVectorIndex::new(AzureAiSearchConfig {
            endpoint: base_url.clone(),
            index_name: index_name.clone(),
            api_key: api_key.clone(),
            timeout_secs: *timeout_secs,
            ..Default::default()
        })),
        VectorBackendConfig::Postgres {
            connection_string,
            table_name: _,
        } => Arc::new(PostgresVectorIndex::connect(connection_string, 30).await?),
        VectorBackendConfig::Redis {
            connection_string,
            index_name,
        } => Arc::new(RedisVectorIndex::connect(connection_string, index_name).await?),
        VectorBackendConfig::OpenSearch {
            base_url,
            index_name,
            username,
            password,
            timeout_secs,
        } => Arc::new(OpenSearchVectorIndex::new(OpenSearchConfig {
            base_url: base_url.clone(),
            index_name: index_name.clone(),
            username: username.clone(),
            password: password.clone(),
            timeout_secs: *timeout_secs,
        })),
    };
    Ok(index)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => {
            info!("no --config given, using built-in in-memory defaults (no model provider configured)");
            AppConfig {
                chunker: Default::default(),
                ingest: Default::default(),
                retriever: Default::default(),
                answerer: Default::default(),
                vector_backend: VectorBackendConfig::InMemory,
                model_provider: payops_rag::llm::ProviderSettings {
                    tag: payops_rag::llm::ProviderTag::OpenAi,
                    api_key: std::env::var("OPENAI_API_KEY").ok(),
                    base_url: None,
                    chat_model: "gpt-4o-mini".to_string(),
                    embedding_model: Some("text-embedding-3-small".to_string()),
                    max_tokens: 4096,
                    temperature: 0.1,
                    timeout_secs: 120,
                    options: serde_json::json!({}),
                },
                vector_dimension: 1536,
            }
        }
    };
    config.validate()?;

    let vector_index = build_vector_index(&config.vector_backend).await?;
    vector_index.initialize(config.vector_dimension).await?;

    let chat_model = ProviderFactory::build_chat_model(&config.model_provider)?;
    let embedder = ProviderFactory::build_embedder(&config.model_provider)?;

    let ingestor = Arc::new(Ingestor::new(
        Chunker::new(config.chunker.clone()),
        embedder.clone(),
        vector_index.clone(),
        config.ingest.clone(),
    ));
    let retriever = Retriever::new(embedder, vector_index.clone(), config.retriever.clone());
    let answerer = Arc::new(Answerer::new(
        Guardrail::new(),
        retriever,
        chat_model,
        config.answerer.clone(),
    ));

    let state = AppState {
        ingestor,
        answerer,
        vector_index,
        default_top_k: config.retriever.default_top_k,
    };

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("listening on {}", cli.listen);
    axum::serve(listener, api::router(state)).await?;

    Ok(())
}
