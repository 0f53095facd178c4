//! Interactive command-line front end: ingest runbooks and ask questions
//! against an in-memory index, without standing up the HTTP server.

use clap::Parser;
use payops_rag::answer::Answerer;
use payops_rag::chunker::Chunker;
use payops_rag::config::AppConfig;
use payops_rag::guardrail::Guardrail;
use payops_rag::ingest::Ingestor;
use payops_rag::llm::{ProviderFactory, ProviderSettings, ProviderTag};
use payops_rag::retrieve::Retriever;
use payops_rag::vector::memory::InMemoryVectorIndex;
use payops_rag::vector::VectorIndex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "rag-cli", about = "Interactive payment-ops runbook RAG shell")]
struct Cli {
    /// Path to a JSON/TOML/YAML config file. Falls back to an in-memory
    /// index with an OpenAI provider read from OPENAI_API_KEY when omitted.
    #[arg(long)]
    config: Option<String>,
}

fn print_help() {
    println!("Commands:");
    println!("  ingest <path>   ingest a single runbook file");
    println!("  ask <question>  ask a question against ingested runbooks");
    println!("  sources         list ingested documents");
    println!("  help            show this message");
    println!("  quit            exit");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig {
            chunker: Default::default(),
            ingest: Default::default(),
            retriever: Default::default(),
            answerer: Default::default(),
            vector_backend: payops_rag::config::VectorBackendConfig::InMemory,
            model_provider: ProviderSettings {
                tag: ProviderTag::OpenAi,
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
        },
    };
    config.validate()?;

    let vector_index = Arc::new(InMemoryVectorIndex::new());
    vector_index.initialize(config.vector_dimension).await?;

    let chat_model = ProviderFactory::build_chat_model(&config.model_provider)?;
    let embedder = ProviderFactory::build_embedder(&config.model_provider)?;

    let ingestor = Ingestor::new(
        Chunker::new(config.chunker.clone()),
        embedder.clone(),
        vector_index.clone(),
        config.ingest.clone(),
    );
    let retriever = Retriever::new(embedder, vector_index.clone(), config.retriever.clone());
    let answerer = Answerer::new(Guardrail::new(), retriever, chat_model, config.answerer.clone());

    println!("Payment-ops runbook RAG shell. Type 'help' for commands.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "quit" | "exit" => break,
            "help" => print_help(),
            "sources" => match vector_index.list_documents().await {
                Ok(documents) => {
                    for doc in documents {
                        println!("{}  {}  {} chunks", doc.id, doc.name, doc.chunk_count);
                    }
                }
                Err(e) => error!("failed to list sources: {e}"),
            },
            "ingest" => {
                let path = rest.trim();
                if path.is_empty() {
                    println!("usage: ingest <path>");
                    continue;
                }
                match std::fs::read_to_string(path) {
                    Ok(text) => {
                        let name = std::path::Path::new(path)
                            .file_name()
                            .and_then(|n| n.to_str())
                            .unwrap_or(path)
                            .to_string();
                        match ingestor.ingest_text(&name, &text, Some(path.to_string())).await {
                            Ok(doc) => println!("ingested {} into {} chunks", doc.name, doc.chunk_count),
                            Err(e) => error!("ingest failed: {e}"),
                        }
                    }
                    Err(e) => error!("could not read {path}: {e}"),
                }
            }
            "ask" => {
                let question = rest.trim();
                if question.is_empty() {
                    println!("usage: ask <question>");
                    continue;
                }
                let response = answerer.ask(question, config.retriever.default_top_k).await;
                println!("{}", response.answer_markdown);
                for citation in &response.citations {
                    println!("  [{}:{}] {}", citation.document_name, citation.chunk_index, citation.snippet);
                }
            }
            other => println!("unknown command '{other}', type 'help'"),
        }
    }

    Ok(())
}
