//! # VRS Node CLI
//!
//! Command-line interface for VRS (Vector Retrieval Store).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vrs_core::{
    HttpIndexClient, OpenAIChatService, OpenAIEmbeddingService, RagEngine, RemoteIndexClient,
    Result, VrsConfig,
};

/// 摄取时接受的纯文本扩展名（PDF/DOCX 解析在系统边界之外）
const TEXT_EXTS: [&str; 2] = ["txt", "md"];

/// CLI structure
#[derive(Parser, Debug)]
#[command(name = "vrs")]
#[command(about = "VRS - Vector Retrieval Store")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a text file or a directory of text files
    Ingest {
        /// File or directory path (.txt / .md)
        path: PathBuf,
        /// Override the document id (defaults to the file stem)
        #[arg(long)]
        doc_id: Option<String>,
    },

    /// Retrieval-augmented question answering
    Query {
        question: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Raw vector search without the LLM
    Search {
        question: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },

    /// Delete all chunks of one document (best-effort)
    DeleteDoc { doc_id: String },

    /// Delete an entity and every relation touching it (best-effort)
    DeleteEntity { name: String },

    /// Drop all data in the current workspace
    Drop {
        /// Confirm the destructive operation
        #[arg(long)]
        yes: bool,
    },

    /// Probe the remote index and print its stats
    Status,
}

async fn ingest_file(engine: &RagEngine, path: &Path, doc_id: Option<&str>) -> Result<()> {
    let text = std::fs::read_to_string(path)?;
    let doc_id = doc_id
        .map(str::to_string)
        .or_else(|| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| path.display().to_string());
    let chunks = engine.insert(&doc_id, &text).await?;
    println!("ingested '{}' as {} chunks", doc_id, chunks);
    Ok(())
}

async fn ingest_path(engine: &RagEngine, path: &Path, doc_id: Option<&str>) -> Result<()> {
    if !path.is_dir() {
        return ingest_file(engine, path, doc_id).await;
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| TEXT_EXTS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    entries.sort();

    if entries.is_empty() {
        warn!("no ingestable files found in {}", path.display());
        return Ok(());
    }
    info!("found {} file(s) in {}, starting ingestion", entries.len(), path.display());
    for file in entries {
        // 单个文件失败不中断整批摄取
        if let Err(e) = ingest_file(engine, &file, None).await {
            error!("failed to ingest {}: {}", file.display(), e);
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = VrsConfig::from_env()?;

    let index: Arc<dyn RemoteIndexClient> = Arc::new(HttpIndexClient::with_config(&config.index)?);

    if let Commands::Status = cli.command {
        let stats = index.describe().await?;
        println!(
            "index reachable: dimension={:?} vectors={:?}",
            stats.dimension, stats.total_vector_count
        );
        return Ok(());
    }

    let embedding = Arc::new(OpenAIEmbeddingService::with_config(&config.embedding)?);
    let chat = Arc::new(OpenAIChatService::with_config(&config.chat)?);
    let engine = RagEngine::bootstrap(&config, Arc::clone(&index), embedding, chat).await?;
    engine.initialize().await?;

    match cli.command {
        Commands::Ingest { path, doc_id } => {
            ingest_path(&engine, &path, doc_id.as_deref()).await?;
        }
        Commands::Query { question, top_k } => {
            let result = engine.query(&question, top_k).await?;
            println!("{}", result.answer);
            if !result.sources.is_empty() {
                println!("\n--- sources ({}) ---", result.sources.len());
                for hit in result.sources {
                    println!(
                        "[{:.3}] {} {}",
                        hit.distance,
                        hit.id().unwrap_or("?"),
                        hit.content().unwrap_or("")
                    );
                }
            }
        }
        Commands::Search { question, top_k } => {
            let hits = engine.search(&question, top_k).await?;
            if hits.is_empty() {
                println!("no matches above the similarity threshold");
            }
            for hit in hits {
                println!(
                    "[{:.3}] {} {}",
                    hit.distance,
                    hit.id().unwrap_or("?"),
                    hit.content().unwrap_or("")
                );
            }
        }
        Commands::DeleteDoc { doc_id } => {
            engine.delete_document(&doc_id).await;
            println!("requested deletion of document '{}'", doc_id);
        }
        Commands::DeleteEntity { name } => {
            engine.delete_entity(&name).await;
            println!("requested deletion of entity '{}' and its relations", name);
        }
        Commands::Drop { yes } => {
            if !yes {
                println!("refusing to drop without --yes");
                return Ok(());
            }
            for (namespace, report) in engine.drop_workspace().await {
                println!("{}: {:?} ({})", namespace, report.status, report.message);
            }
        }
        Commands::Status => unreachable!("handled above"),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
