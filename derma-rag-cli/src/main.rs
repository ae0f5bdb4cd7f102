//! derma-rag: operator front end for the dermatology context engine.
//!
//! Commands:
//! - index: build the knowledge index (or force a rebuild)
//! - classify: show which retrieval branch a query takes
//! - retrieve: print the context and images retrieved for a query
//! - enhance: print a base prompt augmented for a query
//! - info: print the corpus record matching a name
//! - append: add a record from a JSON file and reindex

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use derma_rag::{
    ContextEngine, EmbeddingProvider, HashingEmbeddingProvider, KnowledgeRecord, QueryRoute,
    RagConfig,
};
use tracing::info;

const DEFAULT_BASE_PROMPT: &str = "Bạn là trợ lý tư vấn da liễu. Hãy trả lời bằng tiếng Việt.";

#[derive(Parser)]
#[command(name = "derma-rag")]
#[command(about = "Retrieval-augmented context for a dermatology assistant", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file; omitted fields take their defaults
    #[arg(short, long, global = true, env = "DERMA_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding diseases.json, hospitals.json, images and the index
    #[arg(short, long, global = true, env = "DERMA_RAG_DATA_DIR", conflicts_with = "config")]
    data_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Dimensions of the local hashing embedder
    #[arg(long, global = true, default_value_t = derma_rag::hashing::DEFAULT_DIMENSIONS)]
    dimensions: usize,

    /// Embed through the OpenAI-compatible API named by EMBEDDING_API_KEY / EMBEDDING_BASE_URL
    #[cfg(feature = "remote")]
    #[arg(long, global = true)]
    remote: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the knowledge index if it is empty
    Index {
        /// Rebuild even if the index already has entries
        #[arg(short, long)]
        force: bool,
    },

    /// Show the retrieval branch for a query
    Classify { query: String },

    /// Print retrieved context and images for a query
    Retrieve {
        query: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the base prompt augmented for a query
    Enhance {
        query: String,

        /// Prompt to augment
        #[arg(short, long, default_value = DEFAULT_BASE_PROMPT)]
        base_prompt: String,
    },

    /// Print the corpus record whose names contain NAME
    Info { name: String },

    /// Append a record from a JSON file and rebuild the index
    Append {
        /// File holding one record object
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let config = load_config(cli.config.as_deref(), cli.data_dir.as_deref())?;
    let provider = embedding_provider(&cli)?;
    let engine = ContextEngine::open(config, provider).await.context("failed to open engine")?;

    match cli.command {
        Commands::Index { force } => {
            let chunks =
                if force { engine.rebuild_index().await? } else { engine.indexed_chunks().await };
            println!("{chunks} chunks indexed in '{}'", engine.config().collection);
        }
        Commands::Classify { query } => {
            let route = match engine.classify(&query) {
                QueryRoute::Directory => "directory",
                QueryRoute::Knowledge => "knowledge",
                QueryRoute::Skip => "skip",
            };
            println!("{route}");
        }
        Commands::Retrieve { query, json } => {
            let result = engine.retrieve_context(&query).await;
            let images: Vec<String> = result
                .images
                .unwrap_or_default()
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            if json {
                let value = serde_json::json!({
                    "route": result.route,
                    "context": result.context,
                    "images": images,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                match result.context {
                    Some(context) => println!("{context}"),
                    None => println!("(no context)"),
                }
                for image in images {
                    println!("image: {image}");
                }
            }
        }
        Commands::Enhance { query, base_prompt } => {
            let enhanced = engine.enhance_prompt(&query, &base_prompt).await;
            println!("{}", enhanced.prompt);
            for image in enhanced.images.unwrap_or_default() {
                println!("image: {}", image.display());
            }
        }
        Commands::Info { name } => match engine.get_entity_info(&name).await {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => anyhow::bail!("no record matches '{name}'"),
        },
        Commands::Append { file } => {
            let record = read_record(&file).await?;
            let name = record.primary_name().to_string();
            engine.append_entity(record).await?;
            info!(entity = %name, "appended");
            println!("appended '{name}'; {} chunks indexed", engine.indexed_chunks().await);
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `level`. Logs go to stderr so stdout stays clean.
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();
}

fn load_config(config: Option<&Path>, data_dir: Option<&Path>) -> Result<RagConfig> {
    match (config, data_dir) {
        (Some(path), _) => RagConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        (None, Some(dir)) => Ok(RagConfig::rooted_at(dir)),
        (None, None) => Ok(RagConfig::default()),
    }
}

fn embedding_provider(cli: &Cli) -> Result<Arc<dyn EmbeddingProvider>> {
    #[cfg(feature = "remote")]
    if cli.remote {
        let provider = derma_rag::RemoteEmbeddingProvider::from_env()?;
        return Ok(Arc::new(provider));
    }

    anyhow::ensure!(cli.dimensions > 0, "--dimensions must be greater than zero");
    Ok(Arc::new(HashingEmbeddingProvider::new(cli.dimensions)))
}

async fn read_record(path: &Path) -> Result<KnowledgeRecord> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))?;
    Ok(KnowledgeRecord::from_value(0, value)?)
}
