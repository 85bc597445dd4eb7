use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use course_qa_core::{
    ingest_folder, AnthropicClient, CharacterNgramEmbedder, ChunkingOptions, DualIndex, Embedder,
    QdrantDualStore, QueryCoordinator, SessionTracker, DEFAULT_MAX_TOOL_ROUNDS,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "course-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection holding one point per course
    #[arg(long, default_value = "course_catalog")]
    catalog_collection: String,

    /// Qdrant collection holding one point per chunk
    #[arg(long, default_value = "course_content")]
    content_collection: String,

    /// Anthropic API key (required for `ask`)
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    anthropic_api_key: Option<String>,

    /// Model identifier used for answering
    #[arg(long, default_value = "claude-sonnet-4-20250514")]
    model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a folder of course transcripts into both indexes.
    Ingest {
        /// Folder containing .txt/.md transcripts, searched recursively.
        #[arg(long)]
        folder: String,
        /// Re-ingest courses whose title is already in the catalog.
        #[arg(long, default_value_t = false)]
        overwrite: bool,
        /// Maximum chunk size in characters.
        #[arg(long, default_value = "800")]
        chunk_max_chars: usize,
        /// Overlap between adjacent chunks in characters.
        #[arg(long, default_value = "100")]
        chunk_overlap_chars: usize,
    },
    /// Ask a question over the ingested courses.
    Ask {
        /// The question to answer.
        #[arg(long)]
        query: String,
        /// Session identifier for conversation continuity.
        #[arg(long)]
        session: Option<String>,
        /// Maximum number of tool rounds before the final answer is forced.
        #[arg(long, default_value_t = DEFAULT_MAX_TOOL_ROUNDS)]
        max_tool_rounds: usize,
    },
    /// List ingested course titles.
    Courses,
}

fn build_index(
    cli: &Cli,
    embedder: CharacterNgramEmbedder,
) -> DualIndex<QdrantDualStore, QdrantDualStore, CharacterNgramEmbedder> {
    let catalog = QdrantDualStore::new(
        &cli.qdrant_url,
        &cli.catalog_collection,
        &cli.content_collection,
        embedder.dimensions(),
    );
    let content = QdrantDualStore::new(
        &cli.qdrant_url,
        &cli.catalog_collection,
        &cli.content_collection,
        embedder.dimensions(),
    );
    DualIndex::new(catalog, content, embedder)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let embedder = CharacterNgramEmbedder::default();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "course-qa boot"
    );

    match &cli.command {
        Command::Ingest {
            folder,
            overwrite,
            chunk_max_chars,
            chunk_overlap_chars,
        } => {
            let options = ChunkingOptions {
                max_chars: *chunk_max_chars,
                overlap_chars: *chunk_overlap_chars,
            };

            let bootstrap = QdrantDualStore::new(
                &cli.qdrant_url,
                &cli.catalog_collection,
                &cli.content_collection,
                embedder.dimensions(),
            );
            bootstrap
                .ensure_collections()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let index = build_index(&cli, embedder);
            let report = ingest_folder(&index, Path::new(folder), options, *overwrite)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if !report.skipped.is_empty() {
                warn!(skipped = report.skipped.len(), folder = %folder, "some documents were skipped");
                for skipped in &report.skipped {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
                }
            }

            info!(
                courses = report.courses.len(),
                chunks = report.chunks_added,
                "ingestion finished"
            );
            println!(
                "{} course(s), {} chunk(s) ingested at {}",
                report.courses.len(),
                report.chunks_added,
                Utc::now().to_rfc3339()
            );
            for title in report.courses {
                println!("  {title}");
            }
        }
        Command::Ask {
            query,
            session,
            max_tool_rounds,
        } => {
            let api_key = cli
                .anthropic_api_key
                .clone()
                .context("ANTHROPIC_API_KEY is required for `ask`")?;

            let index = Arc::new(build_index(&cli, embedder));
            let model = AnthropicClient::new(api_key, cli.model.clone());
            let sessions = SessionTracker::new(2);
            let coordinator = QueryCoordinator::new(index, model, sessions, *max_tool_rounds);

            let session_id = session
                .clone()
                .unwrap_or_else(SessionTracker::generate_session_id);

            let outcome = coordinator
                .answer_query(query, &session_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("{}", outcome.answer);
            if !outcome.sources.is_empty() {
                println!("\nSources:");
                for source in outcome.sources {
                    match &source.link {
                        Some(link) => println!("  {} ({link})", source.label()),
                        None => println!("  {}", source.label()),
                    }
                }
            }
        }
        Command::Courses => {
            let index = build_index(&cli, embedder);
            let titles = index
                .list_courses()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("{} course(s) ingested", titles.len());
            for title in titles {
                println!("  {title}");
            }
        }
    }

    Ok(())
}
