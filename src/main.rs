use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use speech_index::{Config, SearchIndexManager};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "speech-index")]
#[command(version, about = "Keyword search over video transcripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to speech-index.toml or config/speech-index.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the storage root directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find every moment a word is spoken
    Search {
        #[arg(long)]
        video: String,
        #[arg(long, default_value = "en")]
        lang: String,
        /// Word to look for
        query: String,
    },
    /// Build (or load) the index for one video and language
    Build {
        #[arg(long)]
        video: String,
        #[arg(long)]
        lang: String,
    },
    /// Index every language listed in a video's manifest
    Prefetch {
        #[arg(long)]
        video: String,
    },
    /// List persisted indexes
    List,
    /// List supported languages
    Langs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = Config::resolve(cli.config.as_deref())?;
    if let Some(root) = cli.root.clone() {
        config.storage.root = root;
    }

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    info!("📄 Loaded configuration from: {}", source);
    config.validate()?;
    info!("{}", config.summary());

    let manager = SearchIndexManager::from_config(&config);

    match cli.command {
        Commands::Search { video, lang, query } => {
            let lang = lang.to_ascii_lowercase();
            if !config.is_supported_language(&lang) {
                return Err(anyhow!("Unsupported lang: {}", lang));
            }

            let hits = manager
                .search(&video, &lang, &query)
                .await
                .with_context(|| format!("Search failed for video {}", video))?;

            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "video_id": video,
                    "lang": lang,
                    "q": query,
                    "hits": hits,
                }))?
            );
        }

        Commands::Build { video, lang } => {
            let index = manager.get_or_build(&video, &lang).await?;
            info!(
                "✅ Index for {}.{}: {} words, {} occurrences",
                video,
                lang,
                index.len(),
                index.occurrence_count()
            );
        }

        Commands::Prefetch { video } => {
            let report = manager.prefetch(&video).await?;
            if report.indexed.is_empty() && report.skipped.is_empty() {
                warn!("⚠️ Nothing prefetched for {} (no manifest or no languages)", video);
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::List => {
            let indexes = manager.store().list_indexes().await?;

            if indexes.is_empty() {
                info!("📭 No persisted indexes under {}", config.storage.root.display());
                return Ok(());
            }

            for entry in indexes {
                println!("{}\t{}\t{} bytes", entry.video_id, entry.lang, entry.size_bytes);
            }
        }

        Commands::Langs => {
            for (code, name) in &config.languages.supported {
                println!("{}\t{}", code, name);
            }
        }
    }

    Ok(())
}
