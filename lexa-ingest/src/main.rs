//! lexa-ingest - corpus ingestion trigger
//!
//! Runs one ingestion over one source file and prints the finalized ingestion
//! record as JSON. Exits non-zero when the run fails; Ctrl-C cancels the run
//! between batches.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexa_common::config::{resolve_database_path, resolve_root_folder, TomlConfig};
use lexa_ingest::{
    CorpusOptions, DictionaryOptions, IngestionPipeline, IngestionRecord, PairOptions,
    PipelineConfig, RunControl,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for lexa-ingest
#[derive(Parser, Debug)]
#[command(name = "lexa-ingest")]
#[command(about = "Ingest linguistic corpora into the Lexa corpus store")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Database file (defaults to <root-folder>/lexa.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Bootstrap config file (defaults to the platform config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Items committed per transaction
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a CoNLL-U treebank
    Corpus {
        /// CoNLL-U file
        path: PathBuf,

        /// Language code stored on sentences and patterns
        #[arg(long)]
        language: String,

        /// Source tag; defaults to the file stem
        #[arg(long)]
        source_name: Option<String>,
    },

    /// Ingest Tatoeba sentence pairs
    Pairs {
        /// sentences.csv or sentences_detailed.csv
        sentences: PathBuf,

        /// links.csv
        links: PathBuf,

        /// Language of the stored sentences
        #[arg(long)]
        source_language: String,

        /// Language of the attached translations
        #[arg(long)]
        target_language: String,

        #[arg(long, default_value = "tatoeba")]
        source_name: String,

        /// Stop after this many pairs
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ingest dictionary entries from a Wiktionary dump
    Dictionary {
        /// pages-articles XML dump
        path: PathBuf,

        /// Language whose sections are read
        #[arg(long)]
        language: String,

        #[arg(long, default_value = "wiktionary")]
        source_name: String,
    },
}

fn source_name_from(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string())
}

fn print_record(record: &IngestionRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialize ingestion record")?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut toml_config = match &args.config {
        Some(path) => TomlConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TomlConfig::load_or_default(),
    };
    toml_config.apply_env_overrides();

    // Initialize tracing
    let level = &toml_config.logging.level;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lexa_ingest={level},lexa_common={level}").into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting lexa-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Some(batch_size) = args.batch_size {
        toml_config.ingest.batch_size = batch_size;
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = resolve_database_path(args.database.as_deref(), &toml_config, &root_folder);
    info!("Database: {}", db_path.display());

    let pool = lexa_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let config = PipelineConfig::from(&toml_config.ingest);
    info!(
        batch_size = config.batch_size,
        common_lemma_rank = config.common_lemma_rank,
        max_error_log = config.max_error_log,
        "Pipeline configured"
    );
    let pipeline = IngestionPipeline::new(pool, config);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after the current batch");
            ctrl_c_token.cancel();
        }
    });
    let control = RunControl::new(cancel);

    let result = match args.command {
        Command::Corpus {
            path,
            language,
            source_name,
        } => {
            let options = CorpusOptions {
                source_name: source_name.unwrap_or_else(|| source_name_from(&path)),
                path,
                language,
            };
            pipeline.ingest_corpus(&options, &control).await
        }
        Command::Pairs {
            sentences,
            links,
            source_language,
            target_language,
            source_name,
            limit,
        } => {
            let options = PairOptions {
                sentences_path: sentences,
                links_path: links,
                source_language,
                target_language,
                source_name,
                limit,
            };
            pipeline.ingest_sentence_pairs(&options, &control).await
        }
        Command::Dictionary {
            path,
            language,
            source_name,
        } => {
            let options = DictionaryOptions {
                path,
                language,
                source_name,
            };
            pipeline.ingest_dictionary(&options, &control).await
        }
    };

    pipeline.pool().close().await;

    match result {
        Ok(record) => print_record(&record),
        Err(err) => {
            if let Some(record) = err.record() {
                print_record(record)?;
            }
            Err(anyhow::Error::new(err).context("Ingestion run failed"))
        }
    }
}
