use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use dicomancer_relay::{Consumer, PipelineConfig, Producer, SqliteMetadataStore, SqliteQueue};

#[derive(Parser)]
#[command(
    name = "dicomancer-relay",
    about = "Anonymize DICOM files and hand them to metadata extraction"
)]
struct Cli {
    /// Pipeline configuration (TOML); defaults apply when omitted
    #[arg(long, env = "DICOMANCER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Anonymize source files and queue the results
    Produce {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },
    /// Process queued files until the queue is empty
    Consume {
        /// Stop after this many items
        #[arg(long)]
        limit: Option<usize>,
    },
}

pub fn main() -> ExitCode {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .try_init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => match PipelineConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => PipelineConfig::default(),
    };

    let queue = match SqliteQueue::open(&config.queue.path, &config.queue.name) {
        Ok(queue) => queue,
        Err(err) => {
            log::error!("{}: {err}", config.queue.path.display());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Produce { sources } => produce(&config, queue, &sources),
        Command::Consume { limit } => consume(&config, queue, limit),
    }
}

fn produce(config: &PipelineConfig, queue: SqliteQueue, sources: &[PathBuf]) -> ExitCode {
    let anonymizer = match config.anonymizer() {
        Ok(anonymizer) => anonymizer,
        Err(err) => {
            log::error!("Invalid anonymization policy: {err}");
            return ExitCode::FAILURE;
        }
    };

    let producer = Producer::new(queue, anonymizer, config.artifacts.clone());
    let failed = sources
        .iter()
        .filter(|source| producer.process(source).is_none())
        .count();

    log::info!(
        "Queued {} of {} file(s)",
        sources.len() - failed,
        sources.len()
    );
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn consume(config: &PipelineConfig, queue: SqliteQueue, limit: Option<usize>) -> ExitCode {
    let store = match SqliteMetadataStore::open(&config.storage.path) {
        Ok(store) => store,
        Err(err) => {
            log::error!("{}: {err}", config.storage.path.display());
            return ExitCode::FAILURE;
        }
    };

    let mut consumer = Consumer::new(queue, store, config.metadata.clone());
    if let Some(dir) = &config.preview.output_dir {
        consumer = consumer.with_preview_dir(dir.clone());
    }

    let summary = consumer.drain(limit);
    log::info!(
        "Processed {} item(s), {} failed",
        summary.processed,
        summary.failed
    );
    if summary.failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
