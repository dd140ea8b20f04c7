//! Tabhub Ingest - transport and CSV ingestion tool

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabhub_common::logging::{init_logging, LogConfig, LogLevel};
use tabhub_ingest::csv::{
    CsvIngestor, ErrorLog, IngestReport, JsonLinesSink, MemorySink, RowSink,
};
use tabhub_ingest::transform::ColumnRegistry;
use tabhub_ingest::transport::{Transport, TransportDefinition, TransportOptions};
use tabhub_ingest::IngestConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tabhub-ingest")]
#[command(author, version, about = "Tabhub transport and CSV ingestion tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the files of a transport definition
    Transport {
        /// Transport definition (JSON file)
        #[arg(short, long)]
        definition: PathBuf,

        /// Destination directory
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Reuse existing destination files
        #[arg(long)]
        use_cache: bool,
    },

    /// Ingest one CSV file
    Ingest {
        /// Column schema (JSON file)
        #[arg(short, long)]
        schema: PathBuf,

        /// CSV file to ingest
        #[arg(short, long)]
        file: PathBuf,

        /// Write converted rows as JSON lines
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, env = "TABHUB_BATCH_SIZE")]
        batch_size: Option<usize>,

        /// Field delimiter
        #[arg(long, default_value_t = ',')]
        delimiter: char,
    },

    /// Run a transport, then ingest the listed files
    Table {
        /// Column schema (JSON file)
        #[arg(short, long)]
        schema: PathBuf,

        /// Transport definition (JSON file)
        #[arg(short, long)]
        definition: PathBuf,

        /// Files to ingest, relative to the destination directory
        #[arg(long, required = true)]
        csv: Vec<PathBuf>,

        /// Destination directory
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Write converted rows as JSON lines
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_definition(path: &Path) -> Result<TransportDefinition> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transport definition {}", path.display()))?;
    TransportDefinition::from_json(&json)
        .with_context(|| format!("Invalid transport definition {}", path.display()))
}

async fn open_sink(columns: ColumnRegistry, output: Option<&Path>) -> Result<Arc<dyn RowSink>> {
    Ok(match output {
        Some(path) => Arc::new(
            JsonLinesSink::create(path, columns)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Arc::new(MemorySink::new(columns)),
    })
}

async fn ingest_files(
    ingestor: &CsvIngestor,
    sink: Arc<dyn RowSink>,
    files: &[PathBuf],
) -> Result<(usize, ErrorLog)> {
    let mut rows = 0;
    let mut errors = ErrorLog::new();
    for file in files {
        info!(file = %file.display(), "Ingesting");
        let IngestReport {
            rows: ingested,
            errors: file_errors,
            ..
        } = ingestor
            .ingest_file(file, Arc::clone(&sink))
            .await
            .with_context(|| format!("Failed to ingest {}", file.display()))?;
        rows += ingested;
        errors.merge(file_errors);
    }
    Ok((rows, errors))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::new("tabhub-ingest")
        .with_level(log_level)
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    let config = IngestConfig::from_env()?;

    match cli.command {
        Command::Transport {
            definition,
            destination,
            use_cache,
        } => {
            let transport = Transport::resolve(load_definition(&definition)?)?;
            let path = transport
                .run(TransportOptions {
                    destination,
                    verbose: cli.verbose,
                    use_cache,
                })
                .await?;
            info!(path = %path.display(), "Transport complete");
        },
        Command::Ingest {
            schema,
            file,
            output,
            batch_size,
            delimiter,
        } => {
            let delimiter = u8::try_from(delimiter)
                .context("The delimiter must be a single-byte character")?;
            let columns = ColumnRegistry::from_file(&schema)
                .with_context(|| format!("Invalid schema {}", schema.display()))?;
            let sink = open_sink(columns, output.as_deref()).await?;

            let mut ingestor = CsvIngestor::from_config(&config).delimiter(delimiter);
            if let Some(batch_size) = batch_size {
                ingestor = ingestor.batch_size(batch_size);
            }

            let (rows, errors) = ingest_files(&ingestor, sink, &[file]).await?;
            errors.log_summary();
            info!(rows, "Ingestion complete");
        },
        Command::Table {
            schema,
            definition,
            csv,
            destination,
            output,
        } => {
            let transport = Transport::resolve(load_definition(&definition)?)?;
            let directory = transport
                .run(TransportOptions {
                    destination,
                    verbose: cli.verbose,
                    use_cache: true,
                })
                .await?;

            let columns = ColumnRegistry::from_file(&schema)
                .with_context(|| format!("Invalid schema {}", schema.display()))?;
            let sink = open_sink(columns, output.as_deref()).await?;
            let files: Vec<PathBuf> = csv.iter().map(|f| directory.join(f)).collect();

            let ingestor = CsvIngestor::from_config(&config);
            let (rows, errors) = ingest_files(&ingestor, sink, &files).await?;
            errors.log_summary();
            info!(rows, files = files.len(), "Table ingestion complete");
        },
    }

    Ok(())
}
