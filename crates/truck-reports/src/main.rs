//! `truck-reports` -- pulls vehicle status reports out of a mailbox.
//!
//! - `truck-reports ingest` -- fetch and file new report attachments.
//! - `truck-reports reports` -- list the stored report per truck.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use truck_reports::config::{load_config, IngestConfig};
use truck_reports::db::report_repo;
use truck_reports::logging::init_logging;
use truck_reports::{Database, FileStorage, ImapConnector, IngestPipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "truck-reports", about = "Truck report mail ingestion", version)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(short, long, global = true, default_value = "truck-reports.json")]
    config: PathBuf,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new attachments and file them as reports.
    Ingest,

    /// List stored reports.
    Reports {
        /// Print one JSON object per line.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let outcome = match cli.command {
        Commands::Ingest => ingest(&config).await,
        Commands::Reports { json } => list_reports(&config, json),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn ingest(config: &IngestConfig) -> truck_reports::Result<()> {
    let db = Database::open(&config.storage.database_path())?;
    let pipeline = IngestPipeline::new(
        Arc::new(ImapConnector::new(config.imap.clone())),
        Arc::new(db.clone()),
        Arc::new(db),
        Arc::new(FileStorage::new(config.storage.files_directory())),
        PipelineConfig::from_config(config)?,
    );

    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling ingestion");
            cancel.cancel();
        }
    });

    let report = pipeline.ingest_new().await?;
    info!(
        stored = report.attachments_processed(),
        "Processed {} attachment(s)",
        report.attachments_processed()
    );
    println!(
        "{} attachment(s) processed ({} unknown), {} message(s) recorded, {} skipped",
        report.attachments_processed(),
        report.unknown_count(),
        report.recorded_uids.len(),
        report.messages_skipped.len()
    );
    for failure in &report.failures {
        println!("failed: {}", failure);
    }
    Ok(())
}

fn list_reports(config: &IngestConfig, json: bool) -> truck_reports::Result<()> {
    let db = Database::open(&config.storage.database_path())?;
    let files = config.storage.files_directory();

    for report in report_repo::list(&db)? {
        if json {
            match serde_json::to_string(&report) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Could not serialize report '{}': {}", report.truck_name, e),
            }
        } else {
            println!(
                "{}\t{}\t{}\t{}",
                report.truck_name,
                report.original_name.as_deref().unwrap_or("-"),
                files.join(&report.file_name).display(),
                report.stored_at
            );
        }
    }
    Ok(())
}
