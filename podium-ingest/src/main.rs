//! PODIUM ingestion entry point
//!
//! Loads configuration, opens the LMDB store, and runs one command. Ctrl-C
//! asks the pipeline to stop after the current team; the process then exits
//! non-zero with a checkpoint left for the next run.

use podium_core::PodiumResult;
use podium_ingest::cli::USAGE;
use podium_ingest::{init_logging, Cli, CliError, Command, IngestJob, JobOutcome, RunOptions};
use podium_remote::RemoteClient;
use podium_storage::LmdbStorage;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::parse(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(CliError::Help) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "podium-ingest failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> PodiumResult<()> {
    let config = cli.load_config()?;
    init_logging(&config.log)?;

    let storage = Arc::new(LmdbStorage::from_config(&config.storage)?);
    let client = Arc::new(RemoteClient::from_config(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Shutdown signal received; stopping after the current team");
            let _ = shutdown_tx.send(true);
        }
    });

    match cli.command {
        Command::Run { force, fresh } => {
            config.validate()?;
            let job = IngestJob::new(config, storage, client).with_shutdown(shutdown_rx);
            let options = RunOptions {
                force,
                resume: !fresh,
            };
            match job.run(options).await? {
                JobOutcome::NotDue { last_update } => {
                    tracing::info!(last_update = ?last_update, "Nothing to do");
                }
                JobOutcome::Completed(report) => {
                    tracing::info!(
                        processed = report.run.processed,
                        failed = report.run.failed,
                        signature_qualified = report.signature_qualified,
                        finished_at = %report.finished_at,
                        "Ingestion complete"
                    );
                }
            }
        }
        Command::Correct { number, status } => {
            let job = IngestJob::new(config, storage, client);
            let stored = job.correct_qualification(&number, status)?;
            println!("{} -> {}", number, stored);
        }
        Command::Status => {
            let job = IngestJob::new(config, storage, client);
            let status = job.status()?;
            match status.checkpoint {
                Some(cp) => println!(
                    "checkpoint: {}/{} teams (last index {}, team {:?}) saved {}",
                    cp.processed_count,
                    cp.total_teams,
                    cp.last_processed_index,
                    cp.last_processed_team_id.map(|id| id.get()),
                    cp.timestamp
                ),
                None => println!("checkpoint: none"),
            }
            match status.last_update {
                Some(at) => println!("last full run: {}", at),
                None => println!("last full run: never"),
            }
        }
    }

    Ok(())
}
