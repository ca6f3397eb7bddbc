//! Worker commands: run a standalone worker, inspect the queue, or sweep
//! expired leases by hand.

use std::sync::Arc;

use clap::{Args, Subcommand};
use tokio::sync::watch;

use analyzer_api::Backends;
use analyzer_core::config::AppConfig;
use analyzer_core::error::AppError;
use analyzer_core::traits::WorkQueue;

use crate::output;

/// Worker arguments
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Process jobs until interrupted
    Run {
        /// Override `worker.concurrency`
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Show pending and in-flight queue items
    Stats,
    /// Return expired deliveries to the queue once
    Sweep,
}

/// Execute worker command
pub async fn execute(args: &WorkerArgs, mut config: AppConfig) -> Result<(), AppError> {
    match &args.command {
        WorkerCommand::Run { concurrency } => {
            if let Some(n) = concurrency {
                config.worker.concurrency = (*n).max(1);
            }
            let backends = Backends::connect(&config).await?;
            let worker = analyzer_api::build_worker(&config, &backends)?;

            let (cancel_tx, cancel_rx) = watch::channel(false);
            let handle = tokio::spawn(async move { worker.run(cancel_rx).await });

            output::print_success(&format!(
                "Worker running with {} slot(s); press Ctrl+C to stop",
                config.worker.concurrency
            ));
            analyzer_api::app::shutdown_signal().await;
            let _ = cancel_tx.send(true);
            handle
                .await
                .map_err(|e| AppError::internal(format!("Worker task failed: {}", e)))?;

            backends.close().await;
            output::print_success("Worker stopped");
        }
        WorkerCommand::Stats => {
            let queue = connect_queue(&config).await?;
            let depth = queue.depth().await?;
            println!("Queue '{}':", config.queue.name);
            output::print_kv("Pending", &depth.pending.to_string());
            output::print_kv("In flight", &depth.in_flight.to_string());
        }
        WorkerCommand::Sweep => {
            let queue = connect_queue(&config).await?;
            let requeued = queue.requeue_expired().await?;
            if requeued == 0 {
                output::print_success("No expired deliveries");
            } else {
                output::print_warning(&format!("Returned {} expired deliveries to the queue", requeued));
            }
        }
    }
    Ok(())
}

async fn connect_queue(config: &AppConfig) -> Result<Arc<dyn WorkQueue>, AppError> {
    if config.queue.provider == "memory" {
        output::print_warning("The in-memory queue is private to this process and always empty");
    }
    analyzer_queue::connect(&config.queue).await
}
