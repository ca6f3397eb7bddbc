//! Job commands: submit a document for analysis and follow it to the end.

use std::io::Write;
use std::time::Duration;

use clap::{Args, Subcommand};

use analyzer_core::error::AppError;
use analyzer_core::types::{DocumentId, JobId};
use analyzer_entity::job::{JobSnapshot, JobStatus};
use analyzer_service::StatusPoller;
use analyzer_service::job::PollUpdate;

use super::client::ApiClient;
use crate::output::{self, OutputFormat};

/// Job arguments
#[derive(Debug, Args)]
pub struct JobArgs {
    /// Server base URL
    #[arg(long, env = "ANALYZER_URL", default_value = "http://localhost:8000")]
    pub server: String,

    /// Bearer token (see `analyzer token`)
    #[arg(long, env = "ANALYZER_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Job subcommand
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Job subcommands
#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Submit an uploaded document for analysis
    Submit {
        /// Document id
        document_id: String,
        /// Analysis prompt
        #[arg(short, long)]
        query: Option<String>,
        /// Follow the job until it finishes
        #[arg(short, long)]
        wait: bool,
        /// Give up waiting after this many seconds
        #[arg(long, default_value = "600")]
        timeout: u64,
    },
    /// Follow an existing job until it finishes
    Watch {
        /// Job id
        job_id: String,
        /// Give up after this many seconds
        #[arg(long, default_value = "600")]
        timeout: u64,
    },
}

/// Execute job command
pub async fn execute(args: &JobArgs, format: OutputFormat) -> Result<(), AppError> {
    let client = ApiClient::new(&args.server, args.token.clone());

    match &args.command {
        JobCommand::Submit {
            document_id,
            query,
            wait,
            timeout,
        } => {
            let document_id: DocumentId = document_id
                .parse()
                .map_err(|_| AppError::validation(format!("Invalid document id: {}", document_id)))?;
            let handle = client.submit(document_id, query.clone()).await?;

            if !wait {
                output::print_item(&handle, format);
                return Ok(());
            }
            if format == OutputFormat::Table {
                output::print_success(&format!("Submitted job {}", handle.job_id));
            }
            watch(&client, handle.job_id, *timeout, format).await
        }
        JobCommand::Watch { job_id, timeout } => {
            let job_id: JobId = job_id
                .parse()
                .map_err(|_| AppError::validation(format!("Invalid job id: {}", job_id)))?;
            watch(&client, job_id, *timeout, format).await
        }
    }
}

async fn watch(
    client: &ApiClient,
    job_id: JobId,
    timeout: u64,
    format: OutputFormat,
) -> Result<(), AppError> {
    let poller = StatusPoller::default().with_deadline(Duration::from_secs(timeout));
    let show_progress = format == OutputFormat::Table;

    let snapshot = poller
        .wait_for_terminal(client, job_id, |update| {
            if show_progress {
                render_progress(update);
            }
        })
        .await?;
    if show_progress {
        println!();
    }

    report(&snapshot, format)
}

fn render_progress(update: &PollUpdate) {
    print!(
        "\r  {:<10} {:>5.1}%",
        update.snapshot.status.to_string(),
        update.percent
    );
    let _ = std::io::stdout().flush();
}

fn report(snapshot: &JobSnapshot, format: OutputFormat) -> Result<(), AppError> {
    if format == OutputFormat::Json {
        output::print_item(snapshot, format);
    } else {
        match (&snapshot.status, &snapshot.analysis_result_ref, &snapshot.error) {
            (JobStatus::Completed, Some(result), _) => {
                output::print_success(&format!("Job {} completed", snapshot.job_id));
                output::print_kv("Analysis", &result.to_string());
            }
            (_, _, error) => {
                output::print_error(&format!(
                    "Job {} failed: {}",
                    snapshot.job_id,
                    error.as_deref().unwrap_or("no reason recorded")
                ));
            }
        }
    }

    if snapshot.status == JobStatus::Failed {
        return Err(AppError::pipeline_failure(format!("Job {} failed", snapshot.job_id)));
    }
    Ok(())
}
