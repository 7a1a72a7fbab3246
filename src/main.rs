//! Ingestion service entrypoint.
//!
//! `serve` (the default) runs once at startup and then on every scheduled tick; `run-once`
//! performs a single run. Either exits with status 1 when a run aborts.
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyingest::{
    config::{self, Config},
    logging,
    metrics::IngestMetrics,
    pipeline::IngestionPipeline,
    scheduler::{self, Schedule, TimerInfo},
};

#[derive(Parser)]
#[command(
    name = "rustyingest",
    about = "Index new documents from a blob container into Azure AI Search"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run at startup and then on the configured schedule.
    Serve,
    /// Perform a single ingestion run and exit.
    RunOnce,
}

#[tokio::main]
async fn main() {
    logging::init_tracing();
    if let Err(err) = run(Cli::parse()).await {
        tracing::error!(error = %format!("{err:#}"), "Ingestion aborted");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::init_config().context("failed to load configuration")?;
    let metrics = Arc::new(IngestMetrics::new());

    match cli.command.unwrap_or(Command::Serve) {
        Command::RunOnce => ingest(&config, &metrics, None).await,
        Command::Serve => {
            let schedule = Schedule::from(&config.schedule);
            tracing::info!(
                interval_secs = schedule.interval.as_secs(),
                run_on_startup = schedule.run_on_startup,
                "Starting ingestion scheduler"
            );
            let (config, metrics) = (&config, &metrics);
            scheduler::run_forever(schedule, move |info| ingest(config, metrics, Some(info))).await
        }
    }
}

/// One run with clients built fresh from the configuration.
async fn ingest(
    config: &Config,
    metrics: &Arc<IngestMetrics>,
    timer: Option<TimerInfo>,
) -> Result<()> {
    if let Some(info) = timer {
        tracing::info!(
            trigger = ?info.trigger,
            scheduled = %info.scheduled_at,
            past_due = info.past_due,
            "Ingestion run triggered"
        );
    }

    let pipeline = IngestionPipeline::from_config(config)
        .context("failed to build ingestion clients")?
        .with_metrics(Arc::clone(metrics));
    let report = pipeline.run().await.context("ingestion run aborted")?;

    tracing::info!(
        indexed = report.indexed.len(),
        already_ingested = report.already_ingested.len(),
        skipped = report.skipped_unsupported.len(),
        failed = report.failed.len(),
        metrics = %serde_json::to_string(&metrics.snapshot()).unwrap_or_default(),
        "Run complete"
    );
    Ok(())
}
