use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pulse_sources::SourceId;
use pulse_sync::{build_engine, maybe_build_scheduler, EngineConfig, SourceRegistry};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "pulse-cli")]
#[command(about = "Agency Pulse ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one refresh cycle and print the per-source summary.
    Refresh {
        /// Emit the full result as JSON instead of the text summary.
        #[arg(long)]
        json: bool,
    },
    /// Start the cron scheduler and refresh until interrupted.
    Watch,
    /// Feed a local CSV file through one source's normalizer.
    IngestCsv {
        /// Source id, e.g. `budget-status`.
        source: String,
        /// Path to the CSV file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    let sources = SourceRegistry::load(config.workspace_root.join("sources.yaml")).await?;
    let engine = Arc::new(build_engine(&config, sources)?);

    match cli.command.unwrap_or(Commands::Refresh { json: false }) {
        Commands::Refresh { json } => {
            let Some(result) = engine.refresh().await else {
                anyhow::bail!("a refresh is already in flight");
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).context("serializing refresh result")?
                );
                return Ok(());
            }
            println!(
                "refresh complete: run_id={} sources_ok={}/{} usable={}",
                result.run_id,
                result.success_count,
                result.outcomes.len(),
                result.usable
            );
            for (source, outcome) in &result.outcomes {
                match &outcome.error {
                    None => println!("  {source}: ok"),
                    Some(error) => println!("  {source}: FAILED ({error})"),
                }
            }
        }
        Commands::Watch => {
            let Some(scheduler) = maybe_build_scheduler(&engine, &config).await? else {
                anyhow::bail!("scheduler disabled; set PULSE_SCHEDULER_ENABLED=1");
            };
            scheduler.start().await.context("starting scheduler")?;
            info!(
                crons = %format!("{} | {}", config.refresh_cron_1, config.refresh_cron_2),
                "scheduler running; press ctrl-c to stop"
            );
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
        }
        Commands::IngestCsv { source, path } => {
            let source: SourceId = source.parse()?;
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let records = engine.ingest_csv(source, &text)?;
            println!("ingested {records} records into {source}");
        }
    }

    Ok(())
}
