use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use message_bus::{JetStreamQueue, NatsClient};
use std::process::ExitCode;
use std::sync::Arc;
use street_ingestor::{
    catalog_client::CatalogClient, cli::Cli, database::PgDocumentSink, run_pipeline, Config,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .json()
        .init();

    // Invalid arguments fail before any connection is attempted
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            error!("Invalid arguments: {:?}", e.kind());
            let _ = e.print();
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Street ingestor failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting Street Ingestor for {}...", cli.city);

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    info!("Configuration loaded successfully");

    let nats = NatsClient::connect(&config.nats.client_config())
        .await
        .context("Failed to connect to NATS")?;
    let queue = JetStreamQueue::open(nats, config.nats.queue_config())
        .await
        .context("Failed to open work queue")?;

    info!("Work queue {} ready", config.nats.queue);

    let sink = PgDocumentSink::connect(&config.database)
        .await
        .context("Failed to connect to document store")?;

    let source = CatalogClient::new(&config.source).context("Failed to create catalog client")?;

    info!("Street catalog client initialized");

    let report = run_pipeline(
        Arc::new(source),
        Arc::new(queue),
        Arc::new(sink),
        cli.city,
        config.consumer.max_deliveries,
    )
    .await
    .context("Ingestion run failed")?;

    info!(
        "Run {} complete: {} published, {} inserted, {} dead-lettered",
        report.published.run_id,
        report.published.published,
        report.consumed.inserted,
        report.consumed.dead_lettered
    );

    Ok(())
}
