//! Event Insights Pipeline - Main Entry Point
//!
//! Resets the store, connects to NATS and ingests records until interrupted.
//! Fatal setup failures exit with a distinct status per failure class.

use anyhow::Result;
use event_insights_pipeline::{
    config::{AppConfig, LogFormat, LoggingConfig, PipelineVariant},
    consumer::{self, EventConsumer},
    dashboard::{DashboardReader, DashboardReporter},
    error::SetupError,
    ingest::{IngestLoop, SentimentHandler, TransactionHandler},
    metrics::{IngestMetrics, MetricsReporter},
    store::AggregateStore,
    FraudRuleEngine, PassthroughScorer,
};
use futures::StreamExt;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let loaded = AppConfig::load();

    // Logging comes up before the config error is reported.
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    if let Err(e) = init_tracing(&logging) {
        eprintln!("failed to initialize logging: {e:#}");
    }

    match run(loaded).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(exit_code = e.exit_code(), error = %e, "Fatal startup failure");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|e| anyhow::anyhow!(e))
}

async fn run(loaded: Result<AppConfig>) -> Result<(), SetupError> {
    info!("Starting Event Insights Pipeline");

    // Step 1: configuration
    let config = loaded.map_err(|e| SetupError::Config(format!("{e:#}")))?;
    info!(
        variant = ?config.pipeline.variant,
        subject = %config.nats.subject,
        store = %config.store.path,
        "Configuration loaded"
    );

    // Step 2: fresh start, discard any prior store
    match AggregateStore::remove_files(&config.store.path) {
        Ok(true) => info!(path = %config.store.path, "Deleted prior store file"),
        Ok(false) => {}
        Err(source) => {
            return Err(SetupError::StoreReset {
                path: config.store.path.clone().into(),
                source,
            })
        }
    }

    // Step 3: schema
    let mut store = AggregateStore::open(&config.store.path).map_err(SetupError::SchemaInit)?;
    store.initialize().map_err(SetupError::SchemaInit)?;

    // Step 4: inbound stream
    let client = consumer::connect(&config.nats).await?;
    let consumer = EventConsumer::new(client, &config.nats);
    consumer.verify_stream().await?;
    let subscription = consumer.subscribe().await?;

    let metrics = Arc::new(IngestMetrics::new());
    let metrics_task = tokio::spawn(
        MetricsReporter::new(metrics.clone(), config.pipeline.summary_interval_secs).start(),
    );
    let dashboard_task = config.dashboard.enabled.then(|| {
        let reader = DashboardReader::new(
            &config.store.path,
            config.pipeline.variant,
            config.dashboard.recent_limit,
        );
        tokio::spawn(DashboardReporter::new(reader, config.dashboard.interval_secs).start())
    });

    // Step 5: consume until interrupted
    let payloads = subscription.map(|message| message.payload);
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => warn!("Interrupt received"),
            Err(e) => {
                error!(error = %e, "Cannot listen for interrupt; running until the stream ends");
                std::future::pending::<()>().await;
            }
        }
    };

    let store = match config.pipeline.variant {
        PipelineVariant::Sentiment => {
            let handler = SentimentHandler::new(PassthroughScorer);
            let mut ingest = IngestLoop::new(handler, store, metrics.clone());
            ingest.run(payloads, shutdown).await;
            ingest.into_store()
        }
        PipelineVariant::Transaction => {
            let handler = TransactionHandler::new(FraudRuleEngine::new(config.rules.clone()));
            let mut ingest = IngestLoop::new(handler, store, metrics.clone());
            ingest.run(payloads, shutdown).await;
            ingest.into_store()
        }
    };

    // Orderly shutdown
    info!("Pipeline shutting down...");
    metrics_task.abort();
    if let Some(task) = dashboard_task {
        task.abort();
    }
    metrics.print_summary();

    if let Err(e) = store.close() {
        error!(error = %e, "Failed to close aggregate store");
    }
    info!("Consumer shut down");

    Ok(())
}
