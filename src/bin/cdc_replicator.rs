//! cdc-replicator: runs the configured replication streams.
//!
//! ## Configuration
//! - CDC_REPLICATOR_CONFIG: YAML configuration file (default: ./config.yaml)
//! - CDC_REPLICATOR__*: overrides of individual settings
//! - CDC_REPLICATOR_LOG: log filter (default: info)
//! - CDC_REPLICATOR_LOG_FORMAT: set to "json" for JSON logs

use std::sync::Arc;

use tracing::{error, info};

use cdc_replicator::config::Config;
use cdc_replicator::connectors::DefaultConnectors;
use cdc_replicator::orchestrator::Orchestrator;
use cdc_replicator::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate()?;

    info!(
        streams = config.streams.len(),
        enabled = config.enabled_streams().count(),
        "Starting cdc-replicator"
    );

    let connectors = DefaultConnectors::new(config.clone()).await?;
    let orchestrator = Orchestrator::new(config, Arc::new(connectors));

    let reports = orchestrator.run(shutdown_signal()).await;

    let failed = reports.iter().filter(|r| r.result.is_err()).count();
    info!(streams = reports.len(), failed, "cdc-replicator stopped");

    Ok(())
}
