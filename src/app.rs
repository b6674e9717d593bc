//! Wiring the controller to its collaborators and running it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use plcbridge_adapters::gateway::HttpSampler;
use plcbridge_adapters::location::HttpLocationSource;
use plcbridge_adapters::nats::NatsPublisher;
use plcbridge_core::{LocationSource, NoLocation, PollController};

use crate::settings::AppConfig;

/// Validate the configuration and build a controller for it.
pub fn build_controller(mut config: AppConfig) -> Result<Arc<PollController>> {
    let bridge = config.validate()?;

    let sampler = HttpSampler::builder()
        .endpoint(&config.gateway.endpoint)
        .subscription_period(Duration::from_millis(config.gateway.subscription_period_ms))
        .build()
        .context("failed to set up the gateway client")?;

    let mut publisher = NatsPublisher::builder()
        .url(&config.broker.url)
        .base_topic(&config.broker.topic_name);
    if let Some(name) = &config.broker.client_name {
        publisher = publisher.client_name(name);
    }
    if let Some(creds) = &config.broker.credentials_file {
        publisher = publisher.credentials_file(creds);
    }

    let location: Arc<dyn LocationSource> = match &config.location {
        Some(settings) => Arc::new(
            HttpLocationSource::new(&settings.endpoint)
                .context("failed to set up the location client")?,
        ),
        None => {
            info!("no location endpoint configured, records carry the fallback position");
            Arc::new(NoLocation)
        }
    };

    let controller = PollController::new(
        bridge,
        Arc::new(sampler),
        Arc::new(publisher.build()),
        location,
    )
    .context("failed to open the history store")?;

    Ok(Arc::new(controller))
}

/// Run until interrupted.
///
/// A failure to connect or subscribe at start, or to disconnect at stop, is
/// returned so the process exits non-zero.
pub async fn run(config: AppConfig) -> Result<()> {
    let controller = build_controller(config)?;

    controller.start().await.context("failed to start the bridge")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("shutdown signal received");

    if let Err(e) = controller.stop().await {
        error!(error = %e, "bridge did not stop cleanly");
        return Err(e).context("failed to stop the bridge");
    }

    info!("bridge stopped");
    Ok(())
}
