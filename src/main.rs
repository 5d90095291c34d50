use anyhow::Result;
use energy_hub::config::Config;
use energy_hub::coordinator::{PriceCoordinator, PriceSnapshot};
use energy_hub::costs::{CostState, CostTracker, MeterFeed};
use energy_hub::holidays::polish_holidays;
use energy_hub::home_assistant::HomeAssistantClient;
use energy_hub::logging::{get_logger, init_logging};
use energy_hub::persistence::{
    CACHE_STORAGE_KEY, CACHE_STORAGE_VERSION, COSTS_STORAGE_KEY, COSTS_STORAGE_VERSION, JsonStore,
};
use energy_hub::tge::TgeClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Logging: {}", e))?;

    let logger = get_logger("main");
    logger.info(&format!(
        "Energy Hub {} starting in {} mode",
        env!("APP_VERSION"),
        config.operation_mode.as_str()
    ));

    let tz = config.tz()?;
    let config = Arc::new(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    // Price coordinator
    let (snapshot_tx, snapshot_rx) = watch::channel(PriceSnapshot::default());
    let source = TgeClient::new(&config.api)?;
    let store = JsonStore::new(
        &config.storage.directory,
        CACHE_STORAGE_KEY,
        CACHE_STORAGE_VERSION,
    );
    let coordinator = PriceCoordinator::new(source, store);
    tasks.push(tokio::spawn(coordinator.run(
        tz,
        Duration::from_secs(config.refresh.interval_secs),
        snapshot_tx,
        shutdown_rx.clone(),
    )));

    // Energy meter and cost counters
    let mut costs_rx: Option<watch::Receiver<CostState>> = None;
    if let Some(sensor) = &config.energy_sensor {
        match HomeAssistantClient::from_config(&sensor.home_assistant) {
            Ok(reader) => {
                let mut tracker = CostTracker::new(sensor.sensor_type).with_store(JsonStore::new(
                    &config.storage.directory,
                    COSTS_STORAGE_KEY,
                    COSTS_STORAGE_VERSION,
                ));
                tracker.restore().await;
                let (tx, rx) = watch::channel(tracker.state().clone());
                costs_rx = Some(rx);
                let feed = MeterFeed {
                    reader,
                    entity_id: sensor.entity_id.clone(),
                    config: Arc::clone(&config),
                    holidays: polish_holidays(),
                    prices: snapshot_rx.clone(),
                    publisher: tx,
                };
                tasks.push(tokio::spawn(tracker.run(
                    feed,
                    Duration::from_secs(sensor.poll_interval_secs),
                    shutdown_rx.clone(),
                )));
            }
            Err(e) => logger.error(&format!("Cost tracking disabled: {}", e)),
        }
    }

    #[cfg(feature = "web")]
    {
        if config.web.enabled {
            let state = energy_hub::web::AppState {
                config: Arc::clone(&config),
                snapshot_rx: snapshot_rx.clone(),
                costs_rx: costs_rx.clone(),
                holidays: polish_holidays(),
            };
            let host = config.web.host.clone();
            let port = config.web.port;
            let web_shutdown = shutdown_rx.clone();
            let web_logger = logger.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = energy_hub::web::serve(state, &host, port, web_shutdown).await {
                    web_logger.error(&format!("Web server error: {}", e));
                }
            }));
        }
    }
    #[cfg(not(feature = "web"))]
    let _ = costs_rx;

    tokio::signal::ctrl_c().await?;
    logger.info("Shutdown requested");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        let _ = task.await;
    }
    logger.info("Shutdown complete");
    Ok(())
}
