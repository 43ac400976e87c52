//! fleet-monitor server entry point.
//!
//! Starts the fleet event loop and the Axum presentation bridge.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use fleet_monitor::api;
use fleet_monitor::app_state::AppState;
use fleet_monitor::config::MonitorConfig;
use fleet_monitor::connection::WsTransport;
use fleet_monitor::domain::EventBus;
use fleet_monitor::service::FleetService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = MonitorConfig::from_env()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("loading configuration")?;
    tracing::info!(
        addr = %config.listen_addr,
        mode = %config.mode,
        endpoint = %config.push_endpoint,
        "starting fleet-monitor"
    );

    let event_bus = EventBus::new(config.event_bus_capacity);
    let (service, fleet) = FleetService::new(&config, Arc::new(WsTransport::new()), event_bus);
    let service_task = tokio::spawn(service.run());

    let app = api::build_app(AppState::new(fleet.clone()));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await
        .context("serving http")?;

    match fleet.shutdown().await {
        Ok(closed) => tracing::info!(closed, "push connections closing"),
        Err(e) => tracing::warn!(error = %e, "fleet loop already stopped"),
    }
    service_task.await.context("joining fleet loop")?;

    Ok(())
}
