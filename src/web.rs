//! Axum-based read-only JSON API

use crate::config::Config;
use crate::coordinator::PriceSnapshot;
use crate::costs::CostState;
use crate::holidays::HolidayCalendar;
use crate::sensors::{SensorContext, build_sensor_states};
use crate::tariff::TariffCalculator;
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::Utc;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub snapshot_rx: watch::Receiver<PriceSnapshot>,
    /// Present when an energy sensor is tracked
    pub costs_rx: Option<watch::Receiver<CostState>>,
    pub holidays: &'static HolidayCalendar,
}

pub(crate) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(crate) async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(json!({
        "version": env!("APP_VERSION"),
        "operation_mode": state.config.operation_mode.as_str(),
        "api_connected": snapshot.api_connected,
        "last_update_success": snapshot.last_update_success,
        "last_update_time": snapshot.last_update_time,
        "today_date": snapshot.today_date,
        "tomorrow_date": snapshot.tomorrow_date,
        "today_hours": snapshot.today.as_ref().map_or(0, |p| p.len()),
        "tomorrow_hours": snapshot.tomorrow.as_ref().map_or(0, |p| p.len()),
    }))
}

pub(crate) async fn prices(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(json!({
        "unit": "PLN/kWh",
        "today": {"date": snapshot.today_date, "prices": snapshot.today},
        "tomorrow": {"date": snapshot.tomorrow_date, "prices": snapshot.tomorrow},
    }))
}

pub(crate) async fn sensors(State(state): State<AppState>) -> impl IntoResponse {
    let tz = match state.config.tz() {
        Ok(tz) => tz,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            );
        }
    };
    let snapshot = state.snapshot_rx.borrow().clone();
    let costs = state.costs_rx.as_ref().map(|rx| rx.borrow().clone());
    let ctx = SensorContext {
        config: &state.config,
        snapshot: &snapshot,
        calculator: TariffCalculator::new(state.holidays),
        costs: costs.as_ref(),
        now: Utc::now().with_timezone(&tz),
    };
    (StatusCode::OK, Json(json!(build_sensor_states(&ctx))))
}

/// Configuration with the Home Assistant token blanked out
pub(crate) async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    let mut value = serde_json::to_value(state.config.as_ref())
        .unwrap_or(json!({"error": "serialization"}));
    if let Some(token) = value.pointer_mut("/energy_sensor/home_assistant/token") {
        *token = serde_json::Value::Null;
    }
    Json(value)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/prices", get(prices))
        .route("/api/sensors", get(sensors))
        .route("/api/config", get(get_config))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serve the API until `shutdown` changes
pub async fn serve(
    state: AppState,
    host: &str,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!(
                "Invalid host '{}'; falling back to 127.0.0.1",
                host
            ));
            ([127, 0, 0, 1], port).into()
        }
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    logger.info(&format!(
        "Web server listening at http://{}:{}",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}
