//! Home Assistant REST client
//!
//! Reads the user's energy meter through `GET /api/states/<entity_id>`.

use crate::config::HomeAssistantConfig;
use crate::error::{EnergyHubError, Result};
use crate::logging::{StructuredLogger, get_logger};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Environment fallback for the access token
pub const TOKEN_ENV: &str = "HA_TOKEN";

/// Entity state as returned by `/api/states/<entity_id>`
#[derive(Debug, Clone, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
}

/// Source of cumulative energy readings
#[async_trait]
pub trait EnergyReader: Send + Sync {
    /// Latest reading in kWh; `Ok(None)` when the meter has no usable value
    async fn read_energy(&self, entity_id: &str) -> Result<Option<f64>>;
}

/// Home Assistant REST API client
#[derive(Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
    logger: StructuredLogger,
}

impl HomeAssistantClient {
    /// Create a client with an explicit token
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnergyHubError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            logger: get_logger("home_assistant"),
        })
    }

    /// Create a client from configuration, falling back to `HA_TOKEN`
    pub fn from_config(cfg: &HomeAssistantConfig) -> Result<Self> {
        let token = cfg
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .ok_or_else(|| {
                EnergyHubError::config(format!(
                    "Home Assistant token not found in config or {} environment variable",
                    TOKEN_ENV
                ))
            })?;
        Self::new(
            cfg.base_url.clone(),
            token,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    /// Get the state of a specific entity
    pub async fn get_state(&self, entity_id: &str) -> Result<EntityState> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        self.logger
            .trace(&format!("Getting state for entity {}", entity_id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<EntityState>().await?),
            StatusCode::NOT_FOUND => Err(EnergyHubError::api(format!(
                "Entity not found: {}",
                entity_id
            ))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(EnergyHubError::api("Home Assistant authentication failed"))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(EnergyHubError::api(format!(
                    "Home Assistant returned {}: {}",
                    status, body
                )))
            }
        }
    }

    /// Numeric state of an entity; `None` when it is not a number
    pub async fn get_numeric_state(&self, entity_id: &str) -> Result<Option<f64>> {
        let state = self.get_state(entity_id).await?;
        let value = parse_numeric_state(&state.state);
        if value.is_none() {
            self.logger.debug(&format!(
                "{} has no numeric state ('{}')",
                state.entity_id, state.state
            ));
        }
        Ok(value)
    }
}

#[async_trait]
impl EnergyReader for HomeAssistantClient {
    async fn read_energy(&self, entity_id: &str) -> Result<Option<f64>> {
        self.get_numeric_state(entity_id).await
    }
}

/// Numeric value of an entity state; `unknown`, `unavailable` and
/// non-numeric states yield `None`
pub fn parse_numeric_state(state: &str) -> Option<f64> {
    match state {
        "unknown" | "unavailable" | "" => None,
        other => other.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}
