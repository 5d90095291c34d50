use crate::config::ApiConfig;
use crate::error::{EnergyHubError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::tge::parser::PriceParser;
use crate::tge::types::ParsedPrices;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::USER_AGENT;
use std::time::Duration;

/// Source of one delivery day's hourly prices
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Prices for `delivery_date`, or `None` when nothing usable came back
    async fn fetch_prices(&self, delivery_date: NaiveDate) -> Option<ParsedPrices>;
}

/// HTTP client for the TGE quote endpoint
pub struct TgeClient {
    client: reqwest::Client,
    url: String,
    limit: u32,
    user_agent: String,
    parser: PriceParser,
    logger: StructuredLogger,
}

impl TgeClient {
    /// Create a client from API settings
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| EnergyHubError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: cfg.url.clone(),
            limit: cfg.limit,
            user_agent: cfg.user_agent.clone(),
            parser: PriceParser::with_hour_shift(cfg.hour_shift_minutes),
            logger: get_logger("tge"),
        })
    }

    /// The endpoint keys day-ahead quotes one day before delivery
    pub fn query_date(delivery_date: NaiveDate) -> Option<NaiveDate> {
        delivery_date.pred_opt()
    }

    /// Raw quote records for `query_date`, or `None` on any failure
    pub async fn fetch_quotes(&self, query_date: NaiveDate) -> Option<serde_json::Value> {
        let day = query_date.format("%Y-%m-%d").to_string();
        let date_from = format!("{} 00:00:00", day);
        let date_to = format!("{} 23:59:59", day);
        let limit = self.limit.to_string();

        self.logger
            .debug(&format!("Requesting TGE quotes for {}", day));

        let response = match self
            .client
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .query(&[
                ("source", "TGE"),
                ("contract", "Fix_1"),
                ("date_from", date_from.as_str()),
                ("date_to", date_to.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                self.logger.error(&format!(
                    "TGE request for {} failed: {}",
                    day,
                    EnergyHubError::from(e)
                ));
                return None;
            }
        };

        if !response.status().is_success() {
            self.logger
                .error(&format!("TGE API error for {}: {}", day, response.status()));
            return None;
        }

        match response.json::<serde_json::Value>().await {
            Ok(body) => Some(body),
            Err(e) => {
                self.logger
                    .error(&format!("Invalid TGE response for {}: {}", day, e));
                None
            }
        }
    }
}

#[async_trait]
impl PriceSource for TgeClient {
    async fn fetch_prices(&self, delivery_date: NaiveDate) -> Option<ParsedPrices> {
        let query_date = Self::query_date(delivery_date)?;
        let raw = self.fetch_quotes(query_date).await?;
        self.parser.parse(&raw)
    }
}
