//! Quote record parser
//!
//! Records look like
//! `{"date_time": "2025-01-15 13:00:00", "attributes": [{"name": "price", "value": "412.5"}]}`
//! with prices in PLN/MWh. A single malformed record discards the whole
//! batch; a record without a `price` attribute counts as 0.

use crate::config::round_to;
use crate::error::{EnergyHubError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::tge::types::{HOURS_PER_DAY, ParsedPrices, PriceMap};
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde_json::Value;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses quote records into hourly prices
#[derive(Clone)]
pub struct PriceParser {
    hour_shift: TimeDelta,
    logger: StructuredLogger,
}

impl Default for PriceParser {
    fn default() -> Self {
        Self::with_hour_shift(0)
    }
}

impl PriceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subtract `minutes` from each timestamp before taking its hour.
    ///
    /// Some feed revisions label each interval by its end (`01:00:00` is the
    /// 00:00-01:00 slot); a one-minute shift maps those labels back.
    pub fn with_hour_shift(minutes: u32) -> Self {
        Self {
            hour_shift: TimeDelta::minutes(i64::from(minutes)),
            logger: get_logger("tge_parser"),
        }
    }

    /// Parse a raw response body. `None` means "no data".
    pub fn parse(&self, raw: &Value) -> Option<ParsedPrices> {
        let records = match raw.as_array() {
            Some(records) if !records.is_empty() => records,
            Some(_) => {
                self.logger.debug("Quote response is an empty list");
                return None;
            }
            None => {
                self.logger.debug("Quote response is not a list");
                return None;
            }
        };

        let mut prices = PriceMap::new();
        for record in records {
            match self.parse_record(record) {
                Ok((hour, price)) => {
                    prices.insert(hour, price);
                }
                Err(e) => {
                    self.logger.warn(&format!(
                        "Discarding price batch: {}. Record: {}",
                        e, record
                    ));
                    return None;
                }
            }
        }

        let parsed = ParsedPrices::new(prices);
        if !parsed.complete {
            self.logger.warn(&format!(
                "Incomplete price data: expected {} hours, got {}",
                HOURS_PER_DAY,
                parsed.prices.len()
            ));
        }
        Some(parsed)
    }

    fn parse_record(&self, record: &Value) -> Result<(u32, f64)> {
        let obj = record
            .as_object()
            .ok_or_else(|| EnergyHubError::parse("record is not an object"))?;

        let date_time = obj
            .get("date_time")
            .and_then(Value::as_str)
            .ok_or_else(|| EnergyHubError::parse("missing date_time"))?;
        let timestamp = NaiveDateTime::parse_from_str(date_time, TIMESTAMP_FORMAT)
            .map_err(|e| EnergyHubError::parse(format!("bad date_time '{}': {}", date_time, e)))?;
        let hour = timestamp
            .checked_sub_signed(self.hour_shift)
            .ok_or_else(|| EnergyHubError::parse("date_time out of range"))?
            .hour();

        let raw_price = match obj.get("attributes") {
            None => 0.0,
            Some(Value::Array(attributes)) => price_attribute(attributes)?.unwrap_or(0.0),
            Some(_) => return Err(EnergyHubError::parse("attributes is not a list")),
        };

        Ok((hour, round_to(raw_price / 1000.0, 4)))
    }
}

/// Value of the first attribute named `price`
fn price_attribute(attributes: &[Value]) -> Result<Option<f64>> {
    for attr in attributes {
        let name = attr
            .as_object()
            .and_then(|a| a.get("name"))
            .ok_or_else(|| EnergyHubError::parse("attribute without name"))?;
        if name.as_str() != Some("price") {
            continue;
        }
        let value = attr
            .get("value")
            .ok_or_else(|| EnergyHubError::parse("price attribute without value"))?;
        return numeric(value).map(Some);
    }
    Ok(None)
}

fn numeric(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EnergyHubError::parse(format!("price '{}' is not a float", n))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EnergyHubError::parse(format!("price '{}' is not numeric", s))),
        other => Err(EnergyHubError::parse(format!(
            "price '{}' is not numeric",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hour_shift_maps_end_labels() {
        let raw = json!([
            {"date_time": "2025-01-15 01:00:00", "attributes": [{"name": "price", "value": 400}]},
            {"date_time": "2025-01-16 00:00:00", "attributes": [{"name": "price", "value": 500}]}
        ]);
        let parsed = PriceParser::with_hour_shift(1).parse(&raw).unwrap();
        assert_eq!(parsed.prices.get(&0), Some(&0.4));
        assert_eq!(parsed.prices.get(&23), Some(&0.5));
    }

    #[test]
    fn test_attribute_order_is_irrelevant() {
        let raw = json!([{
            "date_time": "2025-01-15 05:00:00",
            "attributes": [{"name": "volume", "value": "12"}, {"name": "price", "value": "123.45678"}]
        }]);
        let parsed = PriceParser::new().parse(&raw).unwrap();
        assert_eq!(parsed.prices.get(&5), Some(&0.1235));
    }

    #[test]
    fn test_non_numeric_price_fails_batch() {
        let raw = json!([
            {"date_time": "2025-01-15 00:00:00", "attributes": [{"name": "price", "value": "300"}]},
            {"date_time": "2025-01-15 01:00:00", "attributes": [{"name": "price", "value": "n/a"}]}
        ]);
        assert!(PriceParser::new().parse(&raw).is_none());
    }
}
