use std::collections::BTreeMap;

/// Hour of day (0-23) to unit price in PLN/kWh
pub type PriceMap = BTreeMap<u32, f64>;

/// Number of hourly slots in a full delivery day
pub const HOURS_PER_DAY: usize = 24;

/// Outcome of a successful parse
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPrices {
    /// Parsed hourly prices
    pub prices: PriceMap,

    /// False when upstream published fewer than 24 distinct hours
    pub complete: bool,
}

impl ParsedPrices {
    pub fn new(prices: PriceMap) -> Self {
        let complete = prices.len() >= HOURS_PER_DAY;
        Self { prices, complete }
    }
}
