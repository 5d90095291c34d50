//! Entity read models
//!
//! Pure functions turning the latest [`PriceSnapshot`] (plus configuration,
//! a clock and optional cost counters) into entity states: current prices,
//! daily extremes, tariff zones, the price-spike and connectivity flags, and
//! the tariff recommendation. Nothing here mutates coordinator state.

use crate::config::{Config, OperationMode, round_to};
use crate::coordinator::PriceSnapshot;
use crate::costs::{CostState, Period, SAVINGS_PAIRS};
use crate::tariff::{Tariff, TariffCalculator};
use crate::tge::PriceMap;
use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Current price above this multiple of today's average counts as a spike
pub const SPIKE_FACTOR: f64 = 1.3;

/// Price series a consumer can be billed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceKind {
    Dynamic,
    G12,
    G12w,
}

impl PriceKind {
    pub const ALL: [Self; 3] = [Self::Dynamic, Self::G12, Self::G12w];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::G12 => "g12",
            Self::G12w => "g12w",
        }
    }
}

/// Which delivery day a sensor describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Day {
    Today,
    Tomorrow,
}

impl Day {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
        }
    }
}

/// Minimum or maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    Min,
    Max,
}

impl Extreme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// Cheapest tariff right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "dynamiczna")]
    Dynamic,
    #[serde(rename = "g12")]
    G12,
    #[serde(rename = "g12w")]
    G12w,
    #[serde(rename = "brak_danych")]
    NoData,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamiczna",
            Self::G12 => "g12",
            Self::G12w => "g12w",
            Self::NoData => "brak_danych",
        }
    }
}

/// Unit prices (PLN/kWh) of each series at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CurrentPrices {
    pub dynamic: Option<f64>,
    pub g12: Option<f64>,
    pub g12w: Option<f64>,
}

impl CurrentPrices {
    /// Prices at `now`; fixed tariffs without settings are `None`
    pub fn at(
        snapshot: &PriceSnapshot,
        config: &Config,
        calculator: &TariffCalculator<'_>,
        now: &DateTime<Tz>,
    ) -> Self {
        let fixed = |tariff: Tariff| {
            config
                .tariff_settings(tariff)
                .map(|settings| calculator.price(tariff, now, settings))
        };
        Self {
            dynamic: current_dynamic_price(snapshot, now),
            g12: fixed(Tariff::G12),
            g12w: fixed(Tariff::G12w),
        }
    }

    pub fn get(&self, kind: PriceKind) -> Option<f64> {
        match kind {
            PriceKind::Dynamic => self.dynamic,
            PriceKind::G12 => self.g12,
            PriceKind::G12w => self.g12w,
        }
    }
}

/// Prices of `day`, if any were published
pub fn day_prices(snapshot: &PriceSnapshot, day: Day) -> Option<&PriceMap> {
    let prices = match day {
        Day::Today => snapshot.today.as_ref(),
        Day::Tomorrow => snapshot.tomorrow.as_ref(),
    };
    prices.filter(|p| !p.is_empty())
}

/// Today's market price for the hour containing `now`
pub fn current_dynamic_price(snapshot: &PriceSnapshot, now: &DateTime<Tz>) -> Option<f64> {
    day_prices(snapshot, Day::Today)?.get(&now.hour()).copied()
}

/// Extreme price and every hour at which it occurs
pub fn extreme(prices: &PriceMap, which: Extreme) -> Option<(f64, Vec<u32>)> {
    let values = prices.values().copied();
    let value = match which {
        Extreme::Min => values.reduce(f64::min)?,
        Extreme::Max => values.reduce(f64::max)?,
    };
    let hours = prices
        .iter()
        .filter(|(_, p)| **p == value)
        .map(|(h, _)| *h)
        .collect();
    Some((value, hours))
}

/// Arithmetic mean of the day's prices
pub fn average(prices: &PriceMap) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    Some(prices.values().sum::<f64>() / prices.len() as f64)
}

/// Earliest hour with the lowest price
pub fn cheapest_hour(prices: &PriceMap) -> Option<u32> {
    let mut best: Option<(u32, f64)> = None;
    for (hour, price) in prices {
        if best.is_none_or(|(_, p)| *price < p) {
            best = Some((*hour, *price));
        }
    }
    best.map(|(hour, _)| hour)
}

/// `7` -> `07:00`
pub fn format_hour(hour: u32) -> String {
    format!("{:02}:00", hour)
}

/// Whether the current price stands out against today's average
pub fn is_price_spike(snapshot: &PriceSnapshot, now: &DateTime<Tz>) -> bool {
    let Some(prices) = day_prices(snapshot, Day::Today) else {
        return false;
    };
    let (Some(current), Some(avg)) = (prices.get(&now.hour()), average(prices)) else {
        return false;
    };
    if avg == 0.0 {
        return *current > 0.0;
    }
    *current > avg * SPIKE_FACTOR
}

/// Cheapest available series; ties keep the earlier of dynamic, G12, G12w
pub fn recommend(prices: &CurrentPrices) -> Recommendation {
    let candidates = [
        (Recommendation::Dynamic, prices.dynamic),
        (Recommendation::G12, prices.g12),
        (Recommendation::G12w, prices.g12w),
    ];
    let mut best: Option<(Recommendation, f64)> = None;
    for (choice, price) in candidates {
        let Some(price) = price.filter(|p| p.is_finite()) else {
            continue;
        };
        if best.is_none_or(|(_, p)| price < p) {
            best = Some((choice, price));
        }
    }
    best.map_or(Recommendation::NoData, |(choice, _)| choice)
}

/// Published value of an entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

/// One entity as exposed on the API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub key: String,
    pub value: Option<SensorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
}

impl SensorState {
    fn new(key: impl Into<String>, value: Option<SensorValue>) -> Self {
        Self {
            key: key.into(),
            value,
            unit: None,
            attributes: Map::new(),
        }
    }

    fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    fn attr(mut self, key: &str, value: Value) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }
}

/// Inputs for one rendering of the entity surface
pub struct SensorContext<'a> {
    pub config: &'a Config,
    pub snapshot: &'a PriceSnapshot,
    pub calculator: TariffCalculator<'a>,
    pub costs: Option<&'a CostState>,
    pub now: DateTime<Tz>,
}

/// All entity states for the configured operation mode
pub fn build_sensor_states(ctx: &SensorContext<'_>) -> Vec<SensorState> {
    let mut out = Vec::new();
    let tracks_energy = ctx.config.energy_sensor.is_some();

    match ctx.config.operation_mode {
        OperationMode::Dynamic => {
            out.push(current_price(ctx, PriceKind::Dynamic));
            for day in [Day::Today, Day::Tomorrow] {
                out.push(extreme_sensor(ctx, day, Extreme::Min));
                out.push(extreme_sensor(ctx, day, Extreme::Max));
            }
            for day in [Day::Today, Day::Tomorrow] {
                out.push(average_sensor(ctx, day));
            }
            for day in [Day::Today, Day::Tomorrow] {
                out.push(cheapest_hour_sensor(ctx, day));
            }
            out.push(price_spike_sensor(ctx));
            out.push(api_status_sensor(ctx));
            if tracks_energy {
                out.extend(cost_sensors(ctx, PriceKind::Dynamic));
            }
        }
        OperationMode::G12 | OperationMode::G12w => {
            let (kind, tariff) = if ctx.config.operation_mode == OperationMode::G12 {
                (PriceKind::G12, Tariff::G12)
            } else {
                (PriceKind::G12w, Tariff::G12w)
            };
            out.push(current_price(ctx, kind));
            out.push(current_tariff_sensor(ctx, tariff));
            if tracks_energy {
                out.extend(cost_sensors(ctx, kind));
            }
        }
        OperationMode::Comparison => {
            for kind in PriceKind::ALL {
                out.push(current_price(ctx, kind));
            }
            out.push(current_tariff_sensor(ctx, Tariff::G12));
            out.push(current_tariff_sensor(ctx, Tariff::G12w));
            out.push(price_spike_sensor(ctx));
            out.push(api_status_sensor(ctx));
            if tracks_energy {
                out.push(recommendation_sensor(ctx));
                for (base, compare) in SAVINGS_PAIRS {
                    for period in [Period::Daily, Period::Monthly] {
                        out.push(savings_sensor(ctx, base, compare, period));
                    }
                }
            }
        }
    }

    out
}

fn price_map_json(prices: Option<&PriceMap>) -> Value {
    let map: Map<String, Value> = prices
        .into_iter()
        .flatten()
        .map(|(hour, price)| (hour.to_string(), json!(price)))
        .collect();
    Value::Object(map)
}

fn number(value: Option<f64>) -> Option<SensorValue> {
    value.map(SensorValue::Number)
}

fn current_price(ctx: &SensorContext<'_>, kind: PriceKind) -> SensorState {
    let key = format!("current_price_{}", kind.as_str());
    match kind {
        PriceKind::Dynamic => {
            let unit = ctx.config.unit;
            let value = current_dynamic_price(ctx.snapshot, &ctx.now).map(|p| unit.scale(p));
            SensorState::new(key, number(value))
                .unit(unit.label())
                .attr("today_prices", price_map_json(ctx.snapshot.today.as_ref()))
                .attr(
                    "tomorrow_prices",
                    price_map_json(ctx.snapshot.tomorrow.as_ref()),
                )
        }
        PriceKind::G12 | PriceKind::G12w => {
            let prices = CurrentPrices::at(ctx.snapshot, ctx.config, &ctx.calculator, &ctx.now);
            SensorState::new(key, number(prices.get(kind))).unit("PLN/kWh")
        }
    }
}

fn extreme_sensor(ctx: &SensorContext<'_>, day: Day, which: Extreme) -> SensorState {
    let key = format!("{}_price_{}", which.as_str(), day.as_str());
    let unit = ctx.config.unit;
    let prices = day_prices(ctx.snapshot, day);
    let found = prices.and_then(|p| extreme(p, which));

    let mut state = SensorState::new(key, number(found.as_ref().map(|(v, _)| unit.scale(*v))))
        .unit(unit.label())
        .attr("prices", price_map_json(prices));
    if let Some((_, hours)) = found {
        let labels: Vec<String> = hours.into_iter().map(format_hour).collect();
        state = match labels.as_slice() {
            [single] => state.attr("hour", json!(single)),
            _ => state.attr("hours", json!(labels)),
        };
    }
    state
}

fn average_sensor(ctx: &SensorContext<'_>, day: Day) -> SensorState {
    let unit = ctx.config.unit;
    let value = day_prices(ctx.snapshot, day)
        .and_then(average)
        .map(|v| unit.scale(v));
    SensorState::new(format!("average_price_{}", day.as_str()), number(value)).unit(unit.label())
}

fn cheapest_hour_sensor(ctx: &SensorContext<'_>, day: Day) -> SensorState {
    let value = day_prices(ctx.snapshot, day)
        .and_then(cheapest_hour)
        .map(|h| SensorValue::Text(format_hour(h)));
    SensorState::new(format!("cheapest_hour_{}", day.as_str()), value)
}

fn current_tariff_sensor(ctx: &SensorContext<'_>, tariff: Tariff) -> SensorState {
    let value = ctx.config.tariff_settings(tariff).map(|settings| {
        SensorValue::Text(
            ctx.calculator
                .zone(tariff, &ctx.now, settings)
                .as_str()
                .to_string(),
        )
    });
    SensorState::new(format!("current_tariff_{}", tariff.as_str()), value)
}

fn price_spike_sensor(ctx: &SensorContext<'_>) -> SensorState {
    SensorState::new(
        "price_spike",
        Some(SensorValue::Flag(is_price_spike(ctx.snapshot, &ctx.now))),
    )
}

fn api_status_sensor(ctx: &SensorContext<'_>) -> SensorState {
    SensorState::new(
        "api_status",
        Some(SensorValue::Flag(ctx.snapshot.api_connected)),
    )
}

fn recommendation_sensor(ctx: &SensorContext<'_>) -> SensorState {
    let prices = CurrentPrices::at(ctx.snapshot, ctx.config, &ctx.calculator, &ctx.now);
    let choice = recommend(&prices);
    let costs = ctx.costs.map(|c| c.monthly.costs).unwrap_or_default();
    let dynamic = costs.get(PriceKind::Dynamic);

    SensorState::new(
        "recommendation",
        Some(SensorValue::Text(choice.as_str().to_string())),
    )
    .attr(
        "costs",
        json!({
            "dynamic": round_to(costs.get(PriceKind::Dynamic), 2),
            "g12": round_to(costs.get(PriceKind::G12), 2),
            "g12w": round_to(costs.get(PriceKind::G12w), 2),
        }),
    )
    .attr(
        "savings_g12",
        json!(round_to(dynamic - costs.get(PriceKind::G12), 2)),
    )
    .attr(
        "savings_g12w",
        json!(round_to(dynamic - costs.get(PriceKind::G12w), 2)),
    )
    .attr("savings_dynamic", json!(0.0))
}

fn cost_sensors(ctx: &SensorContext<'_>, kind: PriceKind) -> Vec<SensorState> {
    [Period::Daily, Period::Monthly]
        .into_iter()
        .map(|period| {
            let value = ctx
                .costs
                .map(|c| round_to(c.totals(period).costs.get(kind), 2));
            SensorState::new(
                format!("cost_{}_{}", kind.as_str(), period.as_str()),
                number(value),
            )
            .unit("PLN")
        })
        .collect()
}

fn savings_sensor(
    ctx: &SensorContext<'_>,
    base: PriceKind,
    compare: PriceKind,
    period: Period,
) -> SensorState {
    let value = ctx
        .costs
        .and_then(|c| c.totals(period).savings.get(base, compare))
        .map(|v| round_to(v, 2));
    SensorState::new(
        format!(
            "savings_{}_vs_{}_{}",
            base.as_str(),
            compare.as_str(),
            period.as_str()
        ),
        number(value),
    )
    .unit("PLN")
}
