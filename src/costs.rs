//! Energy cost and savings tracking
//!
//! Meter readings are turned into consumption deltas, and every delta is
//! billed at each series' current unit price. Daily totals reset at local
//! midnight; monthly totals reset when the month changes.

use crate::config::{Config, SensorType};
use crate::coordinator::PriceSnapshot;
use crate::error::Result;
use crate::holidays::HolidayCalendar;
use crate::home_assistant::EnergyReader;
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::JsonStore;
use crate::sensors::{CurrentPrices, PriceKind};
use crate::tariff::TariffCalculator;
use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Inputs and outputs of a running [`CostTracker`]
pub struct MeterFeed<R> {
    pub reader: R,
    pub entity_id: String,
    pub config: Arc<Config>,
    pub holidays: &'static HolidayCalendar,
    /// Published price snapshot used to bill each delta
    pub prices: watch::Receiver<PriceSnapshot>,
    pub publisher: watch::Sender<CostState>,
}

/// `(base, compare)` pairs tracked as savings: `compare` cost minus `base` cost
pub const SAVINGS_PAIRS: [(PriceKind, PriceKind); 3] = [
    (PriceKind::Dynamic, PriceKind::G12),
    (PriceKind::Dynamic, PriceKind::G12w),
    (PriceKind::G12, PriceKind::G12w),
];

/// Accounting period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Daily,
    Monthly,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

/// Turns meter readings into consumption deltas
#[derive(Debug, Clone)]
pub struct EnergyMeter {
    sensor_type: SensorType,
    last_reading: Option<f64>,
}

impl EnergyMeter {
    pub fn new(sensor_type: SensorType) -> Self {
        Self {
            sensor_type,
            last_reading: None,
        }
    }

    pub fn last_reading(&self) -> Option<f64> {
        self.last_reading
    }

    /// Consumption since the previous reading; the first reading yields 0.
    ///
    /// A total-increasing meter that goes backwards contributes nothing; a
    /// daily meter that goes backwards has reset, so the new reading is the
    /// consumption since the reset.
    pub fn delta(&mut self, reading: f64) -> f64 {
        let delta = match self.last_reading {
            None => 0.0,
            Some(last) if reading >= last => reading - last,
            Some(_) => match self.sensor_type {
                SensorType::TotalIncreasing => 0.0,
                SensorType::Daily => reading,
            },
        };
        self.last_reading = Some(reading);
        delta
    }
}

/// Accumulated cost per price series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffCosts {
    pub dynamic: f64,
    pub g12: f64,
    pub g12w: f64,
}

impl TariffCosts {
    pub fn get(&self, kind: PriceKind) -> f64 {
        match kind {
            PriceKind::Dynamic => self.dynamic,
            PriceKind::G12 => self.g12,
            PriceKind::G12w => self.g12w,
        }
    }

    fn add(&mut self, kind: PriceKind, amount: f64) {
        match kind {
            PriceKind::Dynamic => self.dynamic += amount,
            PriceKind::G12 => self.g12 += amount,
            PriceKind::G12w => self.g12w += amount,
        }
    }
}

/// Accumulated savings of each tracked pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    pub dynamic_vs_g12: f64,
    pub dynamic_vs_g12w: f64,
    pub g12_vs_g12w: f64,
}

impl Savings {
    /// Savings of `base` over `compare`, if that pair is tracked
    pub fn get(&self, base: PriceKind, compare: PriceKind) -> Option<f64> {
        match (base, compare) {
            (PriceKind::Dynamic, PriceKind::G12) => Some(self.dynamic_vs_g12),
            (PriceKind::Dynamic, PriceKind::G12w) => Some(self.dynamic_vs_g12w),
            (PriceKind::G12, PriceKind::G12w) => Some(self.g12_vs_g12w),
            _ => None,
        }
    }

    fn slot(&mut self, base: PriceKind, compare: PriceKind) -> Option<&mut f64> {
        match (base, compare) {
            (PriceKind::Dynamic, PriceKind::G12) => Some(&mut self.dynamic_vs_g12),
            (PriceKind::Dynamic, PriceKind::G12w) => Some(&mut self.dynamic_vs_g12w),
            (PriceKind::G12, PriceKind::G12w) => Some(&mut self.g12_vs_g12w),
            _ => None,
        }
    }
}

/// Costs and savings of one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub costs: TariffCosts,
    pub savings: Savings,
}

impl PeriodTotals {
    fn bill(&mut self, delta: f64, prices: &CurrentPrices) {
        for kind in PriceKind::ALL {
            if let Some(price) = prices.get(kind) {
                self.costs.add(kind, delta * price);
            }
        }
        for (base, compare) in SAVINGS_PAIRS {
            if let (Some(b), Some(c)) = (prices.get(base), prices.get(compare))
                && let Some(slot) = self.savings.slot(base, compare)
            {
                *slot += delta * (c - b);
            }
        }
    }
}

/// Persisted cost counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostState {
    #[serde(default)]
    pub daily: PeriodTotals,

    #[serde(default)]
    pub monthly: PeriodTotals,

    /// Local date the daily totals belong to
    #[serde(default)]
    pub period_date: Option<NaiveDate>,
}

impl CostState {
    pub fn totals(&self, period: Period) -> &PeriodTotals {
        match period {
            Period::Daily => &self.daily,
            Period::Monthly => &self.monthly,
        }
    }
}

/// Accumulates costs from meter readings
pub struct CostTracker {
    meter: EnergyMeter,
    state: CostState,
    store: Option<JsonStore>,
    logger: StructuredLogger,
}

impl CostTracker {
    pub fn new(sensor_type: SensorType) -> Self {
        Self {
            meter: EnergyMeter::new(sensor_type),
            state: CostState::default(),
            store: None,
            logger: get_logger("costs"),
        }
    }

    /// Persist counters through `store`
    pub fn with_store(mut self, store: JsonStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn state(&self) -> &CostState {
        &self.state
    }

    /// Restore counters saved by a previous run
    pub async fn restore(&mut self) {
        let Some(store) = &self.store else { return };
        match store.load::<CostState>().await {
            Ok(Some(state)) => {
                self.logger.debug("Restored cost counters");
                self.state = state;
            }
            Ok(None) => {}
            Err(e) => self
                .logger
                .error(&format!("Ignoring unreadable cost counters: {}", e)),
        }
    }

    /// Start new periods when `today` has moved on. Returns whether any
    /// counter was reset.
    pub fn roll_period(&mut self, today: NaiveDate) -> bool {
        match self.state.period_date {
            Some(previous) if previous == today => false,
            Some(previous) => {
                self.state.daily = PeriodTotals::default();
                if (previous.year(), previous.month()) != (today.year(), today.month()) {
                    self.state.monthly = PeriodTotals::default();
                    self.logger.info("New month, monthly costs reset");
                }
                self.state.period_date = Some(today);
                true
            }
            None => {
                self.state.period_date = Some(today);
                true
            }
        }
    }

    /// Bill one meter reading at `prices`; returns the consumption delta
    pub fn record_reading(&mut self, reading: f64, prices: &CurrentPrices) -> f64 {
        let delta = self.meter.delta(reading);
        if delta > 0.0 {
            self.state.daily.bill(delta, prices);
            self.state.monthly.bill(delta, prices);
        }
        delta
    }

    /// Read the meter once and bill it
    pub async fn poll_once<R: EnergyReader>(
        &mut self,
        reader: &R,
        entity_id: &str,
        prices: &CurrentPrices,
        today: NaiveDate,
    ) -> Result<f64> {
        let rolled = self.roll_period(today);
        let delta = match reader.read_energy(entity_id).await? {
            Some(reading) => self.record_reading(reading, prices),
            None => {
                self.logger
                    .debug(&format!("{} has no numeric state", entity_id));
                0.0
            }
        };
        if rolled || delta > 0.0 {
            self.persist().await;
        }
        Ok(delta)
    }

    async fn persist(&self) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.state).await
        {
            self.logger
                .error(&format!("Failed to save cost counters: {}", e));
        }
    }

    /// Poll the meter every `period` until `shutdown` changes
    pub async fn run<R: EnergyReader>(
        mut self,
        feed: MeterFeed<R>,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let MeterFeed {
            reader,
            entity_id,
            config,
            holidays,
            prices,
            publisher,
        } = feed;
        let tz: Tz = match config.tz() {
            Ok(tz) => tz,
            Err(e) => {
                self.logger.error(&format!("Cost tracking disabled: {}", e));
                return;
            }
        };
        let calculator = TariffCalculator::new(holidays);
        publisher.send_replace(self.state.clone());

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let now = Utc::now().with_timezone(&tz);
            let current = {
                let snapshot = prices.borrow();
                CurrentPrices::at(&snapshot, &config, &calculator, &now)
            };
            if let Err(e) = self
                .poll_once(&reader, &entity_id, &current, now.date_naive())
                .await
            {
                self.logger
                    .warn(&format!("Failed to read {}: {}", entity_id, e));
            }
            publisher.send_replace(self.state.clone());
        }

        self.logger.info("Cost tracker stopped");
    }
}
