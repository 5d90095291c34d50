//! Day-rollover price coordinator
//!
//! Keeps "today" and "tomorrow" price maps current. Each refresh cycle:
//!
//! 1. shifts tomorrow into today once the calendar date has advanced,
//! 2. fetches today when missing or stale,
//! 3. fetches tomorrow when missing or stale (failure here is expected
//!    until upstream publishes, usually early afternoon),
//! 4. persists the state if anything changed,
//! 5. fails the cycle when there is still nothing for today.
//!
//! There is no inline retry: a failed cycle is retried on the next tick.

use crate::error::{EnergyHubError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::{JsonStore, PersistedCache};
use crate::tge::{PriceMap, PriceSource};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Today's and tomorrow's prices with their delivery dates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyPriceState {
    pub today: Option<PriceMap>,
    pub today_date: Option<NaiveDate>,
    pub tomorrow: Option<PriceMap>,
    pub tomorrow_date: Option<NaiveDate>,
}

impl DailyPriceState {
    /// Whether any prices are held for "today"
    pub fn has_today(&self) -> bool {
        self.today.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Shift tomorrow into today when `current` is past today's date.
    /// Returns whether the state changed.
    pub fn roll_over(&mut self, current: NaiveDate) -> bool {
        match self.today_date {
            Some(date) if date < current => {
                self.today = self.tomorrow.take();
                self.today_date = self.tomorrow_date.take();
                true
            }
            _ => false,
        }
    }

    fn needs_today(&self, current: NaiveDate) -> bool {
        !self.has_today() || self.today_date != Some(current)
    }

    fn needs_tomorrow(&self, next: NaiveDate) -> bool {
        self.tomorrow.as_ref().is_none_or(PriceMap::is_empty) || self.tomorrow_date != Some(next)
    }

    fn from_cache(cache: PersistedCache) -> Self {
        let non_empty = |m: Option<PriceMap>| m.filter(|p| !p.is_empty());
        Self {
            today: non_empty(cache.today),
            today_date: cache.today_date,
            tomorrow: non_empty(cache.tomorrow),
            tomorrow_date: cache.tomorrow_date,
        }
    }
}

/// Read-only view handed to consumers after each cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub today: Option<PriceMap>,
    pub today_date: Option<NaiveDate>,
    pub tomorrow: Option<PriceMap>,
    pub tomorrow_date: Option<NaiveDate>,
    pub api_connected: bool,
    pub last_update_time: Option<DateTime<Utc>>,
    pub last_update_success: bool,
}

/// Owns the [`DailyPriceState`] and drives refresh cycles
pub struct PriceCoordinator<S> {
    source: S,
    store: JsonStore,
    state: DailyPriceState,
    api_connected: bool,
    last_update_time: Option<DateTime<Utc>>,
    cache_loaded: bool,
    logger: StructuredLogger,
}

impl<S: PriceSource> PriceCoordinator<S> {
    pub fn new(source: S, store: JsonStore) -> Self {
        Self {
            source,
            store,
            state: DailyPriceState::default(),
            api_connected: false,
            last_update_time: None,
            cache_loaded: false,
            logger: get_logger("coordinator"),
        }
    }

    /// Start from a known state instead of the durable cache
    pub fn with_state(mut self, state: DailyPriceState) -> Self {
        self.state = state;
        self.api_connected = self.state.has_today();
        self.cache_loaded = true;
        self
    }

    pub fn state(&self) -> &DailyPriceState {
        &self.state
    }

    pub fn api_connected(&self) -> bool {
        self.api_connected
    }

    /// Current state as a snapshot
    pub fn snapshot(&self, last_update_success: bool) -> PriceSnapshot {
        PriceSnapshot {
            today: self.state.today.clone(),
            today_date: self.state.today_date,
            tomorrow: self.state.tomorrow.clone(),
            tomorrow_date: self.state.tomorrow_date,
            api_connected: self.api_connected,
            last_update_time: self.last_update_time,
            last_update_success,
        }
    }

    /// Run one refresh cycle at local time `now`
    pub async fn refresh(&mut self, now: DateTime<Tz>) -> Result<PriceSnapshot> {
        if !self.cache_loaded {
            self.load_cache().await;
            self.cache_loaded = true;
        }

        let today = now.date_naive();
        let mut updated = false;

        if self.state.roll_over(today) {
            self.logger.debug(&format!(
                "Day changed, moving prices for {} to today",
                today
            ));
            updated = true;
        }

        if self.state.needs_today(today) {
            self.logger
                .info(&format!("No prices for today ({}), fetching", today));
            if let Some(prices) = self.fetch(today, now).await {
                self.state.today = Some(prices);
                self.state.today_date = Some(today);
                self.api_connected = true;
                updated = true;
            }
        }
        if !self.state.has_today() {
            self.api_connected = false;
        }

        if let Some(tomorrow) = today.succ_opt()
            && self.state.needs_tomorrow(tomorrow)
        {
            self.logger
                .debug(&format!("No prices for tomorrow ({}), fetching", tomorrow));
            if let Some(prices) = self.fetch(tomorrow, now).await {
                self.state.tomorrow = Some(prices);
                self.state.tomorrow_date = Some(tomorrow);
                updated = true;
            } else {
                self.logger
                    .debug(&format!("Prices for {} not published yet", tomorrow));
            }
        }

        if updated {
            self.save_cache().await;
        }

        if !self.state.has_today() {
            return Err(EnergyHubError::update_failed(format!(
                "No energy prices available for {}",
                today
            )));
        }

        Ok(self.snapshot(true))
    }

    /// Drive `refresh` every `period` until `shutdown` changes, publishing a
    /// snapshot after every cycle. An in-flight cycle is abandoned on shutdown.
    pub async fn run(
        mut self,
        tz: Tz,
        period: Duration,
        publisher: watch::Sender<PriceSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            let now = Utc::now().with_timezone(&tz);
            let outcome = tokio::select! {
                outcome = self.refresh(now) => outcome,
                _ = shutdown.changed() => break,
            };

            let snapshot = match outcome {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    self.logger.error(&format!("Price refresh failed: {}", e));
                    self.snapshot(false)
                }
            };
            publisher.send_replace(snapshot);
        }

        self.logger.info("Price coordinator stopped");
    }

    async fn fetch(&mut self, date: NaiveDate, now: DateTime<Tz>) -> Option<PriceMap> {
        let parsed = self.source.fetch_prices(date).await?;
        if parsed.prices.is_empty() {
            return None;
        }
        self.logger.info(&format!(
            "Fetched {} hourly prices for {}",
            parsed.prices.len(),
            date
        ));
        self.last_update_time = Some(now.with_timezone(&Utc));
        Some(parsed.prices)
    }

    async fn load_cache(&mut self) {
        match self.store.load::<PersistedCache>().await {
            Ok(Some(cache)) => {
                self.logger.debug("Loaded prices from durable cache");
                self.api_connected = cache.api_connected;
                self.last_update_time = cache.last_update_time;
                self.state = DailyPriceState::from_cache(cache);
            }
            Ok(None) => {}
            Err(e) => {
                self.logger
                    .error(&format!("Ignoring unreadable price cache: {}", e));
            }
        }
    }

    async fn save_cache(&self) {
        let cache = PersistedCache {
            today: self.state.today.clone(),
            today_date: self.state.today_date,
            tomorrow: self.state.tomorrow.clone(),
            tomorrow_date: self.state.tomorrow_date,
            last_update_time: self.last_update_time,
            api_connected: self.api_connected,
        };
        if let Err(e) = self.store.save(&cache).await {
            self.logger
                .error(&format!("Failed to save price cache: {}", e));
        }
    }
}
