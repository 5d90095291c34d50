use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone};
use chrono_tz::Europe::Warsaw;
use energy_hub::coordinator::{DailyPriceState, PriceCoordinator};
use energy_hub::error::EnergyHubError;
use energy_hub::persistence::{CACHE_STORAGE_KEY, CACHE_STORAGE_VERSION, JsonStore, PersistedCache};
use energy_hub::tge::{ParsedPrices, PriceMap, PriceSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Price source answering from a fixed table and recording every request
#[derive(Clone, Default)]
struct ScriptedSource {
    responses: Arc<Mutex<HashMap<NaiveDate, PriceMap>>>,
    calls: Arc<Mutex<Vec<NaiveDate>>>,
}

impl ScriptedSource {
    fn publish(&self, date: NaiveDate, prices: PriceMap) {
        self.responses.lock().unwrap().insert(date, prices);
    }

    fn calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceSource for ScriptedSource {
    async fn fetch_prices(&self, delivery_date: NaiveDate) -> Option<ParsedPrices> {
        self.calls.lock().unwrap().push(delivery_date);
        self.responses
            .lock()
            .unwrap()
            .get(&delivery_date)
            .cloned()
            .map(ParsedPrices::new)
    }
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
}

fn flat(price: f64) -> PriceMap {
    (0..24).map(|h| (h, price)).collect()
}

fn at(d: u32, hour: u32) -> chrono::DateTime<chrono_tz::Tz> {
    Warsaw.with_ymd_and_hms(2025, 1, d, hour, 0, 0).unwrap()
}

fn store(dir: &tempfile::TempDir) -> JsonStore {
    JsonStore::new(dir.path(), CACHE_STORAGE_KEY, CACHE_STORAGE_VERSION)
}

#[test]
fn roll_over_promotes_tomorrow() {
    let mut state = DailyPriceState {
        today: Some(flat(0.3)),
        today_date: Some(date(14)),
        tomorrow: Some(flat(0.4)),
        tomorrow_date: Some(date(15)),
    };
    assert!(state.roll_over(date(15)));
    assert_eq!(state.today, Some(flat(0.4)));
    assert_eq!(state.today_date, Some(date(15)));
    assert_eq!(state.tomorrow, None);
    assert_eq!(state.tomorrow_date, None);

    // Same day: nothing moves
    assert!(!state.roll_over(date(15)));
    assert_eq!(state.today, Some(flat(0.4)));
}

#[test]
fn roll_over_without_tomorrow_clears_today() {
    let mut state = DailyPriceState {
        today: Some(flat(0.3)),
        today_date: Some(date(14)),
        ..Default::default()
    };
    assert!(state.roll_over(date(15)));
    assert!(!state.has_today());
    assert_eq!(state.today_date, None);
}

#[tokio::test]
async fn cold_start_fetches_both_days_and_saves() {
    let tmp = tempfile::tempdir().unwrap();
    let source = ScriptedSource::default();
    source.publish(date(15), flat(0.3));
    source.publish(date(16), flat(0.35));

    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp));
    let snapshot = coordinator.refresh(at(15, 14)).await.unwrap();

    assert_eq!(snapshot.today, Some(flat(0.3)));
    assert_eq!(snapshot.tomorrow, Some(flat(0.35)));
    assert!(snapshot.api_connected);
    assert!(snapshot.last_update_success);
    assert!(snapshot.last_update_time.is_some());
    assert_eq!(source.calls(), vec![date(15), date(16)]);

    let saved: PersistedCache = store(&tmp).load().await.unwrap().unwrap();
    assert_eq!(saved.today_date, Some(date(15)));
    assert_eq!(saved.tomorrow_date, Some(date(16)));
    assert!(saved.api_connected);
}

#[tokio::test]
async fn steady_state_makes_no_requests() {
    let tmp = tempfile::tempdir().unwrap();
    let source = ScriptedSource::default();
    let state = DailyPriceState {
        today: Some(flat(0.3)),
        today_date: Some(date(15)),
        tomorrow: Some(flat(0.35)),
        tomorrow_date: Some(date(16)),
    };

    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp)).with_state(state);
    coordinator.refresh(at(15, 20)).await.unwrap();

    assert!(source.calls().is_empty());
    // Nothing changed, so nothing was written
    assert!(!store(&tmp).path().exists());
}

#[tokio::test]
async fn midnight_rollover_uses_cached_tomorrow() {
    let tmp = tempfile::tempdir().unwrap();
    let source = ScriptedSource::default();
    let state = DailyPriceState {
        today: Some(flat(0.3)),
        today_date: Some(date(15)),
        tomorrow: Some(flat(0.35)),
        tomorrow_date: Some(date(16)),
    };

    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp)).with_state(state);
    let snapshot = coordinator.refresh(at(16, 0)).await.unwrap();

    assert_eq!(snapshot.today, Some(flat(0.35)));
    assert_eq!(snapshot.today_date, Some(date(16)));
    assert_eq!(snapshot.tomorrow, None);
    assert!(snapshot.api_connected);
    // Only the new tomorrow is requested, and it is not published yet
    assert_eq!(source.calls(), vec![date(17)]);
    assert!(store(&tmp).path().exists());
}

#[tokio::test]
async fn rollover_without_tomorrow_refetches_today() {
    let tmp = tempfile::tempdir().unwrap();
    let source = ScriptedSource::default();
    source.publish(date(16), flat(0.5));
    let state = DailyPriceState {
        today: Some(flat(0.3)),
        today_date: Some(date(15)),
        ..Default::default()
    };

    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp)).with_state(state);
    let snapshot = coordinator.refresh(at(16, 0)).await.unwrap();

    assert_eq!(snapshot.today, Some(flat(0.5)));
    assert_eq!(snapshot.today_date, Some(date(16)));
    assert_eq!(source.calls(), vec![date(16), date(17)]);
}

#[tokio::test]
async fn missing_today_fails_cycle_and_disconnects() {
    let tmp = tempfile::tempdir().unwrap();
    let source = ScriptedSource::default();

    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp));
    let err = coordinator.refresh(at(15, 9)).await.unwrap_err();

    assert!(matches!(err, EnergyHubError::UpdateFailed { .. }));
    assert!(err.to_string().contains("2025-01-15"));
    assert!(!coordinator.api_connected());
    assert!(!coordinator.snapshot(false).last_update_success);
}

#[tokio::test]
async fn tomorrow_failure_is_silent() {
    let tmp = tempfile::tempdir().unwrap();
    let source = ScriptedSource::default();
    source.publish(date(15), flat(0.3));

    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp));
    let snapshot = coordinator.refresh(at(15, 10)).await.unwrap();

    assert_eq!(snapshot.today, Some(flat(0.3)));
    assert_eq!(snapshot.tomorrow, None);
    assert!(snapshot.api_connected);

    // Published later in the day: picked up on the next cycle
    source.publish(date(16), flat(0.32));
    let snapshot = coordinator.refresh(at(15, 14)).await.unwrap();
    assert_eq!(snapshot.tomorrow, Some(flat(0.32)));
    assert_eq!(source.calls(), vec![date(15), date(16), date(16)]);
}

#[tokio::test]
async fn cache_hydrates_on_first_refresh_only() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = PersistedCache {
        today: Some(PriceMap::from([(0, 0.30), (1, 0.32)])),
        today_date: Some(date(15)),
        tomorrow: Some(PriceMap::from([(0, 0.28)])),
        tomorrow_date: Some(date(16)),
        last_update_time: None,
        api_connected: true,
    };
    store(&tmp).save(&cache).await.unwrap();

    let source = ScriptedSource::default();
    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp));
    let snapshot = coordinator.refresh(at(15, 12)).await.unwrap();

    assert_eq!(snapshot.today, cache.today);
    assert_eq!(snapshot.tomorrow, cache.tomorrow);
    assert!(snapshot.api_connected);
    assert!(source.calls().is_empty());

    // A later cache write is not read back
    store(&tmp).save(&PersistedCache::default()).await.unwrap();
    let snapshot = coordinator.refresh(at(15, 13)).await.unwrap();
    assert_eq!(snapshot.today, cache.today);
}

#[tokio::test]
async fn corrupt_cache_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(store(&tmp).path(), b"{\"version\": 1, \"key\": ").unwrap();

    let source = ScriptedSource::default();
    source.publish(date(15), flat(0.3));
    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp));
    let snapshot = coordinator.refresh(at(15, 8)).await.unwrap();

    assert_eq!(snapshot.today, Some(flat(0.3)));
    let saved: PersistedCache = store(&tmp).load().await.unwrap().unwrap();
    assert_eq!(saved.today_date, Some(date(15)));
}

#[tokio::test]
async fn stale_cache_with_empty_maps_triggers_fetch() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = PersistedCache {
        today: Some(PriceMap::new()),
        today_date: Some(date(15)),
        ..Default::default()
    };
    store(&tmp).save(&cache).await.unwrap();

    let source = ScriptedSource::default();
    source.publish(date(15), flat(0.3));
    let mut coordinator = PriceCoordinator::new(source.clone(), store(&tmp));
    let snapshot = coordinator.refresh(at(15, 8)).await.unwrap();

    assert_eq!(snapshot.today, Some(flat(0.3)));
    assert_eq!(source.calls()[0], date(15));
}

#[tokio::test]
async fn run_publishes_and_stops_on_shutdown() {
    let tmp = tempfile::tempdir().unwrap();
    let source = ScriptedSource::default();
    let today = chrono::Utc::now().with_timezone(&Warsaw).date_naive();
    source.publish(today, flat(0.3));

    let coordinator = PriceCoordinator::new(source.clone(), store(&tmp));
    let (tx, mut rx) = tokio::sync::watch::channel(Default::default());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(coordinator.run(
        Warsaw,
        std::time::Duration::from_secs(3600),
        tx,
        shutdown_rx,
    ));

    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().today, Some(flat(0.3)));

    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();
}
