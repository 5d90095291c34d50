use chrono::{NaiveDate, TimeZone};
use chrono_tz::Europe::Warsaw;
use energy_hub::config::{
    Config, EnergySensorConfig, HomeAssistantConfig, OperationMode, PriceUnit, SensorType,
};
use energy_hub::coordinator::PriceSnapshot;
use energy_hub::costs::{CostState, CostTracker};
use energy_hub::holidays::polish_holidays;
use energy_hub::sensors::{
    CurrentPrices, Extreme, Recommendation, SensorContext, SensorState, SensorValue,
    build_sensor_states, cheapest_hour, extreme, format_hour, is_price_spike, recommend,
};
use energy_hub::tariff::{TariffCalculator, TariffSettings};
use energy_hub::tge::PriceMap;

fn ramp() -> PriceMap {
    // 0.20 at night rising to 0.43 at 23:00
    (0..24).map(|h| (h, 0.2 + f64::from(h) / 100.0)).collect()
}

fn snapshot(today: PriceMap) -> PriceSnapshot {
    PriceSnapshot {
        today: Some(today),
        today_date: NaiveDate::from_ymd_opt(2025, 1, 15),
        api_connected: true,
        last_update_success: true,
        ..Default::default()
    }
}

fn comparison_config() -> Config {
    Config {
        operation_mode: OperationMode::Comparison,
        g12: Some(TariffSettings::g12_default()),
        g12w: Some(TariffSettings::g12w_default()),
        ..Config::default()
    }
}

fn energy_sensor() -> EnergySensorConfig {
    EnergySensorConfig {
        entity_id: "sensor.house_energy".to_string(),
        sensor_type: SensorType::TotalIncreasing,
        poll_interval_secs: 60,
        home_assistant: HomeAssistantConfig::default(),
    }
}

fn find<'a>(states: &'a [SensorState], key: &str) -> &'a SensorState {
    states
        .iter()
        .find(|s| s.key == key)
        .unwrap_or_else(|| panic!("no sensor {}", key))
}

#[test]
fn extremes_report_every_matching_hour() {
    let prices = PriceMap::from([(1, 0.3), (5, 0.1), (9, 0.5), (17, 0.1), (20, 0.5)]);
    assert_eq!(extreme(&prices, Extreme::Min), Some((0.1, vec![5, 17])));
    assert_eq!(extreme(&prices, Extreme::Max), Some((0.5, vec![9, 20])));
    assert_eq!(cheapest_hour(&prices), Some(5));
    assert_eq!(format_hour(5), "05:00");
    assert_eq!(extreme(&PriceMap::new(), Extreme::Min), None);
}

#[test]
fn spike_compares_against_daily_average() {
    let mut prices: PriceMap = (0..24).map(|h| (h, 0.5)).collect();
    prices.insert(18, 1.2);
    let snap = snapshot(prices);

    assert!(is_price_spike(&snap, &Warsaw.with_ymd_and_hms(2025, 1, 15, 18, 10, 0).unwrap()));
    assert!(!is_price_spike(&snap, &Warsaw.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()));
    assert!(!is_price_spike(
        &PriceSnapshot::default(),
        &Warsaw.with_ymd_and_hms(2025, 1, 15, 18, 0, 0).unwrap()
    ));
}

#[test]
fn spike_with_zero_average() {
    let zeros: PriceMap = (0..24).map(|h| (h, 0.0)).collect();
    let now = Warsaw.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap();
    assert!(!is_price_spike(&snapshot(zeros), &now));
}

#[test]
fn recommendation_prefers_cheapest_and_breaks_ties_in_order() {
    let prices = CurrentPrices {
        dynamic: Some(0.6),
        g12: Some(0.5),
        g12w: Some(0.55),
    };
    assert_eq!(recommend(&prices), Recommendation::G12);

    let tie = CurrentPrices {
        dynamic: Some(0.5),
        g12: Some(0.5),
        g12w: Some(0.5),
    };
    assert_eq!(recommend(&tie), Recommendation::Dynamic);

    let only_fixed = CurrentPrices {
        dynamic: None,
        g12: Some(0.8),
        g12w: Some(0.55),
    };
    assert_eq!(recommend(&only_fixed), Recommendation::G12w);
    assert_eq!(recommend(&CurrentPrices::default()), Recommendation::NoData);
}

#[test]
fn dynamic_mode_entities() {
    let config = Config::default();
    let snap = snapshot(ramp());
    let ctx = SensorContext {
        config: &config,
        snapshot: &snap,
        calculator: TariffCalculator::new(polish_holidays()),
        costs: None,
        now: Warsaw.with_ymd_and_hms(2025, 1, 15, 7, 30, 0).unwrap(),
    };
    let states = build_sensor_states(&ctx);

    let current = find(&states, "current_price_dynamic");
    assert_eq!(current.value, Some(SensorValue::Number(0.27)));
    assert_eq!(current.unit, Some("PLN/kWh"));

    let min = find(&states, "min_price_today");
    assert_eq!(min.value, Some(SensorValue::Number(0.2)));
    assert_eq!(min.attributes["hour"], "00:00");

    assert_eq!(find(&states, "min_price_tomorrow").value, None);
    assert_eq!(
        find(&states, "cheapest_hour_today").value,
        Some(SensorValue::Text("00:00".to_string()))
    );
    assert_eq!(find(&states, "api_status").value, Some(SensorValue::Flag(true)));
    assert!(states.iter().all(|s| !s.key.starts_with("cost_")));
}

#[test]
fn mwh_unit_scales_dynamic_prices() {
    let config = Config {
        unit: PriceUnit::Mwh,
        ..Config::default()
    };
    let snap = snapshot(ramp());
    let ctx = SensorContext {
        config: &config,
        snapshot: &snap,
        calculator: TariffCalculator::new(polish_holidays()),
        costs: None,
        now: Warsaw.with_ymd_and_hms(2025, 1, 15, 23, 0, 0).unwrap(),
    };
    let states = build_sensor_states(&ctx);

    let current = find(&states, "current_price_dynamic");
    assert_eq!(current.value, Some(SensorValue::Number(430.0)));
    assert_eq!(current.unit, Some("PLN/MWh"));
}

#[test]
fn g12_mode_entities() {
    let config = Config {
        operation_mode: OperationMode::G12,
        g12: Some(TariffSettings::g12_default()),
        energy_sensor: Some(energy_sensor()),
        ..Config::default()
    };
    let snap = PriceSnapshot::default();
    let ctx = SensorContext {
        config: &config,
        snapshot: &snap,
        calculator: TariffCalculator::new(polish_holidays()),
        costs: None,
        now: Warsaw.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap(),
    };
    let states = build_sensor_states(&ctx);

    assert_eq!(
        find(&states, "current_price_g12").value,
        Some(SensorValue::Number(0.80))
    );
    assert_eq!(
        find(&states, "current_tariff_g12").value,
        Some(SensorValue::Text("szczyt".to_string()))
    );
    // Counters not running yet
    assert_eq!(find(&states, "cost_g12_daily").value, None);
    assert!(states.iter().all(|s| s.key != "current_price_dynamic"));
}

#[test]
fn comparison_mode_with_costs() {
    let config = Config {
        energy_sensor: Some(energy_sensor()),
        ..comparison_config()
    };
    let snap = snapshot(ramp());
    let now = Warsaw.with_ymd_and_hms(2025, 1, 18, 10, 0, 0).unwrap();
    let calculator = TariffCalculator::new(polish_holidays());

    // Saturday 10:00: dynamic 0.30, G12 peak 0.80, G12w off-peak 0.55
    let prices = CurrentPrices::at(&snap, &config, &calculator, &now);
    let mut tracker = CostTracker::new(SensorType::TotalIncreasing);
    tracker.roll_period(now.date_naive());
    tracker.record_reading(100.0, &prices);
    tracker.record_reading(110.0, &prices);
    let costs: CostState = tracker.state().clone();

    let ctx = SensorContext {
        config: &config,
        snapshot: &snap,
        calculator,
        costs: Some(&costs),
        now,
    };
    let states = build_sensor_states(&ctx);

    let rec = find(&states, "recommendation");
    assert_eq!(rec.value, Some(SensorValue::Text("dynamiczna".to_string())));
    assert_eq!(rec.attributes["costs"]["dynamic"], 3.0);
    assert_eq!(rec.attributes["costs"]["g12"], 8.0);
    assert_eq!(rec.attributes["costs"]["g12w"], 5.5);
    assert_eq!(rec.attributes["savings_g12"], -5.0);
    assert_eq!(rec.attributes["savings_g12w"], -2.5);
    assert_eq!(rec.attributes["savings_dynamic"], 0.0);

    assert_eq!(
        find(&states, "savings_dynamic_vs_g12_daily").value,
        Some(SensorValue::Number(5.0))
    );
    assert_eq!(
        find(&states, "savings_g12_vs_g12w_monthly").value,
        Some(SensorValue::Number(-2.5))
    );
    assert_eq!(
        find(&states, "current_tariff_g12w").value,
        Some(SensorValue::Text("poza_szczytem".to_string()))
    );
}
