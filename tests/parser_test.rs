use energy_hub::tge::{HOURS_PER_DAY, PriceParser};
use serde_json::{Value, json};

fn record(date_time: &str, price: Value) -> Value {
    json!({
        "date_time": date_time,
        "attributes": [{"name": "price", "value": price}]
    })
}

fn day(hours: u32) -> Value {
    Value::Array(
        (0..hours)
            .map(|h| record(&format!("2025-01-14 {:02}:00:00", h), json!(250.0 + f64::from(h))))
            .collect(),
    )
}

#[test]
fn full_day_converts_mwh_to_kwh() {
    let parsed = PriceParser::new().parse(&day(24)).unwrap();
    assert!(parsed.complete);
    assert_eq!(parsed.prices.len(), HOURS_PER_DAY);
    for (hour, price) in &parsed.prices {
        let expected = ((250.0 + f64::from(*hour)) / 1000.0 * 10_000.0).round() / 10_000.0;
        assert_eq!(*price, expected);
    }
}

#[test]
fn partial_day_is_returned_incomplete() {
    let parsed = PriceParser::new().parse(&day(12)).unwrap();
    assert!(!parsed.complete);
    assert_eq!(parsed.prices.len(), 12);
    assert_eq!(parsed.prices.keys().copied().max(), Some(11));
}

#[test]
fn non_list_inputs_yield_none() {
    let parser = PriceParser::new();
    assert!(parser.parse(&Value::Null).is_none());
    assert!(parser.parse(&json!({"date_time": "2025-01-14 00:00:00"})).is_none());
    assert!(parser.parse(&json!([])).is_none());
}

#[test]
fn missing_date_time_discards_batch() {
    let mut records = day(24);
    records.as_array_mut().unwrap()[5] = json!({"attributes": [{"name": "price", "value": 300}]});
    assert!(PriceParser::new().parse(&records).is_none());
}

#[test]
fn malformed_date_time_discards_batch() {
    let mut records = day(3);
    records.as_array_mut().unwrap()[1] = record("14.01.2025 01:00", json!(300));
    assert!(PriceParser::new().parse(&records).is_none());
}

#[test]
fn attribute_without_name_discards_batch() {
    let mut records = day(24);
    records.as_array_mut().unwrap()[3] = json!({
        "date_time": "2025-01-14 03:00:00",
        "attributes": [{"value": 300}, {"name": "price", "value": 300}]
    });
    assert!(PriceParser::new().parse(&records).is_none());
}

#[test]
fn non_list_attributes_discard_batch() {
    let mut records = day(24);
    records.as_array_mut().unwrap()[0] = json!({
        "date_time": "2025-01-14 00:00:00",
        "attributes": {"name": "price", "value": 300}
    });
    assert!(PriceParser::new().parse(&records).is_none());
}

#[test]
fn missing_price_counts_as_zero() {
    let records = json!([
        {"date_time": "2025-01-14 00:00:00", "attributes": [{"name": "volume", "value": 10}]},
        {"date_time": "2025-01-14 01:00:00"}
    ]);
    let parsed = PriceParser::new().parse(&records).unwrap();
    assert_eq!(parsed.prices[&0], 0.0);
    assert_eq!(parsed.prices[&1], 0.0);
}

#[test]
fn numeric_strings_are_accepted() {
    let records = json!([record("2025-01-14 07:00:00", json!(" 512.34 "))]);
    let parsed = PriceParser::new().parse(&records).unwrap();
    assert_eq!(parsed.prices[&7], 0.5123);
}

#[test]
fn duplicate_hours_keep_last_record() {
    let records = json!([
        record("2025-01-14 09:00:00", json!(100)),
        record("2025-01-14 09:00:00", json!(200)),
    ]);
    let parsed = PriceParser::new().parse(&records).unwrap();
    assert_eq!(parsed.prices.len(), 1);
    assert_eq!(parsed.prices[&9], 0.2);
}
