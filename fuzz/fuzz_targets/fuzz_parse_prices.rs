#![no_main]
use energy_hub::tge::PriceParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only well-formed JSON reaches the parser; everything else is rejected upstream
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let parser = PriceParser::new();
    if let Some(parsed) = parser.parse(&value) {
        assert!(parsed.prices.keys().all(|hour| *hour < 24));
        assert_eq!(parsed.complete, parsed.prices.len() == 24);
    }

    let _ = PriceParser::with_hour_shift(1).parse(&value);
});
