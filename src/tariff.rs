//! G12 / G12w tariff calculator
//!
//! A tariff has a peak and an off-peak unit price. Peak windows are written
//! as `start-end` hour ranges (`6-13,15-22`), end-exclusive. Settings may
//! carry separate summer and winter windows; the season is taken from the
//! DST state of the zoned timestamp. G12w is off-peak all day on weekends
//! and Polish public holidays.

use crate::holidays::HolidayCalendar;
use crate::logging::get_logger;
use chrono::{DateTime, TimeDelta, Timelike};
use chrono_tz::{OffsetComponents, Tz};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_PEAK_HOURS;

/// Prices and peak windows of one fixed tariff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TariffSettings {
    /// Peak unit price (PLN/kWh)
    pub price_peak: Option<f64>,

    /// Off-peak unit price (PLN/kWh)
    pub price_offpeak: Option<f64>,

    /// Peak windows used when no seasonal variant applies
    pub hours_peak: Option<String>,

    /// Peak windows while DST is in effect
    pub hours_peak_summer: Option<String>,

    /// Peak windows outside DST
    pub hours_peak_winter: Option<String>,
}

impl TariffSettings {
    pub fn g12_default() -> Self {
        Self {
            price_peak: Some(0.80),
            price_offpeak: Some(0.50),
            hours_peak: Some(DEFAULT_PEAK_HOURS.to_string()),
            ..Self::default()
        }
    }

    pub fn g12w_default() -> Self {
        Self {
            price_peak: Some(0.85),
            price_offpeak: Some(0.55),
            hours_peak: Some(DEFAULT_PEAK_HOURS.to_string()),
            ..Self::default()
        }
    }

    /// Peak-window specification applicable at `at`.
    ///
    /// An empty seasonal entry falls back to `hours_peak`.
    pub fn peak_hours_for(&self, at: &DateTime<Tz>) -> &str {
        let seasonal = if is_summer_time(at) {
            self.hours_peak_summer.as_deref()
        } else {
            self.hours_peak_winter.as_deref()
        };
        seasonal
            .filter(|s| !s.is_empty())
            .or(self.hours_peak.as_deref())
            .unwrap_or("")
    }
}

/// Fixed tariffs supported by the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tariff {
    G12,
    G12w,
}

impl Tariff {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::G12 => "g12",
            Self::G12w => "g12w",
        }
    }
}

/// Pricing zone at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TariffZone {
    #[serde(rename = "szczyt")]
    Peak,
    #[serde(rename = "poza_szczytem")]
    OffPeak,
}

impl TariffZone {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Peak => "szczyt",
            Self::OffPeak => "poza_szczytem",
        }
    }
}

/// Whether DST is in effect at `at`
pub fn is_summer_time(at: &DateTime<Tz>) -> bool {
    at.offset().dst_offset() != TimeDelta::zero()
}

/// Parse `6-13,15-22` into `[(6, 13), (15, 22)]`.
///
/// Any malformed token makes the whole specification empty.
pub fn parse_hour_ranges(spec: &str) -> Vec<(u32, u32)> {
    if spec.trim().is_empty() {
        return Vec::new();
    }

    let parsed: Option<Vec<(u32, u32)>> = spec
        .split(',')
        .map(|part| {
            let mut bounds = part.trim().split('-');
            let start = bounds.next()?.trim().parse::<u32>().ok()?;
            let end = bounds.next()?.trim().parse::<u32>().ok()?;
            if bounds.next().is_some() {
                return None;
            }
            Some((start, end))
        })
        .collect();

    parsed.unwrap_or_else(|| {
        get_logger("tariff").warn(&format!("Invalid hour range format: '{}'", spec));
        Vec::new()
    })
}

/// Half-open peak test: `start <= hour < end` for any window
pub fn is_peak_hour(hour: u32, ranges: &[(u32, u32)]) -> bool {
    ranges
        .iter()
        .any(|(start, end)| *start <= hour && hour < *end)
}

/// Peak test on the hour-of-day of a timestamp
pub fn is_peak_time<T: Timelike>(time: &T, ranges: &[(u32, u32)]) -> bool {
    is_peak_hour(time.hour(), ranges)
}

/// Computes zones and unit prices of the fixed tariffs
#[derive(Debug, Clone, Copy)]
pub struct TariffCalculator<'a> {
    holidays: &'a HolidayCalendar,
}

impl<'a> TariffCalculator<'a> {
    pub fn new(holidays: &'a HolidayCalendar) -> Self {
        Self { holidays }
    }

    /// Zone of `tariff` at `at`
    pub fn zone(&self, tariff: Tariff, at: &DateTime<Tz>, settings: &TariffSettings) -> TariffZone {
        if tariff == Tariff::G12w && self.holidays.is_free_day(at.date_naive()) {
            return TariffZone::OffPeak;
        }

        let ranges = parse_hour_ranges(settings.peak_hours_for(at));
        if is_peak_time(at, &ranges) {
            TariffZone::Peak
        } else {
            TariffZone::OffPeak
        }
    }

    /// Unit price of `tariff` at `at`; an unset price counts as 0
    pub fn price(&self, tariff: Tariff, at: &DateTime<Tz>, settings: &TariffSettings) -> f64 {
        match self.zone(tariff, at, settings) {
            TariffZone::Peak => settings.price_peak.unwrap_or(0.0),
            TariffZone::OffPeak => settings.price_offpeak.unwrap_or(0.0),
        }
    }
}
