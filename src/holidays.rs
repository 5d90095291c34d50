//! Polish public holiday calendar
//!
//! The G12w tariff is off-peak all day on statutory holidays. The table is
//! built once per process and handed to the tariff calculator by reference.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// Years covered by the precomputed table; other years are computed on demand
const TABLE_YEARS: RangeInclusive<i32> = 2000..=2100;

static POLISH_HOLIDAYS: Lazy<HolidayCalendar> = Lazy::new(|| HolidayCalendar::polish(TABLE_YEARS));

/// Process-wide Polish holiday table
pub fn polish_holidays() -> &'static HolidayCalendar {
    &POLISH_HOLIDAYS
}

/// Read-only lookup of holiday dates
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    years: Option<RangeInclusive<i32>>,
    dates: BTreeMap<NaiveDate, &'static str>,
}

impl HolidayCalendar {
    /// Build the Polish calendar for a range of years
    pub fn polish(years: RangeInclusive<i32>) -> Self {
        let mut dates = BTreeMap::new();
        for year in years.clone() {
            dates.extend(polish_holidays_for_year(year));
        }
        Self {
            years: Some(years),
            dates,
        }
    }

    /// Calendar from an explicit list of dates (no on-demand fallback)
    pub fn from_dates<I>(dates: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, &'static str)>,
    {
        Self {
            years: None,
            dates: dates.into_iter().collect(),
        }
    }

    /// Whether `date` is a public holiday
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.name(date).is_some()
    }

    /// Holiday name for `date`, if any
    pub fn name(&self, date: NaiveDate) -> Option<&'static str> {
        match &self.years {
            Some(range) if !range.contains(&date.year()) => polish_holidays_for_year(date.year())
                .into_iter()
                .find_map(|(d, name)| (d == date).then_some(name)),
            _ => self.dates.get(&date).copied(),
        }
    }

    /// Whether `date` is a Saturday, Sunday or holiday
    pub fn is_free_day(&self, date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun) || self.is_holiday(date)
    }

    /// All holidays of a given year in calendar order
    pub fn in_year(&self, year: i32) -> Vec<(NaiveDate, &'static str)> {
        match &self.years {
            Some(range) if !range.contains(&year) => polish_holidays_for_year(year),
            _ => self
                .dates
                .iter()
                .filter(|(d, _)| d.year() == year)
                .map(|(d, name)| (*d, *name))
                .collect(),
        }
    }
}

/// Easter Sunday (anonymous Gregorian algorithm)
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

fn polish_holidays_for_year(year: i32) -> Vec<(NaiveDate, &'static str)> {
    let mut fixed: Vec<(u32, u32, &'static str)> = vec![
        (1, 1, "Nowy Rok"),
        (5, 1, "Święto Pracy"),
        (5, 3, "Święto Narodowe Trzeciego Maja"),
        (8, 15, "Wniebowzięcie Najświętszej Marii Panny"),
        (11, 1, "Wszystkich Świętych"),
        (11, 11, "Narodowe Święto Niepodległości"),
        (12, 25, "Boże Narodzenie (pierwszy dzień)"),
        (12, 26, "Boże Narodzenie (drugi dzień)"),
    ];
    if year >= 2011 {
        fixed.push((1, 6, "Święto Trzech Króli"));
    }
    if year >= 2025 {
        fixed.push((12, 24, "Wigilia Bożego Narodzenia"));
    }

    let mut out: Vec<(NaiveDate, &'static str)> = fixed
        .into_iter()
        .filter_map(|(m, d, name)| NaiveDate::from_ymd_opt(year, m, d).map(|date| (date, name)))
        .collect();

    if let Some(easter) = easter_sunday(year) {
        out.push((easter, "Wielkanoc"));
        out.push((easter + Duration::days(1), "Poniedziałek Wielkanocny"));
        out.push((easter + Duration::days(49), "Zielone Świątki"));
        out.push((easter + Duration::days(60), "Boże Ciało"));
    }

    out.sort_by_key(|(date, _)| *date);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_easter_dates() {
        assert_eq!(easter_sunday(2024), Some(date(2024, 3, 31)));
        assert_eq!(easter_sunday(2025), Some(date(2025, 4, 20)));
        assert_eq!(easter_sunday(2026), Some(date(2026, 4, 5)));
    }

    #[test]
    fn test_year_has_expected_count() {
        let cal = polish_holidays();
        assert_eq!(cal.in_year(2024).len(), 13);
        assert_eq!(cal.in_year(2025).len(), 14);
    }

    #[test]
    fn test_out_of_table_years_computed_on_demand() {
        let cal = HolidayCalendar::polish(2024..=2024);
        assert!(cal.is_holiday(date(2030, 11, 11)));
        assert!(!cal.is_holiday(date(2030, 11, 12)));
    }
}
