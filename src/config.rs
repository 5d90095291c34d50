//! Configuration management for Energy Hub
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. Each operation mode names the tariff
//! settings it needs; validation enforces that they are present and well
//! formed before anything starts.

use crate::error::{EnergyHubError, Result};
use crate::tariff::{Tariff, TariffSettings, parse_hour_ranges};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

pub use defaults::{DEFAULT_API_URL, DEFAULT_PEAK_HOURS};

/// Environment variable pointing at an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "ENERGY_HUB_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which tariffs are exposed and compared
    pub operation_mode: OperationMode,

    /// IANA timezone used for hour-of-day, DST and calendar-date decisions
    pub timezone: String,

    /// Display unit for dynamic prices
    pub unit: PriceUnit,

    /// G12 tariff settings (required by `g12` and `comparison`)
    pub g12: Option<TariffSettings>,

    /// G12w tariff settings (required by `g12w` and `comparison`)
    pub g12w: Option<TariffSettings>,

    /// Optional energy meter used for cost and savings tracking
    pub energy_sensor: Option<EnergySensorConfig>,

    /// Market-data endpoint configuration
    pub api: ApiConfig,

    /// Refresh cadence of the price coordinator
    pub refresh: RefreshConfig,

    /// Durable store location
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,
}

/// Operation mode of the integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Day-ahead market prices only
    #[default]
    Dynamic,
    /// Fixed two-zone G12 tariff
    G12,
    /// G12 with weekends and holidays off-peak
    G12w,
    /// All three tariffs side by side
    Comparison,
}

impl OperationMode {
    /// Tariffs whose settings this mode needs
    pub fn required_tariffs(self) -> &'static [Tariff] {
        match self {
            Self::Dynamic => &[],
            Self::G12 => &[Tariff::G12],
            Self::G12w => &[Tariff::G12w],
            Self::Comparison => &[Tariff::G12, Tariff::G12w],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::G12 => "g12",
            Self::G12w => "g12w",
            Self::Comparison => "comparison",
        }
    }
}

/// Unit used to present dynamic prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceUnit {
    #[default]
    Kwh,
    Mwh,
}

impl PriceUnit {
    /// Unit of measurement label
    pub fn label(self) -> &'static str {
        match self {
            Self::Kwh => "PLN/kWh",
            Self::Mwh => "PLN/MWh",
        }
    }

    /// Scale a PLN/kWh price into this unit with display rounding
    pub fn scale(self, price_kwh: f64) -> f64 {
        match self {
            Self::Kwh => round_to(price_kwh, 4),
            Self::Mwh => round_to(price_kwh * 1000.0, 2),
        }
    }
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// How the energy meter reports consumption
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    /// Monotonic lifetime counter
    #[default]
    TotalIncreasing,
    /// Counter that resets to zero every day
    Daily,
}

/// Energy meter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergySensorConfig {
    /// Home Assistant entity id, e.g. `sensor.house_energy`
    pub entity_id: String,

    /// Counter semantics of the meter
    #[serde(default)]
    pub sensor_type: SensorType,

    /// How often the meter is polled
    #[serde(default = "defaults::energy_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Home Assistant REST endpoint serving the meter
    #[serde(default)]
    pub home_assistant: HomeAssistantConfig,
}

/// Home Assistant REST API access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAssistantConfig {
    /// Base URL, e.g. `http://localhost:8123`
    pub base_url: String,

    /// Long-lived access token; falls back to `HA_TOKEN`
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Market-data endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Quote endpoint URL
    pub url: String,

    /// Hard request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum number of records requested
    pub limit: u32,

    /// User-Agent header sent with each request
    pub user_agent: String,

    /// Minutes subtracted from each record timestamp before taking the hour.
    /// Set to 1 when the feed labels intervals by their end (`01:00:00` for
    /// hour 0); leave at 0 when labels are interval starts.
    pub hour_shift_minutes: u32,
}

/// Refresh scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Interval between refresh cycles in seconds
    pub interval_secs: u64,
}

/// Durable store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the versioned JSON records
    pub directory: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file (its directory receives the rolling files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Whether the JSON API is served
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first location that exists
    pub fn load() -> Result<Self> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            return Self::from_file(explicit);
        }

        let default_paths = [
            "energy_hub.yaml",
            "/data/energy_hub.yaml",
            "/etc/energy-hub/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        // Fall back to default configuration
        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parsed timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone.parse::<Tz>().map_err(|e| {
            EnergyHubError::validation("timezone", format!("{}: {}", self.timezone, e))
        })
    }

    /// Settings of the given fixed tariff, if configured
    pub fn tariff_settings(&self, tariff: Tariff) -> Option<&TariffSettings> {
        match tariff {
            Tariff::G12 => self.g12.as_ref(),
            Tariff::G12w => self.g12w.as_ref(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.tz()?;

        for tariff in self.operation_mode.required_tariffs() {
            if self.tariff_settings(*tariff).is_none() {
                return Err(EnergyHubError::validation(
                    tariff.as_str(),
                    format!(
                        "Tariff settings are required in {} mode",
                        self.operation_mode.as_str()
                    ),
                ));
            }
        }

        for tariff in [Tariff::G12, Tariff::G12w] {
            if let Some(settings) = self.tariff_settings(tariff) {
                validate_tariff_settings(tariff.as_str(), settings)?;
            }
        }

        if let Some(sensor) = &self.energy_sensor {
            if sensor.entity_id.is_empty() || !validate_entity_id(&sensor.entity_id) {
                return Err(EnergyHubError::validation(
                    "energy_sensor.entity_id",
                    "Must look like sensor.<name>",
                ));
            }
            if sensor.poll_interval_secs == 0 {
                return Err(EnergyHubError::validation(
                    "energy_sensor.poll_interval_secs",
                    "Must be greater than 0",
                ));
            }
            if sensor.home_assistant.base_url.trim().is_empty() {
                return Err(EnergyHubError::validation(
                    "energy_sensor.home_assistant.base_url",
                    "Cannot be empty",
                ));
            }
            if sensor.home_assistant.timeout_secs == 0 {
                return Err(EnergyHubError::validation(
                    "energy_sensor.home_assistant.timeout_secs",
                    "Must be greater than 0",
                ));
            }
        }

        if self.api.url.trim().is_empty() {
            return Err(EnergyHubError::validation("api.url", "Cannot be empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(EnergyHubError::validation(
                "api.timeout_secs",
                "Must be greater than 0",
            ));
        }
        if self.api.limit == 0 {
            return Err(EnergyHubError::validation(
                "api.limit",
                "Must be greater than 0",
            ));
        }
        if self.api.hour_shift_minutes >= 60 {
            return Err(EnergyHubError::validation(
                "api.hour_shift_minutes",
                "Must be less than 60",
            ));
        }

        if self.refresh.interval_secs == 0 {
            return Err(EnergyHubError::validation(
                "refresh.interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.web.enabled && self.web.port == 0 {
            return Err(EnergyHubError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn validate_tariff_settings(prefix: &str, settings: &TariffSettings) -> Result<()> {
    let prices = [
        ("price_peak", settings.price_peak),
        ("price_offpeak", settings.price_offpeak),
    ];
    for (name, price) in prices {
        if let Some(p) = price
            && (!p.is_finite() || p < 0.0)
        {
            return Err(EnergyHubError::validation(
                format!("{}.{}", prefix, name),
                "Must be a non-negative number",
            ));
        }
    }

    let hours = [
        ("hours_peak", settings.hours_peak.as_deref()),
        ("hours_peak_summer", settings.hours_peak_summer.as_deref()),
        ("hours_peak_winter", settings.hours_peak_winter.as_deref()),
    ];
    for (name, spec) in hours {
        let Some(spec) = spec else { continue };
        if !validate_hour_format(spec) {
            return Err(EnergyHubError::validation(
                format!("{}.{}", prefix, name),
                format!("Invalid hour ranges '{}', expected e.g. 6-13,15-22", spec),
            ));
        }
        if parse_hour_ranges(spec)
            .iter()
            .any(|(start, end)| *start > 24 || *end > 24)
        {
            return Err(EnergyHubError::validation(
                format!("{}.{}", prefix, name),
                "Hours must be within 0-24",
            ));
        }
    }

    Ok(())
}

// Constant patterns; `None` only if a pattern fails to compile
static HOUR_RANGES_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\d{1,2}-\d{1,2}(,\d{1,2}-\d{1,2})*$").ok());
static ENTITY_ID_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^sensor\..+$").ok());

fn is_match(re: &Option<Regex>, input: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(input))
}

/// Check an hour-range string of the form `H-H(,H-H)*` with 1-2 digit hours.
/// The empty string is accepted and means "no peak windows".
pub fn validate_hour_format(input: &str) -> bool {
    input.is_empty() || is_match(&HOUR_RANGES_RE, input)
}

/// Check an entity id of the form `sensor.<name>`. The empty string is
/// accepted and means "no energy sensor".
pub fn validate_entity_id(entity_id: &str) -> bool {
    entity_id.is_empty() || is_match(&ENTITY_ID_RE, entity_id)
}
