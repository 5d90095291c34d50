use super::*;

/// Quote endpoint of the PGE data hub serving TGE day-ahead prices
pub const DEFAULT_API_URL: &str = "https://datahub.gkpge.pl/api/tge/quote";

/// Peak windows shared by the G12 and G12w defaults
pub const DEFAULT_PEAK_HOURS: &str = "6-13,15-22";

pub(super) fn energy_poll_interval_secs() -> u64 {
    60
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8123".to_string(),
            token: None,
            timeout_secs: 10,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            timeout_secs: 20,
            limit: 100,
            user_agent: "Mozilla/5.0".to_string(),
            hour_shift_minutes: 0,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 300 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: "/data/energy_hub".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: "/tmp/energy_hub.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operation_mode: OperationMode::default(),
            timezone: "Europe/Warsaw".to_string(),
            unit: PriceUnit::default(),
            g12: None,
            g12w: None,
            energy_sensor: None,
            api: ApiConfig::default(),
            refresh: RefreshConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
        }
    }
}
