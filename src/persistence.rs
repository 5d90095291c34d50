//! Persistence layer for cached prices and cost counters
//!
//! Each record lives in `<directory>/<key>.json` as `{version, key, data}`.
//! Writes go to a temporary file that is renamed over the record, so a crash
//! never leaves a half-written cache behind.

use crate::error::{EnergyHubError, Result};
use crate::logging::{LogContext, StructuredLogger};
use crate::tge::PriceMap;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage key of the price cache
pub const CACHE_STORAGE_KEY: &str = "energy_hub_poland_cache";

/// Schema version of the price cache
pub const CACHE_STORAGE_VERSION: u32 = 1;

/// Storage key of the cost counters
pub const COSTS_STORAGE_KEY: &str = "energy_hub_poland_costs";

/// Schema version of the cost counters
pub const COSTS_STORAGE_VERSION: u32 = 1;

/// On-disk form of the day-rollover cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedCache {
    /// Today's prices, keyed by hour as a string
    #[serde(default)]
    pub today: Option<PriceMap>,

    /// ISO date of `today`
    #[serde(default)]
    pub today_date: Option<NaiveDate>,

    /// Tomorrow's prices, keyed by hour as a string
    #[serde(default)]
    pub tomorrow: Option<PriceMap>,

    /// ISO date of `tomorrow`
    #[serde(default)]
    pub tomorrow_date: Option<NaiveDate>,

    /// Time of the last successful fetch
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Connectivity flag at the time of writing
    #[serde(default)]
    pub api_connected: bool,
}

#[derive(Serialize, Deserialize)]
struct StoredRecord<T> {
    version: u32,
    key: String,
    data: T,
}

/// Versioned JSON record store
pub struct JsonStore {
    directory: PathBuf,
    key: String,
    version: u32,
    logger: StructuredLogger,
}

impl JsonStore {
    /// Create a store for one key inside `directory`
    pub fn new<P: AsRef<Path>>(directory: P, key: &str, version: u32) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            key: key.to_string(),
            version,
            logger: StructuredLogger::new(LogContext::new("persistence").with_field("key", key)),
        }
    }

    /// Path of the record file
    pub fn path(&self) -> PathBuf {
        self.directory.join(format!("{}.json", self.key))
    }

    /// Load the record; `Ok(None)` when nothing has been stored yet
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let path = self.path();
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.logger
                    .debug(&format!("No stored record at {}", path.display()));
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record: StoredRecord<serde_json::Value> = serde_json::from_str(&contents)
            .map_err(|e| EnergyHubError::storage(format!("{}: {}", path.display(), e)))?;
        if record.version != self.version {
            return Err(EnergyHubError::storage(format!(
                "{}: version {} does not match expected {}",
                path.display(),
                record.version,
                self.version
            )));
        }
        if record.key != self.key {
            return Err(EnergyHubError::storage(format!(
                "{}: key '{}' does not match expected '{}'",
                path.display(),
                record.key,
                self.key
            )));
        }

        let data = serde_json::from_value(record.data)
            .map_err(|e| EnergyHubError::storage(format!("{}: {}", path.display(), e)))?;
        self.logger
            .debug(&format!("Loaded stored record from {}", path.display()));
        Ok(Some(data))
    }

    /// Atomically replace the record with `data`
    pub async fn save<T: Serialize>(&self, data: &T) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory).await?;

        let record = StoredRecord {
            version: self.version,
            key: self.key.clone(),
            data,
        };
        let contents = serde_json::to_string_pretty(&record)?;

        let path = self.path();
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;

        self.logger
            .debug(&format!("Saved record to {}", path.display()));
        Ok(())
    }
}
