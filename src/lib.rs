//! # Energy Hub - Polish day-ahead electricity prices and tariffs
//!
//! Fetches hourly day-ahead prices from the TGE quote feed, keeps a
//! today/tomorrow cache that rolls over at local midnight, and prices every
//! hour under the dynamic tariff and the G12/G12w time-of-use tariffs.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `logging`: Structured logging and tracing
//! - `tge`: Market-data client and record parser
//! - `coordinator`: Day-rollover price cache and refresh loop
//! - `persistence`: Versioned JSON store
//! - `holidays`: Polish statutory holiday calendar
//! - `tariff`: G12/G12w peak-hour and price calculation
//! - `sensors`: Entity read models over the latest prices
//! - `home_assistant`: Energy meter reader
//! - `costs`: Cost and savings accumulation
//! - `web`: Read-only JSON API

pub mod config;
pub mod coordinator;
pub mod costs;
pub mod error;
pub mod holidays;
pub mod home_assistant;
pub mod logging;
pub mod persistence;
pub mod sensors;
pub mod tariff;
pub mod tge;
#[cfg(feature = "web")]
pub mod web;


// Re-export commonly used types
pub use config::Config;
pub use coordinator::{PriceCoordinator, PriceSnapshot};
pub use error::{EnergyHubError, Result};
