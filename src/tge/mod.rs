//! TGE day-ahead market data
//!
//! `client` talks to the quote endpoint, `parser` turns its JSON records into
//! an hour-indexed [`PriceMap`].

pub mod client;
pub mod parser;
pub mod types;

pub use client::{PriceSource, TgeClient};
pub use parser::PriceParser;
pub use types::{HOURS_PER_DAY, ParsedPrices, PriceMap};
