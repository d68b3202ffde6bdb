//! Core business logic abstractions

pub mod cache;
pub mod catalog;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod price;
pub mod rate_limit;
pub mod snapshot;

// Re-export main types for cleaner imports
pub use catalog::{Catalog, CatalogEntry};
pub use currency::{CurrencyConverter, CurrencyRateProvider};
pub use error::StockError;
pub use price::{DailyHistoryProvider, Interval, Period, PriceBar, PriceProvider, PriceSeries};
pub use snapshot::{HistoryPoint, LivePriceSnapshot, StockSnapshot};
