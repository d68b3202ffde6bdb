//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::core::catalog::CatalogEntry;

/// Lookback range for a price series, in the provider's range notation.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum Period {
    OneDay,
    FiveDays,
    #[default]
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    YearToDate,
    Max,
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Period::OneDay => "1d",
                Period::FiveDays => "5d",
                Period::OneMonth => "1mo",
                Period::ThreeMonths => "3mo",
                Period::SixMonths => "6mo",
                Period::OneYear => "1y",
                Period::TwoYears => "2y",
                Period::FiveYears => "5y",
                Period::TenYears => "10y",
                Period::YearToDate => "ytd",
                Period::Max => "max",
            }
        )
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1d" => Ok(Period::OneDay),
            "5d" => Ok(Period::FiveDays),
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "6mo" => Ok(Period::SixMonths),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "10y" => Ok(Period::TenYears),
            "ytd" => Ok(Period::YearToDate),
            "max" => Ok(Period::Max),
            _ => Err(anyhow::anyhow!("Invalid period: {}", s)),
        }
    }
}

/// Bar width of a price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    OneDay,
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interval::OneMinute => write!(f, "1m"),
            Interval::OneDay => write!(f, "1d"),
        }
    }
}

/// One OHLCV bar as returned by a provider, prices unrounded.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Descriptive fields a provider may attach to a series. Any of them can be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolMetadata {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub market_cap: Option<u64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub previous_close: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    pub bars: Vec<PriceBar>,
    pub metadata: Option<SymbolMetadata>,
}

/// Primary market data source: price series with metadata, and symbol lookup.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_series(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries>;

    /// Resolves `symbol` to a catalog entry. `Ok(None)` means the provider
    /// answered but does not know the symbol.
    async fn lookup_symbol(&self, symbol: &str) -> Result<Option<CatalogEntry>>;

    /// Market capitalisation for `symbol` when the series metadata lacks it.
    async fn market_cap(&self, _symbol: &str) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// Fallback source that only serves daily bars, without metadata.
#[async_trait]
pub trait DailyHistoryProvider: Send + Sync {
    async fn fetch_daily(&self, symbol: &str) -> Result<Vec<PriceBar>>;
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change from `previous` to `current`, 0 when `previous` is not positive.
pub fn change_percent(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}
