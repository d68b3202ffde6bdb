//! Normalized records handed to callers, built from provider bars and metadata.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::price::{PriceBar, SymbolMetadata, change_percent, round2};

const DEFAULT_CURRENCY: &str = "USD";
const UNKNOWN_EXCHANGE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl From<&PriceBar> for HistoryPoint {
    fn from(bar: &PriceBar) -> Self {
        HistoryPoint {
            date: bar.date.format("%Y-%m-%d").to_string(),
            open: round2(bar.open),
            high: round2(bar.high),
            low: round2(bar.low),
            close: round2(bar.close),
            volume: bar.volume,
        }
    }
}

/// Point-in-time view of a symbol with its recent daily history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub currency: String,
    pub exchange: String,
    pub market_cap: u64,
    pub fifty_two_week_high: f64,
    pub fifty_two_week_low: f64,
    pub converted_currency: String,
    pub current_price_converted: f64,
    pub previous_close_converted: f64,
    pub fifty_two_week_high_converted: f64,
    pub fifty_two_week_low_converted: f64,
    pub history: Vec<HistoryPoint>,
}

impl StockSnapshot {
    /// Builds a snapshot from daily bars. Missing metadata falls back to the
    /// symbol as name, USD, an unknown exchange and zeroes.
    ///
    /// Converted fields are left equal to the source prices until
    /// [`StockSnapshot::apply_rate`] is called.
    pub fn from_history(
        symbol: &str,
        bars: &[PriceBar],
        metadata: Option<&SymbolMetadata>,
    ) -> Result<Self> {
        let last = bars
            .last()
            .ok_or_else(|| anyhow!("No data found for symbol: {}", symbol))?;

        let current_price = last.close;
        let previous_close = if bars.len() > 1 {
            bars[bars.len() - 2].close
        } else {
            current_price
        };
        let change = current_price - previous_close;

        let meta = metadata.cloned().unwrap_or_default();
        let fifty_two_week_high = round2(meta.fifty_two_week_high.unwrap_or(0.0));
        let fifty_two_week_low = round2(meta.fifty_two_week_low.unwrap_or(0.0));
        let currency = meta
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Ok(StockSnapshot {
            symbol: symbol.to_string(),
            name: meta.name.unwrap_or_else(|| symbol.to_string()),
            current_price: round2(current_price),
            previous_close: round2(previous_close),
            change: round2(change),
            change_percent: round2(change_percent(current_price, previous_close)),
            converted_currency: currency.clone(),
            currency,
            exchange: meta
                .exchange
                .unwrap_or_else(|| UNKNOWN_EXCHANGE.to_string()),
            market_cap: meta.market_cap.unwrap_or(0),
            fifty_two_week_high,
            fifty_two_week_low,
            current_price_converted: round2(current_price),
            previous_close_converted: round2(previous_close),
            fifty_two_week_high_converted: fifty_two_week_high,
            fifty_two_week_low_converted: fifty_two_week_low,
            history: bars.iter().map(HistoryPoint::from).collect(),
        })
    }

    /// Fills the converted price fields using `rate` units of `target` per unit of `currency`.
    pub fn apply_rate(&mut self, target: &str, rate: f64) {
        self.converted_currency = target.to_string();
        self.current_price_converted = round2(self.current_price * rate);
        self.previous_close_converted = round2(self.previous_close * rate);
        self.fifty_two_week_high_converted = round2(self.fifty_two_week_high * rate);
        self.fifty_two_week_low_converted = round2(self.fifty_two_week_low * rate);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivePriceSnapshot {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub currency: String,
    pub converted_currency: String,
    pub price_converted: f64,
    pub open_converted: f64,
    pub high_converted: f64,
    pub low_converted: f64,
    pub previous_close_converted: f64,
    pub timestamp: DateTime<Utc>,
}

impl LivePriceSnapshot {
    /// Aggregates intraday (or recent daily) bars into one quote captured at `timestamp`.
    pub fn from_bars(
        symbol: &str,
        bars: &[PriceBar],
        metadata: Option<&SymbolMetadata>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self> {
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(anyhow!("No live data available for {}", symbol)),
        };

        let price = last.close;
        let open = first.open;
        let high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let volume = bars.iter().map(|b| b.volume).sum();

        let meta = metadata.cloned().unwrap_or_default();
        let previous_close = meta.previous_close.unwrap_or(open);
        let currency = meta
            .currency
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Ok(LivePriceSnapshot {
            symbol: symbol.to_string(),
            name: meta.name.unwrap_or_else(|| symbol.to_string()),
            price: round2(price),
            open: round2(open),
            high: round2(high),
            low: round2(low),
            volume,
            previous_close: round2(previous_close),
            change: round2(price - previous_close),
            change_percent: round2(change_percent(price, previous_close)),
            converted_currency: currency.clone(),
            currency,
            price_converted: round2(price),
            open_converted: round2(open),
            high_converted: round2(high),
            low_converted: round2(low),
            previous_close_converted: round2(previous_close),
            timestamp,
        })
    }

    pub fn apply_rate(&mut self, target: &str, rate: f64) {
        self.converted_currency = target.to_string();
        self.price_converted = round2(self.price * rate);
        self.open_converted = round2(self.open * rate);
        self.high_converted = round2(self.high * rate);
        self.low_converted = round2(self.low * rate);
        self.previous_close_converted = round2(self.previous_close * rate);
    }
}
