//! Static list of popular stocks served without any upstream call.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
}

impl CatalogEntry {
    pub fn new(symbol: &str, name: &str, exchange: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            exchange: exchange.to_string(),
        }
    }
}

const POPULAR_STOCKS: &[(&str, &str, &str)] = &[
    ("AAPL", "Apple Inc.", "NASDAQ"),
    ("GOOGL", "Alphabet Inc.", "NASDAQ"),
    ("MSFT", "Microsoft Corporation", "NASDAQ"),
    ("AMZN", "Amazon.com Inc.", "NASDAQ"),
    ("TSLA", "Tesla Inc.", "NASDAQ"),
    ("META", "Meta Platforms Inc.", "NASDAQ"),
    ("NVDA", "NVIDIA Corporation", "NASDAQ"),
    ("JPM", "JPMorgan Chase & Co.", "NYSE"),
    ("V", "Visa Inc.", "NYSE"),
    ("WMT", "Walmart Inc.", "NYSE"),
    ("RELIANCE.NS", "Reliance Industries", "NSE"),
    ("TCS.NS", "Tata Consultancy Services", "NSE"),
    ("HDFCBANK.NS", "HDFC Bank", "NSE"),
    ("INFY.NS", "Infosys", "NSE"),
    ("ICICIBANK.NS", "ICICI Bank", "NSE"),
    ("SBIN.NS", "State Bank of India", "NSE"),
    ("BHARTIARTL.NS", "Bharti Airtel", "NSE"),
    ("ITC.NS", "ITC Limited", "NSE"),
    ("KOTAKBANK.NS", "Kotak Mahindra Bank", "NSE"),
    ("LT.NS", "Larsen & Toubro", "NSE"),
];

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Entries whose symbol or name contains `query`, ignoring case, in catalog order.
    pub fn matching(&self, query: &str) -> Vec<CatalogEntry> {
        let needle = query.to_uppercase();
        self.entries
            .iter()
            .filter(|e| {
                e.symbol.to_uppercase().contains(&needle) || e.name.to_uppercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn by_exchange(&self, exchange: &str) -> Vec<CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| e.exchange == exchange)
            .cloned()
            .collect()
    }
}

/// True if `query` could be a ticker symbol, e.g. `AAPL`, `RELIANCE.NS`, `^NSEI`, `USDINR=X`.
pub fn is_plausible_symbol(query: &str) -> bool {
    !query.is_empty()
        && query.len() <= 20
        && query
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(
            POPULAR_STOCKS
                .iter()
                .map(|(symbol, name, exchange)| CatalogEntry::new(symbol, name, exchange))
                .collect(),
        )
    }
}
