use thiserror::Error;

/// Failures surfaced by [`crate::service::StockService`] to its callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("Rate limit exceeded. Please wait a moment before trying again.")]
    RateLimitExceeded { key: String },

    #[error("Could not retrieve data for {symbol}: {detail}")]
    UpstreamUnavailable { symbol: String, detail: String },
}

impl StockError {
    pub fn upstream(symbol: &str, err: &anyhow::Error) -> Self {
        StockError::UpstreamUnavailable {
            symbol: symbol.to_string(),
            detail: format!("{err:#}"),
        }
    }

    /// Combines the failures of the primary and fallback sources into one error.
    pub fn both_sources_failed(
        symbol: &str,
        primary: &anyhow::Error,
        secondary: &anyhow::Error,
    ) -> Self {
        StockError::UpstreamUnavailable {
            symbol: symbol.to_string(),
            detail: format!("primary: {primary:#}; secondary: {secondary:#}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, StockError>;
