//! Request-facing stock operations with caching, rate limiting and source fallback.

use anyhow::Result as AnyResult;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::core::cache::Cache;
use crate::core::catalog::{Catalog, CatalogEntry, is_plausible_symbol};
use crate::core::config::AppConfig;
use crate::core::currency::{CurrencyConverter, CurrencyRateProvider};
use crate::core::error::{Result, StockError};
use crate::core::price::{DailyHistoryProvider, Interval, Period, PriceProvider, PriceSeries};
use crate::core::rate_limit::RateLimiter;
use crate::core::snapshot::{LivePriceSnapshot, StockSnapshot};
use crate::providers::stooq::StooqProvider;
use crate::providers::yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};

/// Below this many catalog matches, search also asks the primary provider.
const MIN_STATIC_MATCHES: usize = 5;
const MAX_SEARCH_RESULTS: usize = 10;

/// Periods whose cached history may be served when a symbol is rate limited.
const DEGRADED_PERIODS: [Period; 2] = [Period::OneMonth, Period::ThreeMonths];

fn stock_key(symbol: &str, period: Period) -> String {
    format!("stock_{symbol}_{period}")
}

fn live_key(symbol: &str) -> String {
    format!("live_{symbol}")
}

/// Process-wide context for the stock endpoints. Build one and share it behind an `Arc`.
pub struct StockService {
    primary: Arc<dyn PriceProvider>,
    secondary: Arc<dyn DailyHistoryProvider>,
    converter: CurrencyConverter,
    stock_cache: Cache<String, StockSnapshot>,
    live_cache: Cache<String, LivePriceSnapshot>,
    limiter: RateLimiter,
    catalog: Catalog,
    target_currency: String,
}

impl StockService {
    pub fn new(
        primary: Arc<dyn PriceProvider>,
        secondary: Arc<dyn DailyHistoryProvider>,
        rates: Arc<dyn CurrencyRateProvider>,
        config: &AppConfig,
    ) -> Self {
        let cache_ttl = Duration::from_secs(config.cache.ttl_secs);
        StockService {
            primary,
            secondary,
            converter: CurrencyConverter::new(
                rates,
                Duration::from_secs(config.currency.ttl_secs),
                config.currency.fallback_rate,
            ),
            stock_cache: Cache::new(cache_ttl, config.cache.capacity),
            live_cache: Cache::new(cache_ttl, config.cache.capacity),
            limiter: RateLimiter::new(
                config.rate_limit.max_calls,
                Duration::from_secs(config.rate_limit.window_secs),
            ),
            catalog: Catalog::default(),
            target_currency: config.currency.target.to_uppercase(),
        }
    }

    /// Wires the Yahoo and Stooq providers from `config`.
    pub fn from_config(config: &AppConfig) -> AnyResult<Self> {
        let timeout = config.request_timeout();
        let yahoo_url = config.providers.yahoo_base_url();

        let primary = Arc::new(YahooFinanceProvider::new(yahoo_url, timeout)?);
        let secondary = Arc::new(StooqProvider::new(
            config.providers.stooq_base_url(),
            timeout,
        )?);
        let rates = Arc::new(YahooCurrencyProvider::new(yahoo_url, timeout)?);

        Ok(Self::new(primary, secondary, rates, config))
    }

    /// Catalog entries matching `query`, topped up with one external lookup when
    /// the catalog has few matches. Never fails.
    #[instrument(skip(self))]
    pub async fn search_stocks(&self, query: &str) -> Vec<CatalogEntry> {
        let query = query.trim().to_uppercase();
        let mut results = self.catalog.matching(&query);

        if results.len() < MIN_STATIC_MATCHES
            && let Some(entry) = self.lookup_external(&query).await
            && !results.iter().any(|e| e.symbol == entry.symbol)
        {
            results.push(entry);
        }

        results.truncate(MAX_SEARCH_RESULTS);
        results
    }

    async fn lookup_external(&self, query: &str) -> Option<CatalogEntry> {
        if !is_plausible_symbol(query) {
            return None;
        }
        if !self.limiter.allow(&format!("search_{query}")).await {
            debug!("Search lookup for {} is rate limited", query);
            return None;
        }

        match self.primary.lookup_symbol(query).await {
            Ok(Some(entry)) => Some(entry),
            Ok(None) => {
                debug!("No external match for {}", query);
                None
            }
            Err(e) => {
                warn!("Symbol lookup for {} failed: {e:#}", query);
                None
            }
        }
    }

    pub fn get_nse_stocks(&self) -> Vec<CatalogEntry> {
        self.catalog.by_exchange("NSE")
    }

    /// Daily history snapshot for `symbol`, from cache, the primary source or
    /// the secondary source, in that order.
    #[instrument(skip(self), fields(period = %period))]
    pub async fn get_stock_data(&self, symbol: &str, period: Period) -> Result<StockSnapshot> {
        let key = stock_key(symbol, period);
        if let Some(cached) = self.stock_cache.get(&key).await {
            return Ok(cached);
        }

        if !self.limiter.allow(symbol).await {
            for fallback in DEGRADED_PERIODS {
                if let Some(cached) = self.stock_cache.get(&stock_key(symbol, fallback)).await {
                    warn!(
                        "Rate limited, serving cached {} history for {}",
                        fallback, symbol
                    );
                    return Ok(cached);
                }
            }
            return Err(StockError::RateLimitExceeded {
                key: symbol.to_string(),
            });
        }

        let mut snapshot = match self.fetch_from_primary(symbol, period).await {
            Ok(snapshot) => snapshot,
            Err(primary_err) => {
                warn!("Primary source failed for {}: {primary_err:#}", symbol);
                match self.fetch_from_secondary(symbol).await {
                    Ok(snapshot) => {
                        info!("Served {} from the secondary source", symbol);
                        snapshot
                    }
                    Err(secondary_err) => {
                        error!("Secondary source failed for {}: {secondary_err:#}", symbol);
                        return Err(StockError::both_sources_failed(
                            symbol,
                            &primary_err,
                            &secondary_err,
                        ));
                    }
                }
            }
        };

        let rate = self
            .converter
            .get_exchange_rate(&snapshot.currency, &self.target_currency)
            .await;
        snapshot.apply_rate(&self.target_currency, rate);

        self.stock_cache.put(key, snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn fetch_from_primary(&self, symbol: &str, period: Period) -> AnyResult<StockSnapshot> {
        let PriceSeries { bars, metadata } = self
            .primary
            .fetch_series(symbol, period, Interval::OneDay)
            .await?;
        let mut snapshot = StockSnapshot::from_history(symbol, &bars, metadata.as_ref())?;

        if snapshot.market_cap == 0 {
            match self.primary.market_cap(symbol).await {
                Ok(Some(cap)) => snapshot.market_cap = cap,
                Ok(None) => {}
                Err(e) => debug!("Market cap lookup for {} failed: {e:#}", symbol),
            }
        }
        Ok(snapshot)
    }

    async fn fetch_from_secondary(&self, symbol: &str) -> AnyResult<StockSnapshot> {
        let bars = self.secondary.fetch_daily(symbol).await?;
        StockSnapshot::from_history(symbol, &bars, None)
    }

    /// Current-day quote for `symbol` built from intraday bars, or recent daily
    /// bars when the market has not traded today.
    #[instrument(skip(self))]
    pub async fn get_live_price(&self, symbol: &str) -> Result<LivePriceSnapshot> {
        let key = live_key(symbol);
        if let Some(cached) = self.live_cache.get(&key).await {
            return Ok(cached);
        }

        if !self.limiter.allow(&key).await {
            // A concurrent request may have filled the cache since the first lookup
            if let Some(cached) = self.live_cache.get(&key).await {
                return Ok(cached);
            }
            return Err(StockError::RateLimitExceeded { key });
        }

        let mut live = self.fetch_live(symbol).await.map_err(|e| {
            error!("Error fetching live price for {}: {e:#}", symbol);
            StockError::upstream(symbol, &e)
        })?;

        let rate = self
            .converter
            .get_exchange_rate(&live.currency, &self.target_currency)
            .await;
        live.apply_rate(&self.target_currency, rate);

        self.live_cache.put(key, live.clone()).await;
        Ok(live)
    }

    async fn fetch_live(&self, symbol: &str) -> AnyResult<LivePriceSnapshot> {
        let PriceSeries { bars, metadata } = self
            .primary
            .fetch_series(symbol, Period::OneDay, Interval::OneMinute)
            .await?;

        let (bars, metadata) = if bars.is_empty() {
            debug!("No intraday bars for {}, using daily bars", symbol);
            let daily = self
                .primary
                .fetch_series(symbol, Period::FiveDays, Interval::OneDay)
                .await?;
            (daily.bars, metadata.or(daily.metadata))
        } else {
            (bars, metadata)
        };

        LivePriceSnapshot::from_bars(symbol, &bars, metadata.as_ref(), Utc::now())
    }
}
