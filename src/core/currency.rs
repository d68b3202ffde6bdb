//! Currency conversion abstractions

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::core::price::round2;

pub const DEFAULT_FALLBACK_RATE: f64 = 83.0;
pub const DEFAULT_RATE_TTL: Duration = Duration::from_secs(300);
pub const BASE_CURRENCY: &str = "USD";

#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64>;
}

/// Converts prices between currencies, caching each pair's rate for `ttl`.
///
/// Lookups never fail: when the provider errors or returns an unusable
/// rate, `fallback_rate` is used instead and the failure is only logged.
pub struct CurrencyConverter {
    provider: Arc<dyn CurrencyRateProvider>,
    rates: Mutex<HashMap<String, (f64, Instant)>>,
    ttl: Duration,
    fallback_rate: f64,
}

impl CurrencyConverter {
    pub fn new(provider: Arc<dyn CurrencyRateProvider>, ttl: Duration, fallback_rate: f64) -> Self {
        Self {
            provider,
            rates: Mutex::new(HashMap::new()),
            ttl,
            fallback_rate,
        }
    }

    pub async fn get_exchange_rate(&self, from: &str, to: &str) -> f64 {
        if from.eq_ignore_ascii_case(to) {
            return 1.0;
        }

        let key = format!("{}_{}", from.to_uppercase(), to.to_uppercase());
        if let Some((rate, fetched_at)) = self.rates.lock().await.get(&key)
            && fetched_at.elapsed() < self.ttl
        {
            debug!("Using cached rate for {}: {}", key, rate);
            return *rate;
        }

        match self.fetch_rate(from, to).await {
            Ok(rate) => {
                self.rates
                    .lock()
                    .await
                    .insert(key, (rate, Instant::now()));
                rate
            }
            Err(e) => {
                error!(pair = %key, "Currency conversion error: {e:#}");
                self.fallback_rate
            }
        }
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<f64> {
        let rate = self.provider.get_rate(from, to).await?;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(anyhow!("Invalid exchange rate {rate} for {from}{to}"));
        }
        Ok(rate)
    }

    /// Converts `amount` from `from` to `to`, rounded to 2 decimals.
    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> f64 {
        let rate = self.get_exchange_rate(from, to).await;
        round2(amount * rate)
    }

    /// Converts a USD amount into `to`, rounded to 2 decimals.
    pub async fn convert_price(&self, amount: f64, to: &str) -> f64 {
        self.convert(amount, BASE_CURRENCY, to).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct FixedRateProvider {
        pub rate: Option<f64>,
        pub calls: AtomicUsize,
    }

    impl FixedRateProvider {
        pub(crate) fn new(rate: Option<f64>) -> Self {
            Self {
                rate,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CurrencyRateProvider for FixedRateProvider {
        async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rate
                .ok_or_else(|| anyhow!("No rate data found for currency pair: {from}{to}=X"))
        }
    }

    fn converter(provider: Arc<FixedRateProvider>, ttl: Duration) -> CurrencyConverter {
        CurrencyConverter::new(provider, ttl, DEFAULT_FALLBACK_RATE)
    }

    #[tokio::test]
    async fn test_failing_provider_uses_fallback_rate() {
        let provider = Arc::new(FixedRateProvider::new(None));
        let converter = converter(provider.clone(), DEFAULT_RATE_TTL);

        assert_eq!(converter.convert_price(100.0, "INR").await, 8300.0);
        // Fallback is not cached, the next call asks the provider again
        assert_eq!(converter.convert_price(1.5, "INR").await, 124.5);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_positive_rate_is_treated_as_failure() {
        let provider = Arc::new(FixedRateProvider::new(Some(0.0)));
        let converter = converter(provider, DEFAULT_RATE_TTL);

        assert_eq!(converter.get_exchange_rate("USD", "INR").await, 83.0);
    }

    #[tokio::test]
    async fn test_rate_is_cached_per_pair() {
        let provider = Arc::new(FixedRateProvider::new(Some(84.25)));
        let converter = converter(provider.clone(), DEFAULT_RATE_TTL);

        assert_eq!(converter.convert_price(2.0, "INR").await, 168.5);
        assert_eq!(converter.convert_price(4.0, "INR").await, 337.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        // A fresh entry for USD_INR says nothing about USD_EUR
        converter.get_exchange_rate("USD", "EUR").await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_rate_expires() {
        let provider = Arc::new(FixedRateProvider::new(Some(84.0)));
        let converter = converter(provider.clone(), Duration::from_millis(30));

        converter.get_exchange_rate("USD", "INR").await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        converter.get_exchange_rate("USD", "INR").await;

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_same_currency_skips_provider() {
        let provider = Arc::new(FixedRateProvider::new(None));
        let converter = converter(provider.clone(), DEFAULT_RATE_TTL);

        assert_eq!(converter.convert(12.346, "INR", "inr").await, 12.35);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
