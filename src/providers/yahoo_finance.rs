use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::catalog::CatalogEntry;
use crate::core::currency::CurrencyRateProvider;
use crate::core::price::{Interval, Period, PriceBar, PriceProvider, PriceSeries, SymbolMetadata};
use crate::providers::util::{endpoint_url, http_client};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

// YahooFinanceProvider implementation for PriceProvider
pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }

    /// Fetches the chart for `symbol`. Returns `None` when Yahoo does not know the symbol.
    async fn request_chart(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Option<ChartItem>> {
        let (range, interval) = (period.to_string(), interval.to_string());
        let url = endpoint_url(
            &self.base_url,
            &["v8", "finance", "chart", symbol],
            &[("range", range.as_str()), ("interval", interval.as_str())],
        )?;
        debug!("Requesting price data from {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {} URL: {}", e, symbol, url))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Yahoo has no chart for symbol: {}", symbol);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for symbol: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        let data: YahooChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        if let Some(err) = data.chart.error {
            debug!(?err, "Yahoo reported a chart error");
        }

        Ok(data.chart.result.and_then(|items| items.into_iter().next()))
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
#[allow(dead_code)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug, Default)]
struct Quote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
    market_cap: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    #[serde(default)]
    gmtoffset: i64,
}

impl ChartMeta {
    fn display_name(&self) -> Option<String> {
        self.long_name.clone().or_else(|| self.short_name.clone())
    }

    fn to_metadata(&self) -> SymbolMetadata {
        SymbolMetadata {
            name: self.display_name(),
            currency: self.currency.clone(),
            exchange: self.exchange_name.clone(),
            market_cap: self
                .market_cap
                .filter(|cap| cap.is_finite() && *cap > 0.0)
                .map(|cap| cap as u64),
            fifty_two_week_high: self.fifty_two_week_high,
            fifty_two_week_low: self.fifty_two_week_low,
            previous_close: self.previous_close.or(self.chart_previous_close),
        }
    }
}

fn value_at(series: &Option<Vec<Option<f64>>>, index: usize) -> Option<f64> {
    series
        .as_ref()
        .and_then(|values| values.get(index).copied().flatten())
}

/// Zips timestamps with the first quote block. Bars with a missing price are skipped.
fn extract_bars(item: &ChartItem) -> Vec<PriceBar> {
    let Some(timestamps) = item.timestamp.as_ref() else {
        return Vec::new();
    };
    let Some(quote) = item.indicators.as_ref().and_then(|inds| inds.quote.first()) else {
        return Vec::new();
    };

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = DateTime::from_timestamp(ts + item.meta.gmtoffset, 0)?.date_naive();
            Some(PriceBar {
                date,
                open: value_at(&quote.open, i)?,
                high: value_at(&quote.high, i)?,
                low: value_at(&quote.low, i)?,
                close: value_at(&quote.close, i)?,
                volume: value_at(&quote.volume, i)
                    .filter(|v| *v > 0.0)
                    .map_or(0, |v| v as u64),
            })
        })
        .collect()
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooSeriesFetch",
        skip_all,
        fields(symbol = %symbol, period = %period, interval = %interval)
    )]
    async fn fetch_series(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> Result<PriceSeries> {
        let item = self
            .request_chart(symbol, period, interval)
            .await?
            .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))?;

        let bars = extract_bars(&item);
        debug!(bars = bars.len(), "Parsed Yahoo chart");

        Ok(PriceSeries {
            bars,
            metadata: Some(item.meta.to_metadata()),
        })
    }

    #[instrument(name = "YahooSymbolLookup", skip(self))]
    async fn lookup_symbol(&self, symbol: &str) -> Result<Option<CatalogEntry>> {
        let Some(item) = self
            .request_chart(symbol, Period::OneDay, Interval::OneDay)
            .await?
        else {
            return Ok(None);
        };

        let meta = item.meta;
        let resolved = meta.symbol.clone().unwrap_or_else(|| symbol.to_string());
        Ok(Some(CatalogEntry {
            name: meta.display_name().unwrap_or_else(|| resolved.clone()),
            exchange: meta
                .exchange_name
                .unwrap_or_else(|| "Unknown".to_string()),
            symbol: resolved,
        }))
    }

    /// Reads `marketCap` from the quote endpoint, which the chart metadata does not carry.
    #[instrument(name = "YahooMarketCap", skip(self))]
    async fn market_cap(&self, symbol: &str) -> Result<Option<u64>> {
        let url = endpoint_url(
            &self.base_url,
            &["v7", "finance", "quote"],
            &[("symbols", symbol)],
        )?;
        debug!("Requesting quote from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for quote: {}", e, symbol))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for quote: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;
        let data: YahooQuoteResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse quote response for {}: {}", symbol, e))?;

        Ok(data
            .quote_response
            .result
            .into_iter()
            .flatten()
            .next()
            .and_then(|q| q.market_cap)
            .filter(|cap| cap.is_finite() && *cap > 0.0)
            .map(|cap| cap as u64))
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct YahooQuoteResponse {
    quote_response: QuoteResult,
}

#[derive(Deserialize, Debug)]
struct QuoteResult {
    result: Option<Vec<QuoteItem>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteItem {
    market_cap: Option<f64>,
}

// YahooCurrencyProvider implementation for CurrencyRateProvider
pub struct YahooCurrencyProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooCurrencyProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(YahooCurrencyProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct YahooCurrencyResponse {
    chart: CurrencyChartResult,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartResult {
    result: Vec<CurrencyChartItem>,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartItem {
    meta: CurrencyChartMeta,
}

#[derive(Debug, Deserialize)]
struct CurrencyChartMeta {
    #[serde(alias = "regularMarketPrice")]
    regular_market_price: f64,
}

#[async_trait]
impl CurrencyRateProvider for YahooCurrencyProvider {
    async fn get_rate(&self, from: &str, to: &str) -> Result<f64> {
        let symbol = format!("{}{}=X", from.to_uppercase(), to.to_uppercase());
        let url = endpoint_url(
            &self.base_url,
            &["v8", "finance", "chart", symbol.as_str()],
            &[],
        )?;
        debug!("Requesting currency rate from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for currency pair: {}", e, symbol))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for currency pair: {}",
                response.status(),
                symbol
            ));
        }

        let text = response.text().await?;

        let data: YahooCurrencyResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        let item = data
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", symbol))?;

        Ok(item.meta.regular_market_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::DEFAULT_TIMEOUT;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DAILY_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "symbol": "AAPL",
                    "exchangeName": "NMS",
                    "longName": "Apple Inc.",
                    "shortName": "Apple",
                    "fiftyTwoWeekHigh": 199.62,
                    "fiftyTwoWeekLow": 164.08,
                    "chartPreviousClose": 180.0,
                    "regularMarketPrice": 190.5,
                    "gmtoffset": -14400
                },
                "timestamp": [1709553000, 1709639400, 1709725800],
                "indicators": {
                    "quote": [{
                        "open": [179.55, 176.15, null],
                        "high": [180.53, 176.9, 171.24],
                        "low": [173.7, 173.79, 170.0],
                        "close": [175.1, 170.12, null],
                        "volume": [81510100, 95132400, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    async fn create_chart_mock_server(symbol: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_fetch_series_parses_bars_and_metadata() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("range", "1mo"))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DAILY_CHART))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();
        let series = provider
            .fetch_series("AAPL", Period::OneMonth, Interval::OneDay)
            .await
            .unwrap();

        // Third bar has null open/close and is dropped
        assert_eq!(series.bars.len(), 2);
        assert_eq!(
            series.bars[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        assert_eq!(series.bars[1].close, 170.12);
        assert_eq!(series.bars[1].volume, 95132400);

        let meta = series.metadata.unwrap();
        assert_eq!(meta.name.as_deref(), Some("Apple Inc."));
        assert_eq!(meta.exchange.as_deref(), Some("NMS"));
        assert_eq!(meta.currency.as_deref(), Some("USD"));
        assert_eq!(meta.market_cap, None);
        assert_eq!(meta.previous_close, Some(180.0));
        assert_eq!(meta.fifty_two_week_high, Some(199.62));
    }

    #[tokio::test]
    async fn test_fetch_series_without_bars_is_empty() {
        let body = r#"{"chart": {"result": [{"meta": {"currency": "USD", "symbol": "AAPL"}}], "error": null}}"#;
        let mock_server = create_chart_mock_server("AAPL", 200, body).await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();
        let series = provider
            .fetch_series("AAPL", Period::OneDay, Interval::OneMinute)
            .await
            .unwrap();
        assert!(series.bars.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_series_unknown_symbol() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let mock_server = create_chart_mock_server("INVALID", 404, body).await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();
        let result = provider
            .fetch_series("INVALID", Period::OneMonth, Interval::OneDay)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price data found for symbol: INVALID"
        );
    }

    #[tokio::test]
    async fn test_fetch_series_server_error() {
        let mock_server = create_chart_mock_server("AAPL", 500, "").await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();
        let result = provider
            .fetch_series("AAPL", Period::OneMonth, Interval::OneDay)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for symbol: AAPL"
        );
    }

    #[tokio::test]
    async fn test_lookup_symbol_found_and_missing() {
        let mock_server = create_chart_mock_server("AAPL", 200, DAILY_CHART).await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/ZZZZ"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                r#"{"chart": {"result": null, "error": {"code": "Not Found"}}}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let found = provider.lookup_symbol("AAPL").await.unwrap();
        assert_eq!(
            found,
            Some(CatalogEntry::new("AAPL", "Apple Inc.", "NMS"))
        );

        let missing = provider.lookup_symbol("ZZZZ").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_lookup_symbol_propagates_failures() {
        let mock_server = create_chart_mock_server("AAPL", 503, "").await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();
        assert!(provider.lookup_symbol("AAPL").await.is_err());
    }

    #[tokio::test]
    async fn test_symbol_cannot_rewrite_chart_query() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("range", "max"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DAILY_CHART))
            .expect(0)
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();
        let result = provider
            .fetch_series("AAPL?range=max&x=", Period::OneMonth, Interval::OneDay)
            .await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price data found for symbol: AAPL?range=max&x="
        );

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].url.path(),
            "/v8/finance/chart/AAPL%3Frange=max&x="
        );
        assert_eq!(requests[0].url.query(), Some("range=1mo&interval=1d"));
    }

    #[tokio::test]
    async fn test_market_cap_from_quote_endpoint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"quoteResponse": {"result": [{"symbol": "AAPL", "marketCap": 2650000000000}], "error": null}}"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "ZZZZ"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"quoteResponse": {"result": [], "error": null}}"#,
            ))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        assert_eq!(
            provider.market_cap("AAPL").await.unwrap(),
            Some(2_650_000_000_000)
        );
        assert_eq!(provider.market_cap("ZZZZ").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_market_cap_unauthorized() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();
        let err = provider.market_cap("AAPL").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "HTTP error: 401 Unauthorized for quote: AAPL"
        );
    }

    // Tests for YahooCurrencyProvider (CurrencyRateProvider)
    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_response = r#"{
            "chart": {
                "result": [
                    {
                        "meta": {
                            "regularMarketPrice": 83.4521
                        }
                    }
                ]
            }
        }"#;
        let mock_server = create_chart_mock_server("USDINR=X", 200, mock_response).await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let rate = provider
            .get_rate("USD", "INR")
            .await
            .expect("Failed to get rate");
        assert_eq!(rate, 83.4521);
    }

    #[tokio::test]
    async fn test_no_currency_rate_found() {
        let mock_response = r#"{"chart": {"result": []}}"#;
        let mock_server = create_chart_mock_server("USDEUR=X", 200, mock_response).await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let result = provider.get_rate("USD", "EUR").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No rate data found for currency pair: USDEUR=X"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_error_response() {
        let mock_server = create_chart_mock_server("USDEUR=X", 500, "").await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let result = provider.get_rate("USD", "EUR").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for currency pair: USDEUR=X"
        );
    }

    #[tokio::test]
    async fn test_yahoo_currency_api_malformed_response() {
        // "results" instead of "result"
        let mock_response = r#"{"chart": {"results": []}}"#;
        let mock_server = create_chart_mock_server("USDEUR=X", 200, mock_response).await;
        let provider = YahooCurrencyProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let result = provider.get_rate("USD", "EUR").await;
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for USDEUR=X")
        );
    }
}
