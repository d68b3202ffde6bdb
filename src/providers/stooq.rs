//! Daily OHLCV bars from Stooq's CSV download endpoint, used when Yahoo fails.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::core::price::{DailyHistoryProvider, PriceBar};
use crate::providers::util::{endpoint_url, http_client};

pub const DEFAULT_BASE_URL: &str = "https://stooq.com";

/// Bodies shorter than this cannot hold a header plus one row.
const MIN_BODY_LEN: usize = 50;
const MAX_ROWS: usize = 30;

pub struct StooqProvider {
    base_url: String,
    client: reqwest::Client,
}

impl StooqProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(StooqProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout)?,
        })
    }
}

/// Maps a Yahoo-style symbol to Stooq's market suffix convention.
pub fn to_stooq_symbol(symbol: &str) -> String {
    if let Some(base) = symbol
        .strip_suffix(".NS")
        .or_else(|| symbol.strip_suffix(".BO"))
    {
        format!("{}.in", base.to_lowercase())
    } else if let Some(base) = symbol.strip_suffix(".L") {
        format!("{}.uk", base.to_lowercase())
    } else {
        format!("{}.us", symbol.to_lowercase())
    }
}

#[derive(Debug, Deserialize)]
struct StooqRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open")]
    open: f64,
    #[serde(rename = "High")]
    high: f64,
    #[serde(rename = "Low")]
    low: f64,
    #[serde(rename = "Close")]
    close: f64,
    #[serde(rename = "Volume", default)]
    volume: Option<f64>,
}

impl StooqRow {
    fn into_bar(self) -> Result<PriceBar> {
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}'", self.date))?;
        Ok(PriceBar {
            date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume.filter(|v| *v > 0.0).map_or(0, |v| v as u64),
        })
    }
}

/// Parses a Stooq daily CSV and keeps the most recent `MAX_ROWS` bars, oldest first.
fn parse_daily_csv(body: &str) -> Result<Vec<PriceBar>> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let mut bars = Vec::new();

    for record in reader.deserialize::<StooqRow>() {
        match record.map_err(anyhow::Error::from).and_then(StooqRow::into_bar) {
            Ok(bar) => bars.push(bar),
            Err(e) => warn!("Skipping malformed Stooq row: {e:#}"),
        }
    }

    let skip = bars.len().saturating_sub(MAX_ROWS);
    Ok(bars.split_off(skip))
}

#[async_trait]
impl DailyHistoryProvider for StooqProvider {
    #[instrument(name = "StooqDailyFetch", skip(self))]
    async fn fetch_daily(&self, symbol: &str) -> Result<Vec<PriceBar>> {
        let stooq_symbol = to_stooq_symbol(symbol);
        let url = endpoint_url(
            &self.base_url,
            &["q", "d", "l", ""],
            &[("s", stooq_symbol.as_str()), ("i", "d")],
        )?;
        debug!("Requesting daily bars from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for symbol: {}", e, stooq_symbol))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Stooq unavailable: HTTP {} for symbol: {}",
                response.status(),
                stooq_symbol
            ));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for {stooq_symbol}"))?;

        if body.contains("No data") || body.trim().len() < MIN_BODY_LEN {
            return Err(anyhow!("No data from Stooq for symbol: {}", stooq_symbol));
        }

        let bars = parse_daily_csv(&body)?;
        if bars.is_empty() {
            return Err(anyhow!("Empty data from Stooq for symbol: {}", stooq_symbol));
        }

        debug!(rows = bars.len(), "Parsed Stooq CSV");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::util::DEFAULT_TIMEOUT;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn csv_with_rows(rows: usize) -> String {
        let mut body = String::from("Date,Open,High,Low,Close,Volume\n");
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for i in 0..rows {
            let date = start + chrono::Duration::days(i as i64);
            let price = 100.0 + i as f64;
            body.push_str(&format!(
                "{},{},{},{},{},{}\n",
                date.format("%Y-%m-%d"),
                price,
                price + 1.0,
                price - 1.0,
                price + 0.5,
                1000 + i
            ));
        }
        body
    }

    async fn create_stooq_mock_server(stooq_symbol: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/q/d/l/"))
            .and(query_param("s", stooq_symbol))
            .and(query_param("i", "d"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[test]
    fn test_symbol_translation() {
        assert_eq!(to_stooq_symbol("RELIANCE.NS"), "reliance.in");
        assert_eq!(to_stooq_symbol("TCS.BO"), "tcs.in");
        assert_eq!(to_stooq_symbol("VOD.L"), "vod.uk");
        assert_eq!(to_stooq_symbol("AAPL"), "aapl.us");
        assert_eq!(to_stooq_symbol("BRK-B"), "brk-b.us");
    }

    #[test]
    fn test_parse_keeps_last_thirty_rows() {
        let bars = parse_daily_csv(&csv_with_rows(45)).unwrap();
        assert_eq!(bars.len(), 30);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 16).unwrap());
        assert_eq!(bars[29].close, 144.5);
        assert_eq!(bars[29].volume, 1044);
    }

    #[test]
    fn test_parse_without_volume_column() {
        let body = "Date,Open,High,Low,Close\n2024-01-02,10,11,9,10.5\n";
        let bars = parse_daily_csv(body).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, 0);
    }

    #[tokio::test]
    async fn test_fetch_daily_success() {
        let mock_server = create_stooq_mock_server("aapl.us", 200, &csv_with_rows(3)).await;
        let provider = StooqProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let bars = provider.fetch_daily("AAPL").await.unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[2].close, 102.5);
    }

    #[tokio::test]
    async fn test_fetch_daily_no_data_marker() {
        let mock_server = create_stooq_mock_server("zzzz.us", 200, "No data").await;
        let provider = StooqProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let err = provider.fetch_daily("ZZZZ").await.unwrap_err();
        assert_eq!(err.to_string(), "No data from Stooq for symbol: zzzz.us");
    }

    #[tokio::test]
    async fn test_fetch_daily_header_only() {
        let body = "Date,Open,High,Low,Close,Volume\n\n\n";
        let mock_server = create_stooq_mock_server("aapl.us", 200, body).await;
        let provider = StooqProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        assert!(provider.fetch_daily("AAPL").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_daily_unparseable_rows() {
        let body = "Date,Open,High,Low,Close,Volume\nnot-a-date,x,y,z,w,v\nnot-a-date,x,y,z,w,v\n";
        let mock_server = create_stooq_mock_server("aapl.us", 200, body).await;
        let provider = StooqProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let err = provider.fetch_daily("AAPL").await.unwrap_err();
        assert_eq!(err.to_string(), "Empty data from Stooq for symbol: aapl.us");
    }

    #[tokio::test]
    async fn test_fetch_daily_http_error() {
        let mock_server = create_stooq_mock_server("reliance.in", 503, "").await;
        let provider = StooqProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let err = provider.fetch_daily("RELIANCE.NS").await.unwrap_err();
        assert!(err.to_string().starts_with("Stooq unavailable"));
    }

    #[tokio::test]
    async fn test_symbol_is_sent_as_one_query_value() {
        let mock_server = create_stooq_mock_server("x&i=w.us", 200, &csv_with_rows(2)).await;
        let provider = StooqProvider::new(&mock_server.uri(), DEFAULT_TIMEOUT).unwrap();

        let bars = provider.fetch_daily("X&i=w").await.unwrap();
        assert_eq!(bars.len(), 2);

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), Some("s=x%26i%3Dw.us&i=d"));
    }
}
